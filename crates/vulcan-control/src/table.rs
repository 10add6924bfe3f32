//! Interpolated calibration table lookups.

use crate::error::TableError;
use vulcan_config::{LOAD_BIN_COUNT, RPM_BIN_COUNT};

/// 1-D lookup with linear interpolation and end clamping.
pub fn lookup_1d(axis: &[f32], cells: &[f32], x: f32) -> f32 {
    let n = axis.len().min(cells.len());
    if n == 0 {
        return 0.0;
    }
    if n == 1 || x <= axis[0] {
        return cells[0];
    }
    if x >= axis[n - 1] {
        return cells[n - 1];
    }
    let (i, ratio) = bracket(&axis[..n], x);
    cells[i] + (cells[i + 1] - cells[i]) * ratio
}

/// Locate the bin bracketing `v` and the interpolation ratio within it.
/// The caller guarantees at least two axis entries and a pre-clamped value.
fn bracket(axis: &[f32], v: f32) -> (usize, f32) {
    let n = axis.len();
    if v <= axis[0] {
        return (0, 0.0);
    }
    if v >= axis[n - 1] {
        return (n - 2, 1.0);
    }
    let mut i = 0;
    while i < n - 2 && v > axis[i + 1] {
        i += 1;
    }
    let span = axis[i + 1] - axis[i];
    if span <= 0.0 {
        return (i, 0.0);
    }
    (i, (v - axis[i]) / span)
}

/// Two-axis calibration table with row-major cells.
///
/// Axes must be strictly increasing; `new` enforces this and cell finiteness.
/// Lookups clamp to the axis ranges and never allocate.
#[derive(Clone, Debug, PartialEq)]
pub struct Table<const RX: usize, const RY: usize> {
    x_axis: [f32; RX],
    y_axis: [f32; RY],
    cells: [[f32; RY]; RX],
}

/// The 16x16 RPM-by-load shape used by the VE, advance and AFR maps.
pub type Table16 = Table<RPM_BIN_COUNT, LOAD_BIN_COUNT>;

impl<const RX: usize, const RY: usize> Table<RX, RY> {
    pub fn new(
        x_axis: [f32; RX],
        y_axis: [f32; RY],
        cells: [[f32; RY]; RX],
    ) -> Result<Self, TableError> {
        if !strictly_increasing(&x_axis) || !strictly_increasing(&y_axis) {
            return Err(TableError::AxisNotIncreasing);
        }
        for row in &cells {
            for cell in row {
                if !cell.is_finite() {
                    return Err(TableError::NonFiniteCell);
                }
            }
        }
        Ok(Self {
            x_axis,
            y_axis,
            cells,
        })
    }

    /// Build from known-good data (compile-time defaults). Axes are assumed
    /// strictly increasing; lookups stay total either way because of clamping.
    pub const fn from_raw(
        x_axis: [f32; RX],
        y_axis: [f32; RY],
        cells: [[f32; RY]; RX],
    ) -> Self {
        Self {
            x_axis,
            y_axis,
            cells,
        }
    }

    /// Bilinear interpolation at `(x, y)`, clamped to the axis ranges.
    pub fn lookup(&self, x: f32, y: f32) -> f32 {
        if RX == 0 || RY == 0 {
            return 0.0;
        }
        if RX == 1 && RY == 1 {
            return self.cells[0][0];
        }

        let x = x.clamp(self.x_axis[0], self.x_axis[RX - 1]);
        let y = y.clamp(self.y_axis[0], self.y_axis[RY - 1]);

        let (i, rx) = if RX > 1 { bracket(&self.x_axis, x) } else { (0, 0.0) };
        let (j, ry) = if RY > 1 { bracket(&self.y_axis, y) } else { (0, 0.0) };
        let i1 = (i + 1).min(RX - 1);
        let j1 = (j + 1).min(RY - 1);

        let z00 = self.cells[i][j];
        let z01 = self.cells[i][j1];
        let z10 = self.cells[i1][j];
        let z11 = self.cells[i1][j1];

        let lo = z00 + (z01 - z00) * ry;
        let hi = z10 + (z11 - z10) * ry;
        lo + (hi - lo) * rx
    }

    pub fn x_axis(&self) -> &[f32; RX] {
        &self.x_axis
    }

    pub fn y_axis(&self) -> &[f32; RY] {
        &self.y_axis
    }
}

fn strictly_increasing(axis: &[f32]) -> bool {
    axis.windows(2).all(|w| w[0] < w[1] && w[1].is_finite()) && axis.first().is_none_or(|v| v.is_finite())
}
