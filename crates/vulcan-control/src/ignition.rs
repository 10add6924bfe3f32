//! Ignition advance, dwell and angle-to-time conversion.

use crate::state::SensorSnapshot;
use crate::table::Table16;
use vulcan_config::*;

pub struct IgnitionCalculator {
    table: Table16,
    last_advance_deg: f32,
    table_fault: bool,
}

impl IgnitionCalculator {
    pub fn new() -> Self {
        Self {
            table: Table16::from_raw(DEFAULT_RPM_BINS, DEFAULT_LOAD_BINS, DEFAULT_ADVANCE_CELLS),
            last_advance_deg: 0.0,
            table_fault: false,
        }
    }

    pub fn set_table(&mut self, table: Table16) {
        self.table = table;
    }

    pub fn table_fault(&self) -> bool {
        self.table_fault
    }

    pub fn clear_faults(&mut self) {
        self.table_fault = false;
    }

    pub fn last_advance_deg(&self) -> f32 {
        self.last_advance_deg
    }

    /// Timing advance in degrees BTDC, always within the mechanical limits.
    pub fn compute_advance(
        &mut self,
        snapshot: &SensorSnapshot,
        rpm: f32,
        cfg: &IgnitionConfig,
    ) -> f32 {
        if rpm < MIN_RPM {
            self.last_advance_deg = 0.0;
            return 0.0;
        }

        let base = match cfg.mode {
            IgnitionMode::Fixed => FIXED_MODE_ADVANCE_DEG,
            IgnitionMode::Dynamic => {
                let advance = self.table.lookup(rpm, snapshot.map_kpa);
                if !advance.is_finite() {
                    self.table_fault = true;
                    self.last_advance_deg = 0.0;
                    return 0.0;
                }
                advance
            }
        };

        let advance = base + cfg.coolant_correction_deg + iat_adder(snapshot.iat_c, cfg);
        let advance = advance.clamp(MIN_ADVANCE_DEG, MAX_ADVANCE_DEG);
        self.last_advance_deg = advance;
        advance
    }
}

impl Default for IgnitionCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Hot intake charge pulls timing out to keep away from knock.
fn iat_adder(iat_c: f32, cfg: &IgnitionConfig) -> f32 {
    let mut adder = cfg.iat_adder_deg;
    if iat_c > KNOCK_MARGIN_KNEE_C {
        adder -= (iat_c - KNOCK_MARGIN_KNEE_C) * KNOCK_MARGIN_DEG_PER_C;
    }
    adder
}

/// Coil on-time, clamped to what the coil can absorb.
pub fn dwell_ms(cfg: &IgnitionConfig) -> f32 {
    cfg.dwell_ms.clamp(MIN_DWELL_MS, MAX_DWELL_MS)
}

/// Crank rotation time for `degrees` at `rpm`, in microseconds.
pub fn degrees_to_us(degrees: f32, rpm: f32) -> f32 {
    if rpm <= 0.0 {
        return 0.0;
    }
    degrees * 60.0e6 / (rpm * 360.0)
}

/// Crank degrees swept in `us` microseconds at `rpm`.
pub fn us_to_degrees(us: f32, rpm: f32) -> f32 {
    us * (rpm * 360.0) / 60.0e6
}
