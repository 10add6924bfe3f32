//! Shared engine data published once per control cycle.

/// One cycle's worth of conditioned sensor readings.
///
/// Published whole at the top of each cycle; consumers never observe a mix of
/// old and new samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSnapshot {
    /// Throttle position, 0-100 %
    pub tps_pct: f32,
    /// Manifold absolute pressure, kPa
    pub map_kpa: f32,
    /// Intake air temperature, C
    pub iat_c: f32,
    /// Coolant temperature, C
    pub clt_c: f32,
    /// Barometric pressure, kPa
    pub baro_kpa: f32,
    pub fuel_pressure_kpa: f32,
    pub fuel_level_pct: f32,
    pub oil_pressure_kpa: f32,
    /// Measured air-fuel ratio from the wideband controller
    pub afr: f32,
    pub ethanol_pct: f32,
    /// Mass airflow, g/s; None when no MAF is fitted
    pub maf_g_s: Option<f32>,
    /// System voltage behind the divider
    pub battery_v: f32,
    pub vss_kmh: f32,
    pub brake_pedal: bool,
    pub clutch_pedal: bool,
}

/// Derived engine state, updated at the end of each cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineState {
    /// Filtered engine speed
    pub rpm: f32,
    /// Engine load on the axis picked by the fuel algorithm (kPa or %)
    pub load: f32,
    /// Latest ignition advance, degrees BTDC
    pub timing_advance_deg: f32,
    /// Latest injector pulse width, ms
    pub fuel_pulse_ms: f32,
    /// Coil dwell, ms
    pub dwell_ms: f32,
    pub running: bool,
    pub cranking: bool,
    /// Next cylinder due to fire (1-based)
    pub current_cylinder: u8,
    /// Age of the last crank edge at the time of the cycle
    pub since_crank_edge_us: u32,
}
