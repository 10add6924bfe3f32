#![no_std]

pub mod tables;

pub use tables::*;

// Engine geometry
pub const NUM_CYLINDERS: usize = 4;
pub const ENGINE_DISPLACEMENT_L: f32 = 2.0;
pub const CYLINDER_DISPLACEMENT_M3: f32 = ENGINE_DISPLACEMENT_L / NUM_CYLINDERS as f32 / 1000.0;

// Crank trigger wheel (60-2 pattern)
pub const CRANK_TEETH: u32 = 60;
pub const MISSING_TEETH: u32 = 2;
pub const DEGREES_PER_TOOTH: f32 = 360.0 / CRANK_TEETH as f32;
/// Crank angle from the missing-tooth reference to cylinder-1 TDC.
pub const REF_TO_TDC_DEG: f32 = 90.0;
/// Injection is commanded this many degrees before the cylinder's TDC.
pub const INJECTION_LEAD_DEG: f32 = 90.0;

// RPM envelope
pub const MAX_RPM: f32 = 8000.0;
pub const MIN_RPM: f32 = 100.0; // below this no fuel or spark is computed
pub const MAX_RPM_LIMIT: f32 = 7500.0; // hard limiter
pub const RUNNING_RPM: f32 = 500.0;

// Crank signal timing
pub const CRANK_DEBOUNCE_MIN_US: u64 = 100;
pub const CRANK_DEBOUNCE_MAX_US: u64 = 100_000;
pub const CRANK_STALL_US: u64 = 100_000;
pub const CRANK_GAP_RATIO: f32 = 1.5; // gap interval vs median tooth interval
pub const CRANK_SYNC_MIN_EDGES: usize = 8;

// Control loop timing
pub const CONTROL_LOOP_PERIOD_MS: u64 = 10;
pub const CONTROL_LOOP_DT: f32 = 0.010;
pub const WATCHDOG_TIMEOUT_MS: u64 = 500;

// Sensor scaling
pub const SENSOR_VREF: f32 = 5.0;
pub const TPS_MIN_VOLTS: f32 = 0.5;
pub const TPS_MAX_VOLTS: f32 = 4.5;
pub const TPS_DISAGREE_LIMIT_PCT: f32 = 10.0; // dual-channel plausibility window
pub const MAP_MIN_KPA: f32 = 0.0;
pub const MAP_MAX_KPA: f32 = 300.0;
pub const BARO_MIN_KPA: f32 = 0.0;
pub const BARO_MAX_KPA: f32 = 150.0;
pub const FUEL_PRESSURE_MAX_KPA: f32 = 600.0;
pub const OIL_PRESSURE_MAX_KPA: f32 = 1000.0;
pub const TEMP_MIN_C: f32 = -40.0;
pub const TEMP_MAX_C: f32 = 200.0;
pub const AFR_MIN: f32 = 10.0;
pub const AFR_MAX: f32 = 20.0;
pub const VBATT_DIVIDER_RATIO: f32 = 4.0;

// NTC thermistor (10k with 10k pullup)
pub const NTC_PULLUP_OHMS: f32 = 10_000.0;
pub const STEINHART_A: f32 = 0.001_129_148;
pub const STEINHART_B: f32 = 0.000_234_125;
pub const STEINHART_C: f32 = 0.000_000_087_674_1;

// Filtering
pub const FILTER_ALPHA: f32 = 0.1;
pub const VBATT_AVG_SAMPLES: usize = 4;
pub const BARO_RESAMPLE_US: u64 = 1_000_000;

// Safety limits
pub const MAX_CLT_C: f32 = 120.0;
pub const MAX_IAT_C: f32 = 80.0;
pub const MIN_OIL_PRESSURE_KPA: f32 = 50.0;
pub const MIN_FUEL_PRESSURE_KPA: f32 = 200.0;
pub const MAX_BATTERY_VOLTS: f32 = 16.0;

// Fuel system
pub const STOICH_AFR_GASOLINE: f32 = 14.7;
/// Ethanol stoichiometry spread relative to gasoline (14.7 vs ~9.0).
pub const FLEX_FUEL_ENRICH_SPAN: f32 = 0.6;
/// Effective injector delivery per millisecond of commanded pulse.
pub const INJECTOR_FLOW_G_PER_MS: f32 = 5.5e-4;
pub const ALPHA_N_SCALE_MS: f32 = 12.0;
pub const MAF_SCALE_MS: f32 = 0.9;
pub const MAF_FULL_SCALE_G_S: f32 = 120.0;
pub const INJECTOR_DEADTIME_US: f32 = 1000.0;
pub const MIN_INJECTOR_PULSE_MS: f32 = 0.5;
pub const SMALL_PULSE_THRESHOLD_MS: f32 = 2.0;
pub const DECEL_CUT_TPS_PCT: f32 = 5.0;
pub const DECEL_CUT_MIN_RPM: f32 = 2000.0;
pub const COLD_ENRICH_KNEE_C: f32 = 70.0;
pub const IAT_LEAN_KNEE_C: f32 = 25.0;

// Closed-loop AFR trim
pub const AFR_PID_KP: f32 = 0.1;
pub const AFR_PID_KI: f32 = 0.01;
pub const AFR_PID_KD: f32 = 0.05;
pub const AFR_PID_INTEGRAL_LIMIT: f32 = 0.5;
pub const AFR_PID_OUTPUT_LIMIT: f32 = 0.2;

// Ignition
pub const FIXED_MODE_ADVANCE_DEG: f32 = 10.0;
pub const MIN_ADVANCE_DEG: f32 = -10.0;
pub const MAX_ADVANCE_DEG: f32 = 45.0;
pub const MIN_DWELL_MS: f32 = 1.0;
pub const MAX_DWELL_MS: f32 = 5.0;
pub const KNOCK_MARGIN_KNEE_C: f32 = 40.0;
pub const KNOCK_MARGIN_DEG_PER_C: f32 = 0.1;

/// Engine load model for the fuel calculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FuelAlgorithm {
    /// Air mass inferred from MAP, IAT and volumetric efficiency.
    SpeedDensity,
    /// Throttle angle and engine speed.
    AlphaN,
    /// Direct mass-airflow signal; TPS-derived fallback when no sensor is fitted.
    Maf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IgnitionMode {
    Fixed,
    Dynamic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InjectionMode {
    Batch,
    Sequential,
}

/// Fuel calculation settings, written by the tuning surface and read-only here.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FuelConfig {
    pub algorithm: FuelAlgorithm,
    pub target_afr: f32,
    pub coolant_multiplier: f32,
    pub iat_multiplier: f32,
    pub tps_multiplier: f32,
    pub injector_deadtime_us: f32,
    pub small_pulse_correction: f32,
    pub flex_fuel_enabled: bool,
    pub decel_fuel_cut: bool,
    /// Per-cylinder trim factor, -0.5..=0.5, applied at dispatch.
    pub per_cylinder_trim: [f32; NUM_CYLINDERS],
    pub injection_mode: InjectionMode,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            algorithm: FuelAlgorithm::SpeedDensity,
            target_afr: STOICH_AFR_GASOLINE,
            coolant_multiplier: 1.0,
            iat_multiplier: 1.0,
            tps_multiplier: 1.0,
            injector_deadtime_us: INJECTOR_DEADTIME_US,
            small_pulse_correction: 1.1,
            flex_fuel_enabled: false,
            decel_fuel_cut: false,
            per_cylinder_trim: [0.0; NUM_CYLINDERS],
            injection_mode: InjectionMode::Batch,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IgnitionConfig {
    pub mode: IgnitionMode,
    pub dwell_ms: f32,
    pub iat_adder_deg: f32,
    pub coolant_correction_deg: f32,
    /// Per-cylinder timing trim in degrees, applied at dispatch.
    pub per_cylinder_trim_deg: [f32; NUM_CYLINDERS],
    pub firing_order: [u8; NUM_CYLINDERS],
}

impl Default for IgnitionConfig {
    fn default() -> Self {
        Self {
            mode: IgnitionMode::Dynamic,
            dwell_ms: 3.0,
            iat_adder_deg: 0.0,
            coolant_correction_deg: 0.0,
            per_cylinder_trim_deg: [0.0; NUM_CYLINDERS],
            firing_order: [1, 3, 4, 2],
        }
    }
}
