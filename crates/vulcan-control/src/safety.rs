//! Envelope checks and the safe-mode authority.

use crate::state::SensorSnapshot;
use vulcan_config::*;

/// One flag per fault kind, recomputed every cycle, plus the aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SafetyStatus {
    pub tps_fault: bool,
    pub map_fault: bool,
    pub iat_fault: bool,
    pub clt_fault: bool,
    pub crank_fault: bool,
    pub cam_fault: bool,
    pub wbo2_fault: bool,
    pub fuel_pressure_fault: bool,
    pub oil_pressure_fault: bool,
    pub overvoltage: bool,
    pub overtemperature: bool,
    pub rpm_limit_reached: bool,
    /// Fuel or ignition table produced a non-finite value.
    pub fuel_calc_fault: bool,
    /// The actuator scheduler dropped at least one event last cycle.
    pub sched_fault: bool,
    /// Actuator outputs must be suppressed.
    pub safe_mode: bool,
}

impl SafetyStatus {
    fn any_critical(&self) -> bool {
        self.tps_fault
            || self.map_fault
            || self.clt_fault
            || self.crank_fault
            || self.fuel_pressure_fault
            || self.rpm_limit_reached
            || self.overvoltage
            || self.overtemperature
    }
}

/// Cross-component findings folded into this cycle's evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleFlags {
    /// Crank signal silent past the stall window while running was expected.
    pub crank_lost: bool,
    /// Sequential injection configured but no usable cam reference.
    pub cam_missing: bool,
    /// Dual TPS plausibility failure from the sensor pipeline.
    pub tps_disagree: bool,
    /// Table-health flag from the fuel or ignition calculator.
    pub table_fault: bool,
    /// At least one actuator event missed its deadline last cycle.
    pub sched_miss: bool,
}

pub struct SafetyMonitor {
    status: SafetyStatus,
    engine_has_run: bool,
    dropped_events: u32,
}

impl SafetyMonitor {
    pub const fn new() -> Self {
        Self {
            status: SafetyStatus {
                tps_fault: false,
                map_fault: false,
                iat_fault: false,
                clt_fault: false,
                crank_fault: false,
                cam_fault: false,
                wbo2_fault: false,
                fuel_pressure_fault: false,
                oil_pressure_fault: false,
                overvoltage: false,
                overtemperature: false,
                rpm_limit_reached: false,
                fuel_calc_fault: false,
                sched_fault: false,
                safe_mode: false,
            },
            engine_has_run: false,
            dropped_events: 0,
        }
    }

    /// Evaluate every envelope for the cycle and derive `safe_mode`.
    pub fn update(&mut self, snapshot: &SensorSnapshot, rpm: f32, flags: CycleFlags) -> SafetyStatus {
        // Oil pressure only matters once the engine has actually run.
        if rpm > RUNNING_RPM {
            self.engine_has_run = true;
        }

        let s = &mut self.status;
        s.tps_fault = !(0.0..=100.0).contains(&snapshot.tps_pct) || flags.tps_disagree;
        s.map_fault = !(MAP_MIN_KPA..=MAP_MAX_KPA).contains(&snapshot.map_kpa);
        s.iat_fault = !(TEMP_MIN_C..=TEMP_MAX_C).contains(&snapshot.iat_c);
        s.clt_fault =
            !(TEMP_MIN_C..=TEMP_MAX_C).contains(&snapshot.clt_c) || snapshot.clt_c > MAX_CLT_C;
        s.crank_fault = flags.crank_lost || rpm > MAX_RPM;
        s.cam_fault = flags.cam_missing;
        s.wbo2_fault = !(AFR_MIN..=AFR_MAX).contains(&snapshot.afr);
        s.fuel_pressure_fault = snapshot.fuel_pressure_kpa < MIN_FUEL_PRESSURE_KPA;
        s.oil_pressure_fault =
            self.engine_has_run && snapshot.oil_pressure_kpa < MIN_OIL_PRESSURE_KPA;
        s.rpm_limit_reached = rpm > MAX_RPM_LIMIT;
        s.overvoltage = snapshot.battery_v > MAX_BATTERY_VOLTS;
        s.overtemperature = snapshot.clt_c > MAX_CLT_C || snapshot.iat_c > MAX_IAT_C;
        s.fuel_calc_fault = flags.table_fault;
        s.sched_fault = flags.sched_miss;
        if flags.sched_miss {
            self.dropped_events = self.dropped_events.saturating_add(1);
        }

        s.safe_mode = s.any_critical();
        *s
    }

    pub fn status(&self) -> SafetyStatus {
        self.status
    }

    /// Dropped actuator events since the last fault reset.
    pub fn dropped_events(&self) -> u32 {
        self.dropped_events
    }

    /// Clear every latched flag; the next cycle re-evaluates from scratch.
    pub fn reset_faults(&mut self) {
        *self = Self::new();
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new()
    }
}
