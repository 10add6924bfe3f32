//! The per-cycle engine controller.

use crate::capabilities::{ActuatorScheduler, Clock, CrankSource};
use crate::dispatch;
use vulcan_config::*;
use vulcan_control::error::ConfigError;
use vulcan_control::filter::LowPassFilter;
use vulcan_control::ignition::{self, IgnitionCalculator};
use vulcan_control::safety::{CycleFlags, SafetyMonitor, SafetyStatus};
use vulcan_control::sensors::{AnalogReader, DigitalInputs, SensorPipeline};
use vulcan_control::state::{EngineState, SensorSnapshot};
use vulcan_control::table::Table16;
use vulcan_control::FuelCalculator;

/// Drives one control cycle: sample, track, check, compute, dispatch.
///
/// Phases run strictly in that order and no phase re-enters. The safety
/// monitor is the only authority for suppressing actuator output.
pub struct EcuController<A, K, S, C>
where
    A: AnalogReader,
    K: CrankSource,
    S: ActuatorScheduler,
    C: Clock,
{
    pipeline: SensorPipeline<A>,
    crank: K,
    scheduler: S,
    clock: C,

    rpm_filter: LowPassFilter,
    fuel: FuelCalculator,
    ignition: IgnitionCalculator,
    safety: SafetyMonitor,

    fuel_cfg: FuelConfig,
    ign_cfg: IgnitionConfig,

    snapshot: SensorSnapshot,
    state: EngineState,
    sched_miss_pending: bool,
}

impl<A, K, S, C> EcuController<A, K, S, C>
where
    A: AnalogReader,
    K: CrankSource,
    S: ActuatorScheduler,
    C: Clock,
{
    pub fn new(adc: A, crank: K, scheduler: S, clock: C) -> Self {
        Self {
            pipeline: SensorPipeline::new(adc),
            crank,
            scheduler,
            clock,
            rpm_filter: LowPassFilter::new(FILTER_ALPHA),
            fuel: FuelCalculator::new(),
            ignition: IgnitionCalculator::new(),
            safety: SafetyMonitor::new(),
            fuel_cfg: FuelConfig::default(),
            ign_cfg: IgnitionConfig::default(),
            snapshot: SensorSnapshot::default(),
            state: EngineState::default(),
            sched_miss_pending: false,
        }
    }

    /// Run one control cycle.
    pub fn tick(&mut self, digital: DigitalInputs) -> SafetyStatus {
        let now = self.clock.now_us();

        // 1. Sensors: publish this cycle's snapshot.
        self.snapshot = self.pipeline.sample(now, digital);

        // 2. Crank: consistent sample, speed estimate, stall detection.
        let crank = self.crank.sample();
        let stalled =
            crank.edge_count == 0 || now.saturating_sub(crank.last_edge_us) > CRANK_STALL_US;
        let rpm = if stalled {
            self.rpm_filter.reset();
            self.fuel.reset_closed_loop();
            0.0
        } else {
            self.rpm_filter.update(crank.rpm_raw(now))
        };
        let crank_lost = stalled && self.state.running;

        // 3. Safety: every envelope, plus last cycle's internal findings.
        let flags = CycleFlags {
            crank_lost,
            cam_missing: self.fuel_cfg.injection_mode == InjectionMode::Sequential
                && self.state.running
                && !crank.cam_synced,
            tps_disagree: self.pipeline.faults().tps_disagree,
            table_fault: self.fuel.table_fault() || self.ignition.table_fault(),
            sched_miss: core::mem::take(&mut self.sched_miss_pending),
        };
        let status = self.safety.update(&self.snapshot, rpm, flags);

        // 4/5. Fuel and ignition run even in safe mode; outputs are gated.
        let pulse_ms = self
            .fuel
            .compute_pulse_width(&self.snapshot, rpm, &self.fuel_cfg);
        let advance = self
            .ignition
            .compute_advance(&self.snapshot, rpm, &self.ign_cfg);
        let dwell = ignition::dwell_ms(&self.ign_cfg);

        self.state.rpm = rpm;
        self.state.load = match self.fuel_cfg.algorithm {
            FuelAlgorithm::SpeedDensity => self.snapshot.map_kpa,
            FuelAlgorithm::AlphaN | FuelAlgorithm::Maf => self.snapshot.tps_pct,
        };
        self.state.timing_advance_deg = advance;
        self.state.fuel_pulse_ms = pulse_ms;
        self.state.dwell_ms = dwell;
        self.state.running = rpm >= RUNNING_RPM;
        self.state.cranking = rpm > 0.0 && rpm < RUNNING_RPM;
        self.state.since_crank_edge_us =
            now.saturating_sub(crank.last_edge_us).min(u32::MAX as u64) as u32;

        // 6. Dispatch, unless the safety monitor says otherwise.
        if status.safe_mode || rpm < MIN_RPM {
            self.scheduler.all_off();
            self.state.current_cylinder = 0;
            return status;
        }

        let plan = dispatch::plan_cycle(
            now,
            CONTROL_LOOP_PERIOD_MS * 1000,
            &crank,
            pulse_ms,
            advance,
            dwell,
            &self.fuel_cfg,
            &self.ign_cfg,
        );
        self.state.current_cylinder = plan.next_cylinder;

        for event in plan.injections.into_iter().flatten() {
            if self.scheduler.schedule_injection(event).is_err() {
                self.sched_miss_pending = true;
            }
        }
        for event in plan.sparks.into_iter().flatten() {
            if self.scheduler.schedule_spark(event).is_err() {
                self.sched_miss_pending = true;
            }
        }

        status
    }

    /// Telemetry view: the cycle's snapshot, derived state and fault flags.
    pub fn snapshot(&self) -> (SensorSnapshot, EngineState, SafetyStatus) {
        (self.snapshot, self.state, self.safety.status())
    }

    pub fn set_fuel_config(&mut self, cfg: FuelConfig) -> Result<(), ConfigError> {
        if !(AFR_MIN..=AFR_MAX).contains(&cfg.target_afr) {
            return Err(ConfigError::TargetAfrOutOfRange);
        }
        if cfg
            .per_cylinder_trim
            .iter()
            .any(|trim| !(-0.5..=0.5).contains(trim))
        {
            return Err(ConfigError::TrimOutOfRange);
        }
        self.fuel_cfg = cfg;
        Ok(())
    }

    pub fn set_ignition_config(&mut self, cfg: IgnitionConfig) -> Result<(), ConfigError> {
        let mut seen = [false; NUM_CYLINDERS];
        for &cylinder in &cfg.firing_order {
            match seen.get_mut(cylinder.wrapping_sub(1) as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(ConfigError::BadFiringOrder),
            }
        }
        self.ign_cfg = cfg;
        Ok(())
    }

    pub fn set_ve_table(&mut self, table: Table16) {
        self.fuel.set_ve_table(table);
    }

    pub fn set_ign_table(&mut self, table: Table16) {
        self.ignition.set_table(table);
    }

    pub fn set_afr_table(&mut self, table: Table16) {
        self.fuel.set_afr_table(table);
    }

    /// Clear latched faults; the next cycle re-evaluates from clean state.
    pub fn reset_faults(&mut self) {
        self.safety.reset_faults();
        self.fuel.clear_faults();
        self.ignition.clear_faults();
        self.sched_miss_pending = false;
    }
}
