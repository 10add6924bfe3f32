//! Whole-controller scenarios on a simulated board: ADC, crank wheel,
//! scheduler and clock all faked, the control core untouched.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use vulcan_config::*;
use vulcan_control::crank::{CrankSample, CrankTracker};
use vulcan_control::sensors::{ntc_temperature_c, AdcChannel, AnalogReader, DigitalInputs};
use vulcan_system::capabilities::{
    ActuatorScheduler, Clock, CrankSource, InjectionEvent, ScheduleMiss, SparkEvent,
};
use vulcan_system::EcuController;

/// Engineering-unit sensor values the fake ADC serves as fractions.
#[derive(Clone, Copy, Debug)]
struct SimValues {
    tps1_pct: f32,
    tps2_pct: f32,
    map_kpa: f32,
    iat_c: f32,
    clt_c: f32,
    baro_kpa: f32,
    fuel_pressure_kpa: f32,
    oil_pressure_kpa: f32,
    afr: f32,
    ethanol_pct: f32,
    battery_v: f32,
}

impl Default for SimValues {
    fn default() -> Self {
        Self {
            tps1_pct: 2.0,
            tps2_pct: 2.0,
            map_kpa: 35.0,
            iat_c: 25.0,
            clt_c: 90.0,
            baro_kpa: 101.3,
            fuel_pressure_kpa: 350.0,
            oil_pressure_kpa: 250.0,
            afr: 14.7,
            ethanol_pct: 0.0,
            battery_v: 13.8,
        }
    }
}

fn pct_fraction(pct: f32) -> f32 {
    (TPS_MIN_VOLTS + pct / 100.0 * (TPS_MAX_VOLTS - TPS_MIN_VOLTS)) / SENSOR_VREF
}

/// Invert the NTC conversion by bisection; the curve rises with voltage.
fn ntc_fraction(temp_c: f32) -> f32 {
    let mut lo = 0.0001f32;
    let mut hi = 0.9999f32;
    for _ in 0..48 {
        let mid = 0.5 * (lo + hi);
        if ntc_temperature_c(mid) < temp_c {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

struct SimAdc {
    values: Rc<RefCell<SimValues>>,
}

impl AnalogReader for SimAdc {
    fn read(&mut self, channel: AdcChannel) -> f32 {
        let v = *self.values.borrow();
        match channel {
            AdcChannel::Tps1 => pct_fraction(v.tps1_pct),
            AdcChannel::Tps2 => pct_fraction(v.tps2_pct),
            AdcChannel::Map => v.map_kpa / MAP_MAX_KPA,
            AdcChannel::Iat => ntc_fraction(v.iat_c),
            AdcChannel::Clt => ntc_fraction(v.clt_c),
            AdcChannel::FuelPressure => v.fuel_pressure_kpa / FUEL_PRESSURE_MAX_KPA,
            AdcChannel::FuelLevel => pct_fraction(50.0),
            AdcChannel::OilPressure => v.oil_pressure_kpa / OIL_PRESSURE_MAX_KPA,
            AdcChannel::Baro => v.baro_kpa / BARO_MAX_KPA,
            AdcChannel::WidebandO2 => (v.afr - AFR_MIN) / (AFR_MAX - AFR_MIN),
            AdcChannel::FlexFuel => v.ethanol_pct / 100.0,
            AdcChannel::BatteryVolts => v.battery_v / (SENSOR_VREF * VBATT_DIVIDER_RATIO),
            AdcChannel::Maf => 0.0,
        }
    }
}

struct SimCrank {
    tracker: Rc<RefCell<CrankTracker>>,
}

impl CrankSource for SimCrank {
    fn sample(&self) -> CrankSample {
        self.tracker.borrow().sample()
    }
}

struct SimClock {
    now: Rc<Cell<u64>>,
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.now.get()
    }
}

#[derive(Default)]
struct SchedLog {
    injections: Vec<InjectionEvent>,
    sparks: Vec<SparkEvent>,
    all_off_calls: u32,
    force_miss: bool,
}

struct SimScheduler {
    log: Rc<RefCell<SchedLog>>,
}

impl ActuatorScheduler for SimScheduler {
    fn schedule_injection(&mut self, event: InjectionEvent) -> Result<(), ScheduleMiss> {
        let mut log = self.log.borrow_mut();
        if log.force_miss {
            return Err(ScheduleMiss);
        }
        log.injections.push(event);
        Ok(())
    }

    fn schedule_spark(&mut self, event: SparkEvent) -> Result<(), ScheduleMiss> {
        let mut log = self.log.borrow_mut();
        if log.force_miss {
            return Err(ScheduleMiss);
        }
        log.sparks.push(event);
        Ok(())
    }

    fn all_off(&mut self) {
        self.log.borrow_mut().all_off_calls += 1;
    }
}

struct Rig {
    ecu: EcuController<SimAdc, SimCrank, SimScheduler, SimClock>,
    values: Rc<RefCell<SimValues>>,
    tracker: Rc<RefCell<CrankTracker>>,
    clock: Rc<Cell<u64>>,
    log: Rc<RefCell<SchedLog>>,
}

impl Rig {
    fn new() -> Self {
        let values = Rc::new(RefCell::new(SimValues::default()));
        let tracker = Rc::new(RefCell::new(CrankTracker::new()));
        let clock = Rc::new(Cell::new(0));
        let log = Rc::new(RefCell::new(SchedLog::default()));

        let ecu = EcuController::new(
            SimAdc {
                values: values.clone(),
            },
            SimCrank {
                tracker: tracker.clone(),
            },
            SimScheduler { log: log.clone() },
            SimClock { now: clock.clone() },
        );
        Self {
            ecu,
            values,
            tracker,
            clock,
            log,
        }
    }

    /// Turn the 60-2 wheel at `rpm` for `revs` revolutions, advancing the
    /// clock along with the edges.
    fn spin(&self, rpm: f32, revs: u32) {
        let pitch = (1.0e6 / rpm) as u64; // us per tooth at 60 teeth
        let mut t = self.clock.get();
        let mut tracker = self.tracker.borrow_mut();
        if tracker.sample().edge_count == 0 {
            tracker.on_edge(t);
        }
        for _ in 0..revs {
            for _ in 0..(CRANK_TEETH - MISSING_TEETH - 1) {
                t += pitch;
                tracker.on_edge(t);
            }
            t += pitch * (MISSING_TEETH as u64 + 1);
            tracker.on_edge(t);
        }
        self.clock.set(t);
    }

    fn tick(&mut self) -> vulcan_control::SafetyStatus {
        self.ecu.tick(DigitalInputs::default())
    }
}

#[test]
fn healthy_idle_fuels_and_sparks() {
    let mut rig = Rig::new();
    rig.spin(800.0, 3);
    let status = rig.tick();

    let (snapshot, state, _) = rig.ecu.snapshot();
    assert!(!status.safe_mode, "{status:?}");
    assert!((state.rpm - 800.0).abs() < 10.0, "rpm {}", state.rpm);
    assert!((snapshot.map_kpa - 35.0).abs() < 1.0);
    assert!(state.fuel_pulse_ms > MIN_INJECTOR_PULSE_MS);
    // Flat default advance map.
    assert!((state.timing_advance_deg - 15.0).abs() < 0.1);
    assert!(state.running);
}

#[test]
fn over_rev_suppresses_all_outputs() {
    let mut rig = Rig::new();
    rig.spin(7600.0, 3);
    let status = rig.tick();

    assert!(status.rpm_limit_reached);
    assert!(status.safe_mode);
    let log = rig.log.borrow();
    assert_eq!(log.all_off_calls, 1);
    assert!(log.injections.is_empty());
    assert!(log.sparks.is_empty());
}

#[test]
fn decel_cut_stops_fuel_but_not_spark() {
    let mut rig = Rig::new();
    rig.ecu
        .set_fuel_config(FuelConfig {
            decel_fuel_cut: true,
            ..Default::default()
        })
        .unwrap();
    {
        let mut v = rig.values.borrow_mut();
        v.tps1_pct = 1.0;
        v.tps2_pct = 1.0;
    }
    rig.spin(3000.0, 3);
    let status = rig.tick();

    let (_, state, _) = rig.ecu.snapshot();
    assert!(!status.safe_mode);
    assert_eq!(state.fuel_pulse_ms, 0.0);
    let log = rig.log.borrow();
    assert!(log.injections.is_empty());
    assert!(!log.sparks.is_empty());
}

#[test]
fn cold_start_runs_richer_than_warm_idle() {
    let mut warm = Rig::new();
    warm.spin(800.0, 3);
    warm.tick();
    let (_, warm_state, _) = warm.ecu.snapshot();

    let mut cold = Rig::new();
    {
        let mut v = cold.values.borrow_mut();
        v.clt_c = -5.0;
        v.map_kpa = 80.0;
        v.tps1_pct = 5.0;
        v.tps2_pct = 5.0;
    }
    cold.spin(400.0, 3);
    cold.tick();
    let (snapshot, cold_state, _) = cold.ecu.snapshot();

    assert!(snapshot.clt_c < 0.0, "clt {}", snapshot.clt_c);
    assert!(
        cold_state.fuel_pulse_ms > warm_state.fuel_pulse_ms,
        "cold {} vs warm {}",
        cold_state.fuel_pulse_ms,
        warm_state.fuel_pulse_ms
    );
}

#[test]
fn tps_channel_disagreement_forces_safe_mode() {
    let mut rig = Rig::new();
    rig.spin(2000.0, 3);
    rig.tick();

    {
        let mut v = rig.values.borrow_mut();
        v.tps1_pct = 90.0;
        v.tps2_pct = 10.0;
    }
    rig.spin(2000.0, 1);
    let status = rig.tick();

    assert!(status.tps_fault);
    assert!(status.safe_mode);
}

#[test]
fn crank_silence_reports_stall_and_faults() {
    let mut rig = Rig::new();
    rig.spin(1000.0, 3);
    let status = rig.tick();
    assert!(!status.crank_fault);
    let (_, state, _) = rig.ecu.snapshot();
    assert!(state.running);

    // 200 ms of silence: well past the stall window.
    rig.clock.set(rig.clock.get() + 200_000);
    let status = rig.tick();
    let (_, state, _) = rig.ecu.snapshot();
    assert_eq!(state.rpm, 0.0);
    assert!(status.crank_fault);
    assert!(status.safe_mode);
}

#[test]
fn safe_mode_clears_once_the_condition_does() {
    let mut rig = Rig::new();
    rig.spin(7600.0, 3);
    assert!(rig.tick().safe_mode);

    // Spin down; the next clean cycle recomputes everything.
    let mut rig = Rig::new();
    rig.spin(3000.0, 3);
    assert!(!rig.tick().safe_mode);
}

#[test]
fn reset_faults_gives_a_clean_slate() {
    let mut rig = Rig::new();
    rig.spin(7600.0, 3);
    rig.tick();
    assert!(rig.ecu.snapshot().2.safe_mode);

    rig.ecu.reset_faults();
    assert_eq!(rig.ecu.snapshot().2, vulcan_control::SafetyStatus::default());
}

#[test]
fn scheduler_misses_surface_as_a_fault_next_cycle() {
    let mut rig = Rig::new();
    rig.log.borrow_mut().force_miss = true;
    rig.spin(3000.0, 3);
    let status = rig.tick();
    assert!(!status.sched_fault);

    rig.spin(3000.0, 1);
    let status = rig.tick();
    assert!(status.sched_fault);
    assert!(!status.safe_mode);
}

#[test]
fn rejected_configs_leave_the_tune_untouched() {
    let mut rig = Rig::new();

    let bad_order = IgnitionConfig {
        firing_order: [1, 1, 4, 2],
        ..Default::default()
    };
    assert!(rig.ecu.set_ignition_config(bad_order).is_err());

    let bad_trim = FuelConfig {
        per_cylinder_trim: [0.0, 0.9, 0.0, 0.0],
        ..Default::default()
    };
    assert!(rig.ecu.set_fuel_config(bad_trim).is_err());

    rig.spin(2000.0, 3);
    assert!(!rig.tick().safe_mode);
}
