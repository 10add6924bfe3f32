//! Injector pulse-width computation.

use crate::pid::AfrPid;
use crate::state::SensorSnapshot;
use crate::table::Table16;
use vulcan_config::*;

/// Per-cycle fuel calculation: load model, correction chain, closed-loop AFR
/// trim, deadtime and the cutoff rules.
pub struct FuelCalculator {
    ve_table: Table16,
    afr_table: Table16,
    pid: AfrPid,
    last_pulse_ms: f32,
    table_fault: bool,
}

impl FuelCalculator {
    pub fn new() -> Self {
        Self {
            ve_table: Table16::from_raw(DEFAULT_RPM_BINS, DEFAULT_LOAD_BINS, DEFAULT_VE_CELLS),
            afr_table: Table16::from_raw(DEFAULT_RPM_BINS, DEFAULT_LOAD_BINS, DEFAULT_AFR_CELLS),
            pid: AfrPid::new(),
            last_pulse_ms: 0.0,
            table_fault: false,
        }
    }

    pub fn set_ve_table(&mut self, table: Table16) {
        self.ve_table = table;
    }

    pub fn set_afr_table(&mut self, table: Table16) {
        self.afr_table = table;
    }

    /// Table-health flag, latched on a non-finite lookup until cleared.
    pub fn table_fault(&self) -> bool {
        self.table_fault
    }

    pub fn clear_faults(&mut self) {
        self.table_fault = false;
    }

    pub fn last_pulse_ms(&self) -> f32 {
        self.last_pulse_ms
    }

    pub fn reset_closed_loop(&mut self) {
        self.pid.reset();
    }

    /// Commanded injector pulse width in milliseconds for this cycle.
    pub fn compute_pulse_width(
        &mut self,
        snapshot: &SensorSnapshot,
        rpm: f32,
        cfg: &FuelConfig,
    ) -> f32 {
        if rpm < MIN_RPM {
            self.last_pulse_ms = 0.0;
            return 0.0;
        }

        let load = match cfg.algorithm {
            FuelAlgorithm::SpeedDensity => snapshot.map_kpa,
            FuelAlgorithm::AlphaN | FuelAlgorithm::Maf => snapshot.tps_pct,
        };

        let ve = self.ve_table.lookup(rpm, load);
        if !ve.is_finite() {
            self.table_fault = true;
            self.last_pulse_ms = 0.0;
            return 0.0;
        }

        let mut pulse = match cfg.algorithm {
            FuelAlgorithm::SpeedDensity => {
                speed_density_ms(snapshot.map_kpa, snapshot.iat_c, ve)
            }
            FuelAlgorithm::AlphaN => alpha_n_ms(snapshot.tps_pct, rpm, ve),
            FuelAlgorithm::Maf => {
                let flow = snapshot
                    .maf_g_s
                    .unwrap_or(snapshot.tps_pct / 100.0 * MAF_FULL_SCALE_G_S);
                maf_ms(flow, rpm)
            }
        };

        pulse *= coolant_correction(snapshot.clt_c, cfg);
        pulse *= iat_correction(snapshot.iat_c, cfg);
        pulse *= cfg.tps_multiplier;
        if cfg.flex_fuel_enabled {
            pulse *= 1.0 + snapshot.ethanol_pct / 100.0 * FLEX_FUEL_ENRICH_SPAN;
        }

        // Closed loop only while the wideband reads inside its trusted span.
        if snapshot.afr > AFR_MIN && snapshot.afr < AFR_MAX {
            let target = self.target_afr(rpm, load, cfg);
            let trim = self.pid.update(target, snapshot.afr, CONTROL_LOOP_DT);
            pulse *= 1.0 + trim;
        }

        let small_pulse = pulse < SMALL_PULSE_THRESHOLD_MS;
        pulse += cfg.injector_deadtime_us / 1000.0;
        if small_pulse {
            pulse *= cfg.small_pulse_correction;
        }

        if cfg.decel_fuel_cut
            && snapshot.tps_pct < DECEL_CUT_TPS_PCT
            && rpm > DECEL_CUT_MIN_RPM
        {
            self.last_pulse_ms = 0.0;
            return 0.0;
        }

        if pulse < MIN_INJECTOR_PULSE_MS {
            pulse = 0.0;
        }

        self.last_pulse_ms = pulse;
        pulse
    }

    /// Commanded AFR from the target map; the config scalar backs a bad lookup.
    fn target_afr(&mut self, rpm: f32, load: f32, cfg: &FuelConfig) -> f32 {
        let target = self.afr_table.lookup(rpm, load);
        if target.is_finite() {
            target
        } else {
            self.table_fault = true;
            cfg.target_afr
        }
    }
}

impl Default for FuelCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Air mass from MAP, charge temperature and VE; fuel mass at stoichiometry;
/// milliseconds through the injector flow constant.
fn speed_density_ms(map_kpa: f32, iat_c: f32, ve: f32) -> f32 {
    let iat_k = iat_c + 273.15;
    let air_density = (map_kpa * 100.0) / (287.05 * iat_k);
    let air_g_per_event = air_density * CYLINDER_DISPLACEMENT_M3 * (ve / 100.0) * 1000.0;
    let fuel_g = air_g_per_event / STOICH_AFR_GASOLINE;
    fuel_g / INJECTOR_FLOW_G_PER_MS
}

fn alpha_n_ms(tps_pct: f32, rpm: f32, ve: f32) -> f32 {
    (tps_pct / 100.0) * (rpm / 6000.0) * (ve / 100.0) * ALPHA_N_SCALE_MS
}

fn maf_ms(flow_g_s: f32, rpm: f32) -> f32 {
    (flow_g_s / STOICH_AFR_GASOLINE) * MAF_SCALE_MS * rpm / 6000.0
}

/// Cold enrichment below the knee, tuner multiplier above it.
fn coolant_correction(clt_c: f32, cfg: &FuelConfig) -> f32 {
    if clt_c < COLD_ENRICH_KNEE_C {
        1.0 + ((COLD_ENRICH_KNEE_C - clt_c) / COLD_ENRICH_KNEE_C) * 0.5
    } else {
        cfg.coolant_multiplier
    }
}

/// Hot intake air is less dense and needs slightly less fuel.
fn iat_correction(iat_c: f32, cfg: &FuelConfig) -> f32 {
    if iat_c > IAT_LEAN_KNEE_C {
        1.0 - ((iat_c - IAT_LEAN_KNEE_C) / 100.0) * 0.1
    } else {
        cfg.iat_multiplier
    }
}
