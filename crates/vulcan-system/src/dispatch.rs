//! Firing geometry: turning per-cycle fuel and spark numbers into
//! absolute-time actuator events.

use crate::capabilities::{InjectionEvent, SparkEvent};
use vulcan_config::*;
use vulcan_control::crank::CrankSample;

/// Events due within the coming control window.
///
/// Each cycle plans only the events whose deadlines fall inside the next
/// loop period, so consecutive windows partition the timeline and every
/// firing event is handed to the scheduler exactly once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FiringPlan {
    pub injections: [Option<InjectionEvent>; NUM_CYLINDERS],
    pub sparks: [Option<SparkEvent>; NUM_CYLINDERS],
    /// Cylinder whose TDC comes up next, 1-based; 0 when unsynced.
    pub next_cylinder: u8,
}

/// Crank angle between consecutive firing events.
const SLOT_SPACING_DEG: f32 = 720.0 / NUM_CYLINDERS as f32;

/// Normalize an angle into 0..360.
fn wrap_deg(angle: f32) -> f32 {
    let wrapped = angle % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

#[allow(clippy::too_many_arguments)]
pub fn plan_cycle(
    now_us: u64,
    window_us: u64,
    crank: &CrankSample,
    pulse_ms: f32,
    advance_deg: f32,
    dwell_ms: f32,
    fuel_cfg: &FuelConfig,
    ign_cfg: &IgnitionConfig,
) -> FiringPlan {
    let mut plan = FiringPlan::default();

    let Some(tooth) = crank.tooth else {
        return plan;
    };
    if crank.period_us == 0 {
        return plan;
    }

    let us_per_deg = crank.period_us as f32 / DEGREES_PER_TOOTH;
    let elapsed_deg = now_us.saturating_sub(crank.last_edge_us) as f32 / us_per_deg;
    let current_deg = wrap_deg(tooth as f32 * DEGREES_PER_TOOTH + elapsed_deg);

    // Absolute time at which the crank next passes `angle`.
    let time_at = |angle: f32| -> u64 {
        let delta = wrap_deg(angle - current_deg);
        now_us + (delta * us_per_deg) as u64
    };
    let in_window = |t: u64| t >= now_us && t < now_us + window_us;

    let sequential = fuel_cfg.injection_mode == InjectionMode::Sequential && crank.cam_synced;
    let dwell_us = (dwell_ms * 1000.0) as u64;
    let mut next_delta = f32::INFINITY;

    for (slot, &cylinder) in ign_cfg.firing_order.iter().enumerate() {
        if cylinder == 0 || cylinder as usize > NUM_CYLINDERS {
            continue;
        }
        let slot_deg = slot as f32 * SLOT_SPACING_DEG;
        let tdc_deg = wrap_deg(REF_TO_TDC_DEG + slot_deg);

        // With cam sync each slot belongs to one half of the 720-degree
        // cycle; without it every revolution fires wasted-spark style.
        if sequential {
            let slot_half = (slot_deg / 360.0) as u32 % 2 == 1;
            if slot_half != crank.cycle_half {
                continue;
            }
        }

        let tdc_delta = wrap_deg(tdc_deg - current_deg);
        if tdc_delta < next_delta {
            next_delta = tdc_delta;
            plan.next_cylinder = cylinder;
        }

        let idx = cylinder as usize - 1;

        if pulse_ms > 0.0 {
            let width_ms = pulse_ms * (1.0 + fuel_cfg.per_cylinder_trim[idx]);
            let start_at = time_at(wrap_deg(tdc_deg - INJECTION_LEAD_DEG));
            if width_ms > 0.0 && in_window(start_at) {
                plan.injections[idx] = Some(InjectionEvent {
                    cylinder,
                    start_at_us: start_at,
                    width_us: (width_ms * 1000.0) as u32,
                });
            }
        }

        let advance = (advance_deg + ign_cfg.per_cylinder_trim_deg[idx])
            .clamp(MIN_ADVANCE_DEG, MAX_ADVANCE_DEG);
        let fire_at = time_at(wrap_deg(tdc_deg - advance));
        let arm_at = fire_at.saturating_sub(dwell_us);
        if in_window(arm_at) {
            plan.sparks[idx] = Some(SparkEvent {
                cylinder,
                arm_at_us: arm_at,
                fire_at_us: fire_at,
            });
        }
    }

    plan
}
