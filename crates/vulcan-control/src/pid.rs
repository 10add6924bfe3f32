//! Closed-loop AFR trim controller.

use vulcan_config::{
    AFR_PID_INTEGRAL_LIMIT, AFR_PID_KD, AFR_PID_KI, AFR_PID_KP, AFR_PID_OUTPUT_LIMIT,
};

/// PID on measured AFR producing a bounded fuel trim fraction.
///
/// The integral term is clamped for anti-windup and the output is limited so
/// closed loop can never command more than a +/-20% correction.
#[derive(Clone, Copy, Debug)]
pub struct AfrPid {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,

    integral: f32,
    last_error: f32,
    last_output: f32,
    primed: bool,
}

impl AfrPid {
    pub const fn new() -> Self {
        Self {
            kp: AFR_PID_KP,
            ki: AFR_PID_KI,
            kd: AFR_PID_KD,
            integral: 0.0,
            last_error: 0.0,
            last_output: 0.0,
            primed: false,
        }
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.last_output = 0.0;
        self.primed = false;
    }

    /// One controller step. `dt` is the loop period in seconds.
    pub fn update(&mut self, target: f32, measured: f32, dt: f32) -> f32 {
        let error = target - measured;

        self.integral += error * dt;
        self.integral = self
            .integral
            .clamp(-AFR_PID_INTEGRAL_LIMIT, AFR_PID_INTEGRAL_LIMIT);

        let derivative = if self.primed && dt > 0.0 {
            (error - self.last_error) / dt
        } else {
            0.0
        };

        let output = self.kp * error + self.ki * self.integral + self.kd * derivative;
        let output = output.clamp(-AFR_PID_OUTPUT_LIMIT, AFR_PID_OUTPUT_LIMIT);

        self.last_error = error;
        self.last_output = output;
        self.primed = true;
        output
    }

    pub fn last_output(&self) -> f32 {
        self.last_output
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }
}

impl Default for AfrPid {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vulcan_config::CONTROL_LOOP_DT;

    #[test]
    fn zero_error_produces_zero_output() {
        let mut pid = AfrPid::new();
        assert_eq!(pid.update(14.7, 14.7, CONTROL_LOOP_DT), 0.0);
    }

    #[test]
    fn reset_clears_accumulated_state() {
        let mut pid = AfrPid::new();
        for _ in 0..100 {
            pid.update(14.7, 12.0, CONTROL_LOOP_DT);
        }
        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.update(14.7, 14.7, CONTROL_LOOP_DT), 0.0);
    }

    #[test]
    fn sustained_error_saturates_at_output_limit() {
        let mut pid = AfrPid::new();
        let mut out = 0.0;
        for _ in 0..500 {
            out = pid.update(20.0, 10.0, CONTROL_LOOP_DT);
        }
        assert_eq!(out, AFR_PID_OUTPUT_LIMIT);
        assert_eq!(pid.integral(), AFR_PID_INTEGRAL_LIMIT);
    }

    proptest! {
        #[test]
        fn clamps_hold_for_any_input_sequence(
            samples in prop::collection::vec(0.0f32..30.0, 1..200),
            target in 10.0f32..20.0,
        ) {
            let mut pid = AfrPid::new();
            for measured in samples {
                let out = pid.update(target, measured, CONTROL_LOOP_DT);
                prop_assert!(out.abs() <= AFR_PID_OUTPUT_LIMIT);
                prop_assert!(pid.integral().abs() <= AFR_PID_INTEGRAL_LIMIT);
            }
        }
    }
}
