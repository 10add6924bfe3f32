//! Board capabilities the controller is parametric over.
//!
//! The control core never touches pins or timers directly; the board layer
//! supplies these traits and the test rig substitutes simulations.

use thiserror::Error;
use vulcan_control::crank::CrankSample;

/// Monotonic microsecond time source.
pub trait Clock {
    fn now_us(&self) -> u64;
}

/// Consistent view of the crank tracker shared with the capture context.
///
/// Implementations must return the (time, period, count) triple from a single
/// atomic read; on the reference board that is a critical section.
pub trait CrankSource {
    fn sample(&self) -> CrankSample;
}

/// One injector pulse, absolute-time referenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InjectionEvent {
    /// Cylinder number, 1-based.
    pub cylinder: u8,
    pub start_at_us: u64,
    pub width_us: u32,
}

/// One coil charge-and-fire, absolute-time referenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SparkEvent {
    /// Cylinder number, 1-based.
    pub cylinder: u8,
    /// When the coil must start charging.
    pub arm_at_us: u64,
    /// When the coil is released to spark.
    pub fire_at_us: u64,
}

/// The event's deadline had already passed when it was handed over.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("actuator event deadline already passed")]
pub struct ScheduleMiss;

/// Time-driven injector and coil outputs.
///
/// A miss is reported, never stretched: an event that cannot meet its
/// deadline is dropped by the implementation.
pub trait ActuatorScheduler {
    fn schedule_injection(&mut self, event: InjectionEvent) -> Result<(), ScheduleMiss>;
    fn schedule_spark(&mut self, event: SparkEvent) -> Result<(), ScheduleMiss>;
    /// Force every injector and coil output inactive.
    fn all_off(&mut self);
}
