#![cfg_attr(not(test), no_std)]

pub mod capabilities;
pub mod controller;
pub mod dispatch;

// Re-export commonly used types
pub use capabilities::{
    ActuatorScheduler, Clock, CrankSource, InjectionEvent, ScheduleMiss, SparkEvent,
};
pub use controller::EcuController;
pub use dispatch::FiringPlan;
