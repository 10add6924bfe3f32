//! Timer-driven injector and coil outputs.
//!
//! The controller hands absolute-time events to [`EventScheduler`]; one task
//! per actuator waits out the deadline with the timer peripheral and drives
//! its pin. Events that are already late are refused, never stretched.

use embassy_rp::gpio::Output;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Timer};
use vulcan_config::NUM_CYLINDERS;
use vulcan_system::capabilities::{
    ActuatorScheduler, InjectionEvent, ScheduleMiss, SparkEvent,
};

#[derive(Clone, Copy)]
pub enum InjectorCommand {
    Pulse { start_at_us: u64, width_us: u32 },
    Off,
}

#[derive(Clone, Copy)]
pub enum CoilCommand {
    Fire { arm_at_us: u64, fire_at_us: u64 },
    Off,
}

static INJECTOR_COMMANDS: [Channel<CriticalSectionRawMutex, InjectorCommand, 4>; NUM_CYLINDERS] =
    [const { Channel::new() }; NUM_CYLINDERS];
static COIL_COMMANDS: [Channel<CriticalSectionRawMutex, CoilCommand, 4>; NUM_CYLINDERS] =
    [const { Channel::new() }; NUM_CYLINDERS];

/// Controller-side half: queue events to the per-cylinder driver tasks.
pub struct EventScheduler;

impl ActuatorScheduler for EventScheduler {
    fn schedule_injection(&mut self, event: InjectionEvent) -> Result<(), ScheduleMiss> {
        let Some(queue) = INJECTOR_COMMANDS.get(event.cylinder as usize - 1) else {
            return Err(ScheduleMiss);
        };
        if Instant::now().as_micros() > event.start_at_us {
            return Err(ScheduleMiss);
        }
        queue
            .try_send(InjectorCommand::Pulse {
                start_at_us: event.start_at_us,
                width_us: event.width_us,
            })
            .map_err(|_| ScheduleMiss)
    }

    fn schedule_spark(&mut self, event: SparkEvent) -> Result<(), ScheduleMiss> {
        let Some(queue) = COIL_COMMANDS.get(event.cylinder as usize - 1) else {
            return Err(ScheduleMiss);
        };
        if Instant::now().as_micros() > event.arm_at_us {
            return Err(ScheduleMiss);
        }
        queue
            .try_send(CoilCommand::Fire {
                arm_at_us: event.arm_at_us,
                fire_at_us: event.fire_at_us,
            })
            .map_err(|_| ScheduleMiss)
    }

    fn all_off(&mut self) {
        for queue in &INJECTOR_COMMANDS {
            let _ = queue.try_send(InjectorCommand::Off);
        }
        for queue in &COIL_COMMANDS {
            let _ = queue.try_send(CoilCommand::Off);
        }
    }
}

#[embassy_executor::task(pool_size = NUM_CYLINDERS)]
pub async fn injector_task(index: usize, mut pin: Output<'static>) {
    let commands = &INJECTOR_COMMANDS[index];
    loop {
        match commands.receive().await {
            InjectorCommand::Off => pin.set_low(),
            InjectorCommand::Pulse {
                start_at_us,
                width_us,
            } => {
                Timer::at(Instant::from_micros(start_at_us)).await;
                pin.set_high();
                Timer::after(Duration::from_micros(width_us as u64)).await;
                pin.set_low();
            }
        }
    }
}

#[embassy_executor::task(pool_size = NUM_CYLINDERS)]
pub async fn coil_task(index: usize, mut pin: Output<'static>) {
    let commands = &COIL_COMMANDS[index];
    loop {
        match commands.receive().await {
            CoilCommand::Off => pin.set_low(),
            CoilCommand::Fire {
                arm_at_us,
                fire_at_us,
            } => {
                Timer::at(Instant::from_micros(arm_at_us)).await;
                pin.set_high();
                Timer::at(Instant::from_micros(fire_at_us)).await;
                // Releasing the coil makes the spark.
                pin.set_low();
            }
        }
    }
}
