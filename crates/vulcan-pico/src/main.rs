#![no_std]
#![no_main]

//! Firmware for the Vulcan ECU reference board (RP2040, 60-2 trigger wheel).

use defmt::{info, warn};
use defmt_rtt as _;
use panic_probe as _;

use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel as AdcInput, Config as AdcConfig};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::watchdog::Watchdog;
use embassy_time::{Duration, Ticker};

use vulcan_config::{CONTROL_LOOP_PERIOD_MS, WATCHDOG_TIMEOUT_MS};
use vulcan_control::sensors::DigitalInputs;
use vulcan_hardware::crank_input::{cam_capture_task, crank_capture_task, SharedCrank, WallClock};
use vulcan_hardware::outputs::{coil_task, injector_task, EventScheduler};
use vulcan_hardware::AdcFrontEnd;
use vulcan_system::EcuController;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("vulcan: boot");

    let mut watchdog = Watchdog::new(p.WATCHDOG);
    watchdog.start(Duration::from_millis(WATCHDOG_TIMEOUT_MS));

    // Position inputs
    spawner
        .spawn(crank_capture_task(Input::new(p.PIN_2, Pull::Up)))
        .unwrap();
    spawner
        .spawn(cam_capture_task(Input::new(p.PIN_3, Pull::Up)))
        .unwrap();

    // Pedal switches, active low
    let brake = Input::new(p.PIN_4, Pull::Up);
    let clutch = Input::new(p.PIN_5, Pull::Up);

    // Injector drivers, cylinders 1-4
    spawner
        .spawn(injector_task(0, Output::new(p.PIN_6, Level::Low)))
        .unwrap();
    spawner
        .spawn(injector_task(1, Output::new(p.PIN_7, Level::Low)))
        .unwrap();
    spawner
        .spawn(injector_task(2, Output::new(p.PIN_8, Level::Low)))
        .unwrap();
    spawner
        .spawn(injector_task(3, Output::new(p.PIN_9, Level::Low)))
        .unwrap();

    // Coil drivers, cylinders 1-4
    spawner
        .spawn(coil_task(0, Output::new(p.PIN_10, Level::Low)))
        .unwrap();
    spawner
        .spawn(coil_task(1, Output::new(p.PIN_11, Level::Low)))
        .unwrap();
    spawner
        .spawn(coil_task(2, Output::new(p.PIN_12, Level::Low)))
        .unwrap();
    spawner
        .spawn(coil_task(3, Output::new(p.PIN_13, Level::Low)))
        .unwrap();

    // Analog front-end: ADC0 behind the 16:1 multiplexer
    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let input = AdcInput::new_pin(p.PIN_26, Pull::None);
    let select = [
        Output::new(p.PIN_16, Level::Low),
        Output::new(p.PIN_17, Level::Low),
        Output::new(p.PIN_18, Level::Low),
        Output::new(p.PIN_19, Level::Low),
    ];
    let front_end = AdcFrontEnd::new(adc, input, select);

    let mut controller = EcuController::new(front_end, SharedCrank, EventScheduler, WallClock);

    info!("vulcan: control loop at {} ms", CONTROL_LOOP_PERIOD_MS);
    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_LOOP_PERIOD_MS));
    let mut was_safe_mode = false;

    loop {
        ticker.next().await;

        let digital = DigitalInputs {
            brake_pedal: brake.is_low(),
            clutch_pedal: clutch.is_low(),
        };
        let status = controller.tick(digital);
        watchdog.feed();

        if status.safe_mode != was_safe_mode {
            if status.safe_mode {
                warn!("safe mode entered: {}", status);
            } else {
                info!("safe mode cleared");
            }
            was_safe_mode = status.safe_mode;
        }
    }
}
