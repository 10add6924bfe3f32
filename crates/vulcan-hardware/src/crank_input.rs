//! Crank and cam edge capture.
//!
//! The capture tasks timestamp rising edges and feed the shared tracker; the
//! control task reads one consistent sample per cycle. Both sides go through
//! the same critical-section mutex, which is the atomicity guarantee for the
//! (time, period, count) triple.

use core::cell::RefCell;

use defmt::info;
use embassy_rp::gpio::Input;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use vulcan_control::crank::{CrankSample, CrankTracker};
use vulcan_system::capabilities::{Clock, CrankSource};

static CRANK_TRACKER: Mutex<CriticalSectionRawMutex, RefCell<CrankTracker>> =
    Mutex::new(RefCell::new(CrankTracker::new()));

#[embassy_executor::task]
pub async fn crank_capture_task(mut pin: Input<'static>) {
    info!("crank capture: running");
    loop {
        pin.wait_for_rising_edge().await;
        let now = Instant::now().as_micros();
        CRANK_TRACKER.lock(|tracker| tracker.borrow_mut().on_edge(now));
    }
}

#[embassy_executor::task]
pub async fn cam_capture_task(mut pin: Input<'static>) {
    info!("cam capture: running");
    loop {
        pin.wait_for_rising_edge().await;
        CRANK_TRACKER.lock(|tracker| tracker.borrow_mut().on_cam_edge());
    }
}

/// Controller-side view of the shared tracker.
pub struct SharedCrank;

impl CrankSource for SharedCrank {
    fn sample(&self) -> CrankSample {
        CRANK_TRACKER.lock(|tracker| tracker.borrow().sample())
    }
}

/// Microsecond time from the embassy time driver.
pub struct WallClock;

impl Clock for WallClock {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}
