//! Crank position tracking from a missing-tooth trigger wheel.
//!
//! Edge timestamps arrive from the capture context through [`CrankTracker::on_edge`];
//! the control task reads a consistent [`CrankSample`] once per cycle. The
//! sharing discipline between the two contexts lives in the board layer.

use vulcan_config::*;

const INTERVAL_HISTORY: usize = (CRANK_TEETH - MISSING_TEETH) as usize;

/// Consistent read of the tracker state: edge time, period and count,
/// plus the decoded angular reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CrankSample {
    pub last_edge_us: u64,
    /// Most recent valid inter-tooth interval.
    pub period_us: u32,
    pub edge_count: u32,
    /// Tooth position since the gap reference; None until the gap is found.
    pub tooth: Option<u8>,
    pub revolutions: u32,
    /// A cam edge has been seen recently enough to resolve 720-degree phase.
    pub cam_synced: bool,
    /// Even or odd revolution of the 720-degree cycle, when cam-synced.
    pub cycle_half: bool,
}

impl CrankSample {
    /// Unfiltered engine speed from the latest tooth period, zero once the
    /// signal has been silent longer than the stall window.
    pub fn rpm_raw(&self, now_us: u64) -> f32 {
        if self.edge_count == 0 || self.period_us == 0 {
            return 0.0;
        }
        if now_us.saturating_sub(self.last_edge_us) > CRANK_STALL_US {
            return 0.0;
        }
        let rev_us = self.period_us as f32 * CRANK_TEETH as f32;
        (60.0e6 / rev_us).clamp(0.0, MAX_RPM)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CrankTracker {
    last_edge_us: Option<u64>,
    period_us: u32,
    edge_count: u32,
    tooth: Option<u8>,
    revolutions: u32,

    intervals: [u32; INTERVAL_HISTORY],
    stored: usize,
    write: usize,

    cam_rev: Option<u32>,
}

impl CrankTracker {
    pub const fn new() -> Self {
        Self {
            last_edge_us: None,
            period_us: 0,
            edge_count: 0,
            tooth: None,
            revolutions: 0,
            intervals: [0; INTERVAL_HISTORY],
            stored: 0,
            write: 0,
            cam_rev: None,
        }
    }

    /// Record one rising edge with its microsecond timestamp.
    pub fn on_edge(&mut self, now_us: u64) {
        let Some(last) = self.last_edge_us else {
            self.last_edge_us = Some(now_us);
            return;
        };

        let interval = now_us.saturating_sub(last);
        if interval < CRANK_DEBOUNCE_MIN_US {
            // Electrical glitch; ignore the edge entirely.
            return;
        }
        if interval > CRANK_DEBOUNCE_MAX_US {
            // Discarded. Only the edge time moves, so the next interval is
            // measured from a real edge; tooth and cam state stay as they
            // were and the next gap re-anchors the reference.
            self.last_edge_us = Some(now_us);
            return;
        }

        let interval = interval as u32;
        self.last_edge_us = Some(now_us);
        self.edge_count = self.edge_count.wrapping_add(1);

        if self.stored >= CRANK_SYNC_MIN_EDGES
            && interval as f32 > CRANK_GAP_RATIO * self.median_interval() as f32
        {
            // The missing-tooth gap: this edge is the angular reference.
            // The gap interval spans the missing teeth plus one pitch.
            self.tooth = Some(0);
            self.revolutions = self.revolutions.wrapping_add(1);
            self.period_us = interval / (MISSING_TEETH + 1);
            return;
        }

        self.period_us = interval;
        self.push_interval(interval);
        if let Some(tooth) = self.tooth {
            self.tooth = Some(((tooth as u32 + 1) % CRANK_TEETH) as u8);
        }
    }

    /// Record a cam reference edge, anchoring the 720-degree cycle.
    pub fn on_cam_edge(&mut self) {
        self.cam_rev = Some(self.revolutions);
    }

    pub fn sample(&self) -> CrankSample {
        let cam_synced = self
            .cam_rev
            .is_some_and(|rev| self.revolutions.wrapping_sub(rev) <= 2);
        CrankSample {
            last_edge_us: self.last_edge_us.unwrap_or(0),
            period_us: self.period_us,
            edge_count: self.edge_count,
            tooth: self.tooth,
            revolutions: self.revolutions,
            cam_synced,
            cycle_half: self
                .cam_rev
                .map(|rev| self.revolutions.wrapping_sub(rev) % 2 == 1)
                .unwrap_or(false),
        }
    }

    /// Unfiltered engine speed as of `now_us`.
    pub fn rpm_raw(&self, now_us: u64) -> f32 {
        self.sample().rpm_raw(now_us)
    }

    pub fn since_last_edge_us(&self, now_us: u64) -> u64 {
        self.last_edge_us
            .map(|last| now_us.saturating_sub(last))
            .unwrap_or(u64::MAX)
    }

    fn push_interval(&mut self, interval: u32) {
        self.intervals[self.write] = interval;
        self.write = (self.write + 1) % INTERVAL_HISTORY;
        if self.stored < INTERVAL_HISTORY {
            self.stored += 1;
        }
    }

    fn median_interval(&self) -> u32 {
        let mut sorted = [0u32; INTERVAL_HISTORY];
        sorted[..self.stored].copy_from_slice(&self.intervals[..self.stored]);
        sorted[..self.stored].sort_unstable();
        sorted[self.stored / 2]
    }
}

impl Default for CrankTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `count` edges of even `pitch_us` spacing starting after `start`.
    fn feed_teeth(tracker: &mut CrankTracker, start: u64, pitch_us: u64, count: u32) -> u64 {
        let mut t = start;
        for _ in 0..count {
            t += pitch_us;
            tracker.on_edge(t);
        }
        t
    }

    #[test]
    fn locks_onto_the_missing_tooth_gap() {
        let mut tracker = CrankTracker::new();
        tracker.on_edge(0);
        let t = feed_teeth(&mut tracker, 0, 1000, 57);
        assert_eq!(tracker.sample().tooth, None);

        // The 60-2 gap: three pitches between edges.
        tracker.on_edge(t + 3000);
        let sample = tracker.sample();
        assert_eq!(sample.tooth, Some(0));
        assert_eq!(sample.revolutions, 1);
        assert_eq!(sample.period_us, 1000);
        assert!((tracker.rpm_raw(t + 3000) - 1000.0).abs() < 1.0);
    }

    #[test]
    fn tooth_counter_tracks_following_edges() {
        let mut tracker = CrankTracker::new();
        tracker.on_edge(0);
        let t = feed_teeth(&mut tracker, 0, 1000, 57);
        tracker.on_edge(t + 3000);
        let t = feed_teeth(&mut tracker, t + 3000, 1000, 5);
        assert_eq!(tracker.sample().tooth, Some(5));

        // The rest of the revolution and the next gap wrap the counter.
        let t = feed_teeth(&mut tracker, t, 1000, 52);
        tracker.on_edge(t + 3000);
        let sample = tracker.sample();
        assert_eq!(sample.tooth, Some(0));
        assert_eq!(sample.revolutions, 2);
    }

    #[test]
    fn short_glitches_are_ignored() {
        let mut tracker = CrankTracker::new();
        tracker.on_edge(0);
        feed_teeth(&mut tracker, 0, 1000, 20);
        let before = tracker.sample();
        tracker.on_edge(20_000 + 50); // 50 us after a real edge
        assert_eq!(tracker.sample(), before);
    }

    #[test]
    fn overlong_intervals_are_discarded_without_losing_sync() {
        let mut tracker = CrankTracker::new();
        tracker.on_edge(0);
        let t = feed_teeth(&mut tracker, 0, 1000, 57);
        tracker.on_edge(t + 3000);
        let before = tracker.sample();
        assert_eq!(before.tooth, Some(0));

        // Silence past the stall window reads as a stopped engine.
        assert_eq!(tracker.rpm_raw(t + 3000 + 150_000), 0.0);

        // The first edge after the dropout spans far too long an interval;
        // it is discarded and the sync state is kept.
        tracker.on_edge(t + 3000 + 200_000);
        let sample = tracker.sample();
        assert_eq!(sample.tooth, before.tooth);
        assert_eq!(sample.revolutions, before.revolutions);
        assert_eq!(sample.period_us, before.period_us);

        // Tracking resumes on the next plausible interval.
        tracker.on_edge(t + 3000 + 201_000);
        assert_eq!(tracker.sample().tooth, Some(1));
        assert!((tracker.rpm_raw(t + 3000 + 201_000) - 1000.0).abs() < 1.0);
    }

    #[test]
    fn rpm_reads_zero_after_stall_window() {
        let mut tracker = CrankTracker::new();
        tracker.on_edge(0);
        feed_teeth(&mut tracker, 0, 1000, 20);
        assert!(tracker.rpm_raw(20_000) > 0.0);
        assert_eq!(tracker.rpm_raw(20_000 + CRANK_STALL_US + 1), 0.0);
    }

    #[test]
    fn rpm_is_clamped_to_the_envelope() {
        let mut tracker = CrankTracker::new();
        tracker.on_edge(0);
        feed_teeth(&mut tracker, 0, 110, 20); // ~4500 us/rev, far over redline
        assert_eq!(tracker.rpm_raw(2200), MAX_RPM);
    }

    #[test]
    fn cam_sync_expires_without_fresh_edges() {
        let mut tracker = CrankTracker::new();
        tracker.on_edge(0);
        let mut t = feed_teeth(&mut tracker, 0, 1000, 57);
        tracker.on_edge(t + 3000);
        t += 3000;
        tracker.on_cam_edge();
        assert!(tracker.sample().cam_synced);

        for _ in 0..3 {
            t = feed_teeth(&mut tracker, t, 1000, 57);
            tracker.on_edge(t + 3000);
            t += 3000;
        }
        assert!(!tracker.sample().cam_synced);
    }
}
