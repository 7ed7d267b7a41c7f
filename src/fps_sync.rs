use std::time::{Duration, Instant};

use tracing::info;

/// Content rates this close to the screen rate ride the display driver's
/// pacing instead of self-timed sleeps.
const VSYNC_TOLERANCE_HZ: f64 = 5.0;

const STRETCH_MIN: f64 = 0.95;
const STRETCH_MAX: f64 = 1.05;
const STRETCH_SMOOTHING: f64 = 0.1;

/// Per-frame pacing between the core's content rate and the screen rate.
///
/// When the two rates are close we let vsync drive the loop and only decide
/// how many core frames each display tick should consume. Otherwise the host
/// sleeps its own interval.
pub struct FpsSync {
    content_rate: f64,
    screen_rate: f64,
    use_vsync: bool,
    sample_interval: Duration,
    last_frame: Option<Instant>,
    // Fractional core frames owed to the display, vsync mode only.
    accumulator: f64,
    last_tick: Option<Instant>,
    stretch: f64,
}

impl FpsSync {
    pub fn new(content_rate: f64, screen_rate: f64) -> Self {
        let use_vsync = (screen_rate - content_rate).abs() <= VSYNC_TOLERANCE_HZ;

        info!(
            content_rate,
            screen_rate, use_vsync, "starting frame pacing"
        );

        Self {
            content_rate,
            screen_rate,
            use_vsync,
            sample_interval: Duration::from_secs_f64(1.0 / content_rate),
            last_frame: None,
            accumulator: 0.0,
            last_tick: None,
            stretch: 1.0,
        }
    }

    pub fn uses_vsync(&self) -> bool {
        self.use_vsync
    }

    pub fn reset(&mut self) {
        self.last_frame = None;
        self.last_tick = None;
        self.accumulator = 0.0;
        self.stretch = 1.0;
    }

    /// How many core frames to run this tick.
    ///
    /// Vsync mode accumulates `content/screen` frames per display tick and
    /// hands out the integer part, so the long-run ratio is exact even for
    /// rates like 59.94 on a 60 Hz panel. Self-paced mode always runs one.
    pub fn advance_frames(&mut self) -> u32 {
        self.observe_tick();

        if !self.use_vsync {
            return 1;
        }

        self.accumulator += self.content_rate / self.screen_rate;
        let frames = self.accumulator.floor();
        self.accumulator -= frames;
        frames as u32
    }

    /// Sleeps out the remainder of the frame when self-paced. Never drifts
    /// backward: falling behind snaps the schedule forward instead of
    /// accumulating debt.
    pub fn wait(&mut self) {
        if self.use_vsync {
            return;
        }

        let now = Instant::now();
        let Some(last) = self.last_frame else {
            self.last_frame = Some(now);
            return;
        };

        let target = last + self.sample_interval;
        if target > now {
            std::thread::sleep(target - now);
            self.last_frame = Some(target);
        } else if now.duration_since(target) > self.sample_interval {
            // More than a frame behind; skip ahead.
            self.last_frame = Some(now);
        } else {
            self.last_frame = Some(target);
        }
    }

    /// Smoothed ratio of wall-clock tick duration to the ideal frame
    /// duration, clamped to ±5%. Audio uses it to bias its input rate so
    /// produced and consumed sample counts agree over long windows.
    pub fn time_stretch_factor(&self) -> f64 {
        self.stretch
    }

    fn observe_tick(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_tick {
            let ideal = if self.use_vsync {
                1.0 / self.screen_rate
            } else {
                1.0 / self.content_rate
            };
            let measured = now.duration_since(last).as_secs_f64() / ideal;
            let blended =
                self.stretch * (1.0 - STRETCH_SMOOTHING) + measured * STRETCH_SMOOTHING;
            self.stretch = blended.clamp(STRETCH_MIN, STRETCH_MAX);
        }
        self.last_tick = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_decision_boundaries() {
        assert!(FpsSync::new(60.0, 60.0).uses_vsync());
        assert!(FpsSync::new(59.94, 60.0).uses_vsync());
        assert!(FpsSync::new(55.0, 60.0).uses_vsync());
        assert!(!FpsSync::new(50.0, 60.0).uses_vsync());
        assert!(!FpsSync::new(30.0, 60.0).uses_vsync());
        assert!(FpsSync::new(120.0, 120.0).uses_vsync());
    }

    #[test]
    fn advance_frames_long_run_ratio_is_exact() {
        let mut sync = FpsSync::new(59.94, 60.0);
        let total: u32 = (0..6000).map(|_| sync.advance_frames()).sum();
        // 6000 display ticks at 60 Hz = 100 s = 5994 content frames.
        assert!((total as i64 - 5994).abs() <= 1, "ran {total} frames");
    }

    #[test]
    fn advance_frames_is_mostly_one_near_equal_rates() {
        let mut sync = FpsSync::new(60.0, 60.0);
        sync.advance_frames();
        for _ in 0..100 {
            assert_eq!(sync.advance_frames(), 1);
        }
    }

    #[test]
    fn self_paced_advances_one_per_tick() {
        let mut sync = FpsSync::new(50.0, 60.0);
        for _ in 0..10 {
            assert_eq!(sync.advance_frames(), 1);
        }
    }

    #[test]
    fn self_paced_wait_approximates_interval() {
        let mut sync = FpsSync::new(200.0, 60.0);
        sync.wait();

        let start = Instant::now();
        for _ in 0..10 {
            sync.wait();
        }
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(40), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(200), "{elapsed:?}");
    }

    #[test]
    fn stretch_factor_stays_clamped() {
        let mut sync = FpsSync::new(10000.0, 60.0);
        for _ in 0..50 {
            sync.advance_frames();
            std::thread::sleep(Duration::from_millis(1));
        }
        let stretch = sync.time_stretch_factor();
        assert!((0.95..=1.05).contains(&stretch), "{stretch}");
    }
}
