use std::collections::VecDeque;
use std::env;
use std::time::{Duration, Instant};

pub const DEFAULT_SPEED: f32 = 1.0;
const SPEED_ENV: &str = "MIDIVIZ_DEBUG_SPEED";

/// Monotonic, speed-scaled time source for the frame loop.
#[derive(Debug)]
pub struct PlaybackClock {
    speed: f32,
    start: Instant,
    last_tick: Instant,
    frame_intervals: VecDeque<Duration>,
    max_intervals: usize,
}

impl PlaybackClock {
    pub fn new(speed: f32) -> Self {
        Self::with_start(speed, Instant::now())
    }

    pub fn from_env() -> Self {
        Self::new(speed_from_env())
    }

    pub fn with_start(speed: f32, now: Instant) -> Self {
        Self {
            speed: sanitize_speed(speed),
            start: now,
            last_tick: now,
            frame_intervals: VecDeque::new(),
            max_intervals: 90,
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn time_at(&self, now: Instant) -> f32 {
        self.speed * now.saturating_duration_since(self.start).as_secs_f32()
    }

    /// Records a frame boundary and returns the scaled time for that frame.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.record_interval(elapsed);
        self.time_at(now)
    }

    pub fn average_fps(&self) -> f32 {
        if self.frame_intervals.is_empty() {
            return 0.0;
        }

        let sum: Duration = self.frame_intervals.iter().copied().sum();
        let avg = sum / self.frame_intervals.len() as u32;

        if avg.is_zero() {
            return 0.0;
        }

        1.0 / avg.as_secs_f32()
    }

    fn record_interval(&mut self, interval: Duration) {
        self.frame_intervals.push_back(interval);
        if self.frame_intervals.len() > self.max_intervals {
            self.frame_intervals.pop_front();
        }
    }
}

pub fn speed_from_env() -> f32 {
    env::var(SPEED_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<f32>().ok())
        .map(sanitize_speed)
        .unwrap_or(DEFAULT_SPEED)
}

fn sanitize_speed(speed: f32) -> f32 {
    if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        DEFAULT_SPEED
    }
}
