// src/attempt/timer.rs

use serde::Serialize;

/// Remaining-time marks (seconds) at which a warning is raised, in firing order.
pub const WARNING_THRESHOLDS_SECS: [u64; 3] = [300, 120, 60];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimerEvent {
    Warning { minutes_left: u64 },
    TimeUp,
}

/// Exam countdown driven by explicit ticks.
///
/// Each warning threshold fires at most once, and only if the countdown started
/// above it. Time-up fires exactly once; later ticks are no-ops.
#[derive(Debug, Clone)]
pub struct Countdown {
    total_secs: u64,
    remaining_secs: u64,
    armed: [bool; WARNING_THRESHOLDS_SECS.len()],
    expired: bool,
    paused: bool,
}

impl Countdown {
    pub fn new(total_secs: u64) -> Self {
        Self {
            total_secs,
            remaining_secs: total_secs,
            armed: WARNING_THRESHOLDS_SECS.map(|t| total_secs > t),
            expired: false,
            paused: false,
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.total_secs - self.remaining_secs
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Advances the clock by `elapsed_secs` and returns the events crossed, in order.
    pub fn tick(&mut self, elapsed_secs: u64) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        if self.expired || self.paused {
            return events;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(elapsed_secs);

        for (armed, threshold) in self.armed.iter_mut().zip(WARNING_THRESHOLDS_SECS) {
            if *armed && self.remaining_secs <= threshold {
                *armed = false;
                events.push(TimerEvent::Warning {
                    minutes_left: threshold / 60,
                });
            }
        }

        if self.remaining_secs == 0 {
            self.expired = true;
            events.push(TimerEvent::TimeUp);
        }

        events
    }
}
