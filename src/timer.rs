use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of wall-clock time for the attempt timer
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Stopped,
}

/// Start/stop stopwatch for a single attempt.
///
/// The elapsed counter is display-only and advances on ticks; the duration
/// sent to the server always comes from the two recorded timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptTimer {
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    elapsed_secs: i64,
}

impl AttemptTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TimerState {
        match (self.started_at, self.ended_at) {
            (None, _) => TimerState::Idle,
            (Some(_), None) => TimerState::Running,
            (Some(_), Some(_)) => TimerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Running
    }

    /// Begin a new cycle. A running timer keeps its original start.
    pub fn start(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let (Some(started), None) = (self.started_at, self.ended_at) {
            return started;
        }
        self.started_at = Some(now);
        self.ended_at = None;
        self.elapsed_secs = 0;
        now
    }

    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let (Some(started), None) = (self.started_at, self.ended_at) {
            let secs = (now - started).num_seconds();
            self.elapsed_secs = self.elapsed_secs.max(secs);
        }
    }

    /// Record the end of the attempt. Returns `None` when the timer never
    /// started; a second stop keeps the first end time.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let started = self.started_at?;
        if let Some(ended) = self.ended_at {
            return Some(ended);
        }
        let ended = now.max(started);
        self.ended_at = Some(ended);
        self.elapsed_secs = (ended - started).num_seconds();
        Some(ended)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Whole seconds shown to the user
    pub fn elapsed_secs(&self) -> i64 {
        self.elapsed_secs
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.ended_at? - self.started_at?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn new_timer_is_idle() {
        let timer = AttemptTimer::new();
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.elapsed_secs(), 0);
        assert!(timer.duration().is_none());
    }

    #[test]
    fn start_tick_stop_cycle() {
        let mut timer = AttemptTimer::new();
        timer.start(t0());
        assert_eq!(timer.state(), TimerState::Running);

        timer.tick(t0() + Duration::milliseconds(1500));
        assert_eq!(timer.elapsed_secs(), 1);

        let ended = timer.stop(t0() + Duration::seconds(45)).unwrap();
        assert_eq!(ended, t0() + Duration::seconds(45));
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.duration(), Some(Duration::seconds(45)));
        assert_eq!(timer.elapsed_secs(), 45);
    }

    #[test]
    fn elapsed_never_decreases_while_running() {
        let mut timer = AttemptTimer::new();
        timer.start(t0());
        timer.tick(t0() + Duration::seconds(10));
        // clock stepped backwards
        timer.tick(t0() + Duration::seconds(3));
        assert_eq!(timer.elapsed_secs(), 10);
    }

    #[test]
    fn stop_never_precedes_start() {
        let mut timer = AttemptTimer::new();
        timer.start(t0());
        let ended = timer.stop(t0() - Duration::seconds(5)).unwrap();
        assert!(ended >= timer.started_at().unwrap());
        assert_eq!(timer.duration(), Some(Duration::zero()));
    }

    #[test]
    fn stop_without_start_is_noop() {
        let mut timer = AttemptTimer::new();
        assert!(timer.stop(t0()).is_none());
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn second_stop_keeps_first_end() {
        let mut timer = AttemptTimer::new();
        timer.start(t0());
        timer.stop(t0() + Duration::seconds(2));
        let again = timer.stop(t0() + Duration::seconds(9)).unwrap();
        assert_eq!(again, t0() + Duration::seconds(2));
    }

    #[test]
    fn start_while_running_keeps_original_start() {
        let mut timer = AttemptTimer::new();
        timer.start(t0());
        let started = timer.start(t0() + Duration::seconds(4));
        assert_eq!(started, t0());
    }

    #[test]
    fn restart_from_stopped_rearms() {
        let mut timer = AttemptTimer::new();
        timer.start(t0());
        timer.stop(t0() + Duration::seconds(30));

        let later = t0() + Duration::minutes(2);
        timer.start(later);
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.elapsed_secs(), 0);
        assert_eq!(timer.started_at(), Some(later));
        assert!(timer.ended_at().is_none());
    }

    #[test]
    fn ticks_after_stop_are_ignored() {
        let mut timer = AttemptTimer::new();
        timer.start(t0());
        timer.stop(t0() + Duration::seconds(5));
        timer.tick(t0() + Duration::seconds(50));
        assert_eq!(timer.elapsed_secs(), 5);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(t0());
        clock.advance(Duration::seconds(3));
        assert_eq!(clock.now(), t0() + Duration::seconds(3));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }
}
