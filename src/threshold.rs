//! Debounced dark/light detection over a sliding window of illuminance values.

use std::collections::VecDeque;
use std::fmt;

use log::debug;
use time::OffsetDateTime;

use crate::utils::{format_date, format_time};

/// Default number of readings kept in the window.
pub const DEFAULT_WINDOW_CAPACITY: usize = 60;

/// Lowest window entries ignored by the dark test.
pub const DEFAULT_IGNORE_LOWEST: usize = 10;

/// Cycles after start or after a transition before the status is evaluated.
const WARMUP_CYCLES: u32 = 10;

/// The cycle counter stops counting here.
const COUNTER_CAP: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Lid closed, no light.
    Dark,
    /// Light on and/or lid open.
    Light,
}

impl Status {
    pub fn code(&self) -> u8 {
        match self {
            Status::Dark => 0,
            Status::Light => 1,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Dark => f.write_str("dark"),
            Status::Light => f.write_str("light"),
        }
    }
}

/// Fixed-capacity history of the most recent readings, oldest first.
///
/// Starts out full of zeros so the threshold test is defined from the first
/// cycle on.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: std::iter::repeat(0.0).take(capacity).collect(),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest one when full.
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    /// Window contents in ascending order.
    pub fn sorted(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.values.iter().copied().collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub threshold: f64,
    pub ignore_lowest: usize,
}

impl ThresholdPolicy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            ignore_lowest: DEFAULT_IGNORE_LOWEST,
        }
    }
}

/// Compute the status of `window` and whether it differs from `previous`.
///
/// Dark when every value above the lowest `ignore_lowest` is below the
/// threshold. Otherwise light only if all values reach the threshold, and
/// dark again for any mixed window.
pub fn check_thresholds(
    window: &SlidingWindow,
    policy: &ThresholdPolicy,
    previous: Status,
) -> (Status, bool) {
    let sorted = window.sorted();
    let upper = sorted.get(policy.ignore_lowest..).unwrap_or(&[]);
    let dark = upper.iter().all(|value| *value < policy.threshold);

    let status = if !dark && window.iter().all(|value| *value >= policy.threshold) {
        Status::Light
    } else {
        Status::Dark
    };
    (status, status != previous)
}

/// A status change, logged as an "end" row for the old status and a "start"
/// row for the new one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
    pub at: OffsetDateTime,
}

impl Transition {
    pub fn log_rows(&self, station: &str) -> [Vec<String>; 2] {
        let row = |status: Status, edge: &str| {
            vec![
                format_date(&self.at),
                format_time(&self.at),
                station.to_string(),
                "status".to_string(),
                status.code().to_string(),
                status.to_string(),
                edge.to_string(),
            ]
        };
        [row(self.from, "end"), row(self.to, "start")]
    }
}

/// Sliding window plus the last emitted status.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    window: SlidingWindow,
    policy: ThresholdPolicy,
    status: Status,
    counter: u32,
}

impl StatusTracker {
    pub fn new(capacity: usize, policy: ThresholdPolicy) -> Self {
        Self {
            window: SlidingWindow::new(capacity),
            policy,
            status: Status::Dark,
            counter: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Feed one reading taken at `at`.
    ///
    /// Nothing is evaluated during the warm-up after start or after the last
    /// transition; the window has to settle first.
    pub fn update(&mut self, value: f64, at: OffsetDateTime) -> Option<Transition> {
        if self.counter < COUNTER_CAP {
            self.counter += 1;
        }
        self.window.push(value);

        if self.counter <= WARMUP_CYCLES {
            return None;
        }

        let (status, changed) = check_thresholds(&self.window, &self.policy, self.status);
        if !changed {
            return None;
        }

        let transition = Transition {
            from: self.status,
            to: status,
            at,
        };
        debug!("Status changed from {} to {}", transition.from, transition.to);
        self.status = status;
        self.counter = 0;
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const AT: OffsetDateTime = datetime!(2023-06-01 12:00:00 UTC);

    fn feed(tracker: &mut StatusTracker, values: impl IntoIterator<Item = f64>) -> Vec<Transition> {
        values
            .into_iter()
            .filter_map(|value| tracker.update(value, AT))
            .collect()
    }

    #[test]
    fn window_starts_full_of_zeros_and_evicts_oldest() {
        let mut window = SlidingWindow::new(3);
        assert_eq!(window.sorted(), vec![0.0, 0.0, 0.0]);

        for value in [5.0, 1.0, 3.0, 2.0] {
            window.push(value);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![1.0, 3.0, 2.0]);
        assert_eq!(window.sorted(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn mixed_window_is_dark() {
        let policy = ThresholdPolicy::new(50.0);
        let mut window = SlidingWindow::new(20);
        for _ in 0..19 {
            window.push(100.0);
        }
        // one zero left from seeding
        assert_eq!(check_thresholds(&window, &policy, Status::Light), (Status::Dark, true));

        window.push(100.0);
        assert_eq!(check_thresholds(&window, &policy, Status::Dark), (Status::Light, true));
        assert_eq!(check_thresholds(&window, &policy, Status::Light), (Status::Light, false));
    }

    #[test]
    fn small_window_is_always_dark() {
        let policy = ThresholdPolicy::new(50.0);
        let mut window = SlidingWindow::new(5);
        for _ in 0..5 {
            window.push(10.0);
        }
        assert_eq!(check_thresholds(&window, &policy, Status::Dark), (Status::Dark, false));
    }

    #[test]
    fn single_crossing_gives_one_transition() {
        let mut tracker = StatusTracker::new(DEFAULT_WINDOW_CAPACITY, ThresholdPolicy::new(50.0));
        let transitions = feed(
            &mut tracker,
            std::iter::repeat(5.0).take(30).chain(std::iter::repeat(400.0).take(120)),
        );

        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].from, Status::Dark);
        assert_eq!(transitions[0].to, Status::Light);
        assert_eq!(tracker.status(), Status::Light);

        let [end, start] = transitions[0].log_rows("WS4");
        assert_eq!(end, vec!["20230601", "120000", "WS4", "status", "0", "dark", "end"]);
        assert_eq!(start, vec!["20230601", "120000", "WS4", "status", "1", "light", "start"]);
        assert_eq!(end[..2], start[..2]);
    }

    #[test]
    fn oscillation_within_a_bucket_gives_no_transition() {
        let mut tracker = StatusTracker::new(DEFAULT_WINDOW_CAPACITY, ThresholdPolicy::new(50.0));
        let values = (0..200).map(|i| if i % 2 == 0 { 12.0 } else { 40.0 });
        assert!(feed(&mut tracker, values).is_empty());
        assert_eq!(tracker.status(), Status::Dark);
    }

    #[test]
    fn no_evaluation_during_warmup() {
        // With a zero threshold even the seeded zeros count as light, so the
        // window reads light from the first update on.
        let policy = ThresholdPolicy::new(0.0);
        assert_eq!(
            check_thresholds(&SlidingWindow::new(20), &policy, Status::Dark),
            (Status::Light, true)
        );

        let mut tracker = StatusTracker::new(20, policy);

        let transitions = feed(&mut tracker, std::iter::repeat(1.0).take(10));
        assert!(transitions.is_empty());
        assert_eq!(tracker.status(), Status::Dark);

        let transition = tracker.update(1.0, AT).unwrap();
        assert_eq!(transition.to, Status::Light);
        assert_eq!(tracker.status(), Status::Light);
    }

    #[test]
    fn transition_restarts_the_warmup() {
        let mut tracker = StatusTracker::new(20, ThresholdPolicy::new(50.0));
        // The window is all bright on the 20th sample.
        let transitions = feed(&mut tracker, std::iter::repeat(400.0).take(20));
        assert_eq!(transitions.len(), 1);

        // A dark reading right after the transition is not evaluated yet.
        let quiet = feed(&mut tracker, std::iter::repeat(0.0).take(10));
        assert!(quiet.is_empty());
        assert_eq!(tracker.status(), Status::Light);

        let back = feed(&mut tracker, [0.0]);
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].to, Status::Dark);
    }
}
