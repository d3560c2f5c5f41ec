use std::time::{Duration, Instant};

/// Recurring deadline checked from the GUI loop.
#[derive(Debug, Clone)]
pub struct ProgressTimer {
    period: Duration,
    next_due: Option<Instant>,
}

impl ProgressTimer {
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next_due: Some(now + period),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.map_or(false, |due| now >= due)
    }

    pub fn reschedule(&mut self, now: Instant) {
        if self.next_due.is_some() {
            self.next_due = Some(now + self.period);
        }
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    /// How long the GUI may sleep before the next poll.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_after_period() {
        let start = Instant::now();
        let mut timer = ProgressTimer::new(Duration::from_secs(1), start);

        assert!(!timer.is_due(start));
        assert!(timer.is_due(start + Duration::from_secs(1)));

        timer.reschedule(start + Duration::from_secs(1));
        assert!(!timer.is_due(start + Duration::from_millis(1500)));
        assert_eq!(
            timer.time_until_due(start + Duration::from_millis(1500)),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let start = Instant::now();
        let mut timer = ProgressTimer::new(Duration::from_millis(10), start);
        timer.cancel();
        timer.reschedule(start);

        assert!(!timer.is_due(start + Duration::from_secs(10)));
        assert_eq!(timer.time_until_due(start), None);
    }
}
