//! Held-button auto repeat.

/// Fires once on press, then repeatedly while held: first after
/// `delay_ms`, then every `interval_ms`. At most one repeat per update.
#[derive(Debug, Clone)]
pub struct RepeatTrigger {
    delay_ms: u64,
    interval_ms: u64,
    held: bool,
    hold_ms: u64,
    last_fire_ms: u64,
}

impl RepeatTrigger {
    pub fn new(delay_ms: u64, interval_ms: u64) -> Self {
        Self {
            delay_ms,
            interval_ms,
            held: false,
            hold_ms: 0,
            last_fire_ms: 0,
        }
    }

    /// Starts a hold. Always fires.
    pub fn press(&mut self) -> bool {
        self.held = true;
        self.hold_ms = 0;
        self.last_fire_ms = 0;
        true
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Advances the hold clock. Returns whether a repeat fires.
    pub fn update(&mut self, delta_ms: u64) -> bool {
        if !self.held {
            return false;
        }
        self.hold_ms = self.hold_ms.saturating_add(delta_ms);
        if self.hold_ms >= self.delay_ms && self.hold_ms - self.last_fire_ms >= self.interval_ms {
            self.last_fire_ms = self.hold_ms;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fires(trigger: &mut RepeatTrigger, ticks: usize, delta_ms: u64) -> usize {
        (0..ticks).filter(|_| trigger.update(delta_ms)).count()
    }

    #[test]
    fn test_press_fires_immediately() {
        let mut trigger = RepeatTrigger::new(500, 200);
        assert!(trigger.press());
    }

    #[test]
    fn test_no_repeat_before_delay() {
        let mut trigger = RepeatTrigger::new(500, 200);
        trigger.press();
        assert_eq!(fires(&mut trigger, 49, 10), 0);
        assert!(trigger.update(10));
    }

    #[test]
    fn test_repeats_at_interval_after_delay() {
        let mut trigger = RepeatTrigger::new(500, 200);
        trigger.press();
        // 500ms delay then every 200ms: fires at 500, 700, 900
        assert_eq!(fires(&mut trigger, 100, 10), 3);
    }

    #[test]
    fn test_release_stops_repeats() {
        let mut trigger = RepeatTrigger::new(500, 200);
        trigger.press();
        trigger.release();
        assert_eq!(fires(&mut trigger, 100, 10), 0);
        assert!(!trigger.is_held());
    }
}
