use serde::Serialize;

use crate::constants::COMBO_MAX;

/// Sliding-window consumption counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Combo {
    pub count: u32,
    pub window_secs: f64,
    last_at: Option<f64>,
    pub highest: u32,
}

impl Combo {
    pub fn new(window_secs: f64) -> Self {
        Self {
            count: 0,
            window_secs,
            last_at: None,
            highest: 0,
        }
    }

    fn within_window(&self, now: f64) -> bool {
        self.last_at.is_some_and(|t| now - t <= self.window_secs)
    }

    /// Registers a consumption and returns the new count.
    pub fn register(&mut self, now: f64) -> u32 {
        self.count = if self.count > 0 && self.within_window(now) {
            (self.count + 1).min(COMBO_MAX)
        } else {
            1
        };
        self.last_at = Some(now);
        self.highest = self.highest.max(self.count);
        self.count
    }

    pub fn multiplier(&self) -> u64 {
        match self.count {
            0..=1 => 1,
            2..=4 => 2,
            5..=9 => 3,
            10..=14 => 4,
            _ => 5,
        }
    }

    /// Idle check. Returns true if the combo just lapsed.
    pub fn expire(&mut self, now: f64) -> bool {
        if self.count > 0 && !self.within_window(now) {
            self.count = 0;
            return true;
        }
        false
    }

    /// Drops the live count but keeps the run's best.
    pub fn reset(&mut self) {
        self.count = 0;
        self.last_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_steps() {
        let mut combo = Combo::new(2.0);
        let expected = [1, 2, 2, 2, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 5, 5];
        for (i, want) in expected.into_iter().enumerate() {
            combo.register(i as f64 * 0.5);
            assert_eq!(combo.multiplier(), want, "count {}", combo.count);
        }
    }

    #[test]
    fn decays_after_window() {
        let mut combo = Combo::new(2.0);
        for t in [0.0, 0.5, 1.0] {
            combo.register(t);
        }
        assert_eq!((combo.count, combo.multiplier()), (3, 2));
        assert!(!combo.expire(2.9));
        assert!(combo.expire(3.1));
        assert_eq!((combo.count, combo.multiplier()), (0, 1));
        assert_eq!(combo.highest, 3);
    }

    #[test]
    fn late_consumption_restarts_at_one() {
        let mut combo = Combo::new(2.0);
        combo.register(0.0);
        combo.register(1.0);
        assert_eq!(combo.register(5.0), 1);
    }

    #[test]
    fn caps_at_max() {
        let mut combo = Combo::new(2.0);
        for i in 0..40 {
            combo.register(i as f64 * 0.1);
        }
        assert_eq!(combo.count, COMBO_MAX);
    }
}
