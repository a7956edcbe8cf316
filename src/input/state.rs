//! Held key tracking

use super::EventCode;
use std::collections::HashSet;

/// Codes currently held across all watched devices
#[derive(Debug, Clone, Default)]
pub struct ActiveKeySet {
    held: HashSet<EventCode>,
}

impl ActiveKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event value to the set.
    ///
    /// 0 releases the code, 1 (press) and 2 (autorepeat) hold it. Any other
    /// value leaves the set alone. Returns whether the set changed.
    pub fn apply(&mut self, code: EventCode, value: i32) -> bool {
        match value {
            0 => self.held.remove(&code),
            1 | 2 => self.held.insert(code),
            _ => false,
        }
    }

    /// Whether a code is currently held
    pub fn contains(&self, code: EventCode) -> bool {
        self.held.contains(&code)
    }

    /// Whether every code in `codes` is held
    pub fn contains_all(&self, codes: &[EventCode]) -> bool {
        codes.iter().all(|code| self.held.contains(code))
    }

    /// Number of held codes
    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventCode> {
        self.held.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIFT: EventCode = EventCode {
        class: crate::input::EventClass::Key,
        code: 42,
    };
    const A: EventCode = EventCode {
        class: crate::input::EventClass::Key,
        code: 30,
    };

    #[test]
    fn press_and_repeat_hold_the_key() {
        let mut keys = ActiveKeySet::new();
        assert!(keys.apply(A, 1));
        assert!(!keys.apply(A, 2));
        assert!(keys.contains(A));
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn repeat_without_press_holds_the_key() {
        let mut keys = ActiveKeySet::new();
        keys.apply(A, 2);
        assert!(keys.contains(A));
    }

    #[test]
    fn release_is_idempotent() {
        let mut keys = ActiveKeySet::new();
        keys.apply(A, 1);
        assert!(keys.apply(A, 0));
        assert!(!keys.apply(A, 0));
        assert!(!keys.apply(SHIFT, 0));
        assert!(keys.is_empty());
    }

    #[test]
    fn unknown_values_leave_state_alone() {
        let mut keys = ActiveKeySet::new();
        keys.apply(A, 1);
        assert!(!keys.apply(A, 7));
        assert!(!keys.apply(SHIFT, -1));
        assert!(keys.contains(A));
        assert!(!keys.contains(SHIFT));
    }

    #[test]
    fn contains_all_requires_every_code() {
        let mut keys = ActiveKeySet::new();
        keys.apply(SHIFT, 1);
        assert!(keys.contains_all(&[SHIFT]));
        assert!(!keys.contains_all(&[SHIFT, A]));
        assert!(keys.contains_all(&[]));
    }
}
