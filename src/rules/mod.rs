//! Handler rules and the trigger-indexed handler table

mod loader;
mod parser;

pub use loader::{is_rule_file, RuleError, RuleLoader};
pub use parser::{parse_rule_line, parse_rules, RuleParseError};

use crate::input::{ActiveKeySet, EventCode};
use std::collections::HashMap;

/// One `COMBO VALUES COMMAND...` rule
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerRule {
    /// Codes that must already be held
    modifiers: Vec<EventCode>,
    /// Code whose transition evaluates the rule
    trigger: EventCode,
    /// Trigger values that fire the rule
    values: Vec<i32>,
    /// Program followed by its arguments
    command: Vec<String>,
}

impl HandlerRule {
    pub fn new(
        modifiers: Vec<EventCode>,
        trigger: EventCode,
        values: Vec<i32>,
        command: Vec<String>,
    ) -> Self {
        Self {
            modifiers,
            trigger,
            values,
            command,
        }
    }

    pub fn trigger(&self) -> EventCode {
        self.trigger
    }

    pub fn modifiers(&self) -> &[EventCode] {
        &self.modifiers
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Program and arguments
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Command rendered as one line
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// Whether a trigger transition to `value` fires this rule given the
    /// keys currently held.
    pub fn matches(&self, value: i32, active: &ActiveKeySet) -> bool {
        self.values.contains(&value) && active.contains_all(&self.modifiers)
    }
}

/// Rules grouped by trigger code, in registration order
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    by_trigger: HashMap<EventCode, Vec<HandlerRule>>,
    len: usize,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule after any rule already sharing its trigger
    pub fn insert(&mut self, rule: HandlerRule) {
        self.by_trigger.entry(rule.trigger).or_default().push(rule);
        self.len += 1;
    }

    /// Rules triggered by `code`
    pub fn rules_for(&self, code: EventCode) -> &[HandlerRule] {
        self.by_trigger.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Extend<HandlerRule> for HandlerTable {
    fn extend<I: IntoIterator<Item = HandlerRule>>(&mut self, rules: I) {
        for rule in rules {
            self.insert(rule);
        }
    }
}

impl FromIterator<HandlerRule> for HandlerTable {
    fn from_iter<I: IntoIterator<Item = HandlerRule>>(rules: I) -> Self {
        let mut table = Self::new();
        table.extend(rules);
        table
    }
}
