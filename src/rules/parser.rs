//! Rule line grammar
//!
//! ```text
//! KEY_LEFTSHIFT+KEY_VOLUMEUP   1,2   amixer set Master 5%+
//! ```
//!
//! The last name of the combo is the trigger, the others are modifiers.
//! Values are comma separated integers; every remaining token is the
//! command and its arguments, taken verbatim.

use super::HandlerRule;
use crate::input::codes::strip_comment;
use crate::input::EventCodeTable;
use log::warn;
use thiserror::Error;

/// Why a rule line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("expected COMBO VALUES COMMAND")]
    MissingFields,
    #[error("empty name in combo {0:?}")]
    EmptyComboMember(String),
    #[error("unknown event name {0:?}")]
    UnknownEvent(String),
    #[error("invalid value {0:?}")]
    InvalidValue(String),
}

/// Parse one line. Blank and comment-only lines give `Ok(None)`.
pub fn parse_rule_line(
    line: &str,
    codes: &EventCodeTable,
) -> Result<Option<HandlerRule>, RuleParseError> {
    let mut fields = strip_comment(line).split_whitespace();

    let Some(combo) = fields.next() else {
        return Ok(None);
    };
    let values = fields.next().ok_or(RuleParseError::MissingFields)?;
    let command: Vec<String> = fields.map(str::to_string).collect();
    if command.is_empty() {
        return Err(RuleParseError::MissingFields);
    }

    let mut members = combo
        .split('+')
        .map(|name| {
            if name.is_empty() {
                return Err(RuleParseError::EmptyComboMember(combo.to_string()));
            }
            codes
                .resolve(name)
                .ok_or_else(|| RuleParseError::UnknownEvent(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    // split always yields at least one member
    let trigger = members.pop().ok_or(RuleParseError::MissingFields)?;

    let values = values
        .split(',')
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| RuleParseError::InvalidValue(v.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(HandlerRule::new(members, trigger, values, command)))
}

/// Parse a whole rule file, skipping bad lines with a warning
pub fn parse_rules(contents: &str, codes: &EventCodeTable, origin: &str) -> Vec<HandlerRule> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match parse_rule_line(line, codes) {
            Ok(rule) => rule,
            Err(e) => {
                warn!("{}:{}: skipping rule: {}", origin, index + 1, e);
                None
            }
        })
        .collect()
}
