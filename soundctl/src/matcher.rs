/// Context rule evaluation.
///
/// Rules are tried in order and the first one whose pattern is found
/// (case-insensitive regex search) in the window attribute selected by its
/// kind wins. Malformed rules are skipped with a log line; they never abort
/// evaluation of the remaining rules.
use std::fmt;
use std::str::FromStr;

use log::{debug, error, warn};
use regex::RegexBuilder;

use crate::config::ContextRule;
use crate::window::WindowInfo;

/// Which attribute of the focused window a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    ActiveWindowTitle,
    ProcessName,
}

impl RuleKind {
    fn subject<'w>(self, window: &'w WindowInfo) -> &'w str {
        match self {
            RuleKind::ActiveWindowTitle => &window.title,
            RuleKind::ProcessName => &window.process_name,
        }
    }
}

impl FromStr for RuleKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active_window_title" => Ok(RuleKind::ActiveWindowTitle),
            "process_name" => Ok(RuleKind::ProcessName),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleKind::ActiveWindowTitle => "active_window_title",
            RuleKind::ProcessName => "process_name",
        })
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Returns the profile named by the first rule matching `window`.
pub fn match_context<'r>(window: Option<&WindowInfo>, rules: &'r [ContextRule]) -> Option<&'r str> {
    let window = window?;
    if rules.is_empty() {
        return None;
    }

    for rule in rules {
        let (Some(kind), Some(pattern), Some(profile)) = (
            non_empty(&rule.kind),
            non_empty(&rule.pattern),
            non_empty(&rule.profile),
        ) else {
            warn!("Skipping invalid context rule: {rule:?}");
            continue;
        };

        let Ok(kind) = kind.parse::<RuleKind>() else {
            warn!("Unsupported context rule type: {kind}");
            continue;
        };

        let re = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                error!("Invalid regex pattern '{pattern}' in context rule: {e}");
                continue;
            }
        };

        let subject = kind.subject(window);
        if re.is_match(subject) {
            debug!("Matched {kind} '{subject}' with pattern '{pattern}' -> profile '{profile}'");
            return Some(profile);
        }
    }
    None
}
