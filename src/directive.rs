//! Simulation directive parsing.
//!
//! A directive tells the hollow runtime how long a sandbox or container should
//! appear to run and which terminal phase it reaches afterwards. Directives are
//! read from configuration labels (see [`RUN_DURATION_LABEL`] and
//! [`TERMINAL_PHASE_LABEL`]). Parsing is best-effort: a malformed value is
//! dropped and the record simply never expires.

use crate::constants::{
    EXIT_CODE_FAILED, EXIT_CODE_SUCCEEDED, EXIT_CODE_TERMINATED, RUN_DURATION_LABEL,
    TERMINAL_PHASE_LABEL,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Terminal Phase
// =============================================================================

/// Final phase a simulated record reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TerminalPhase {
    /// Stopped before completing (explicit stop or simulated kill).
    Terminated,
    /// Completed successfully.
    Succeeded,
    /// Completed with a failure.
    Failed,
}

impl TerminalPhase {
    /// Parses a phase name, ignoring ASCII case.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("terminated") {
            Some(Self::Terminated)
        } else if s.eq_ignore_ascii_case("succeeded") {
            Some(Self::Succeeded)
        } else if s.eq_ignore_ascii_case("failed") {
            Some(Self::Failed)
        } else {
            None
        }
    }

    /// Exit code reported for a container ending in this phase.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Succeeded => EXIT_CODE_SUCCEEDED,
            Self::Failed => EXIT_CODE_FAILED,
            Self::Terminated => EXIT_CODE_TERMINATED,
        }
    }
}

impl std::fmt::Display for TerminalPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminated => write!(f, "Terminated"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Directive
// =============================================================================

/// Simulated run duration and terminal phase for a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// How long the record appears to run.
    pub duration: Option<Duration>,
    /// Phase reached once `duration` elapses.
    pub terminal_phase: Option<TerminalPhase>,
}

impl Directive {
    /// Extracts a directive from configuration labels.
    ///
    /// Never fails. Unparsable durations and unknown phase names are treated
    /// as absent.
    pub fn from_labels(labels: &HashMap<String, String>) -> Self {
        let duration = labels.get(RUN_DURATION_LABEL).and_then(|v| {
            let parsed = parse_duration(v);
            if parsed.is_none() {
                debug!("ignoring malformed {} '{}'", RUN_DURATION_LABEL, v);
            }
            parsed
        });

        let terminal_phase = labels.get(TERMINAL_PHASE_LABEL).and_then(|v| {
            let parsed = TerminalPhase::parse(v);
            if parsed.is_none() {
                debug!("ignoring unknown {} '{}'", TERMINAL_PHASE_LABEL, v);
            }
            parsed
        });

        Self {
            duration,
            terminal_phase,
        }
    }

    /// Fills fields missing from `self` with those of `fallback`.
    #[must_use]
    pub fn or(self, fallback: Directive) -> Self {
        Self {
            duration: self.duration.or(fallback.duration),
            terminal_phase: self.terminal_phase.or(fallback.terminal_phase),
        }
    }

    /// Returns true if the record will reach a terminal phase on its own.
    #[must_use]
    pub fn expires(&self) -> bool {
        self.duration.is_some() && self.terminal_phase.is_some()
    }
}

/// Parses a duration such as `"5m"`, `"1h30m"` or `"250ms"`.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value == "0" {
        return Some(Duration::ZERO);
    }
    humantime::parse_duration(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_full_directive() {
        let d = Directive::from_labels(&labels(&[
            (RUN_DURATION_LABEL, "5m"),
            (TERMINAL_PHASE_LABEL, "Succeeded"),
        ]));
        assert_eq!(d.duration, Some(Duration::from_secs(300)));
        assert_eq!(d.terminal_phase, Some(TerminalPhase::Succeeded));
        assert!(d.expires());
    }

    #[test]
    fn test_compound_and_subsecond_durations() {
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration("0s"), Some(Duration::ZERO));
    }

    #[test]
    fn test_malformed_duration_is_absent() {
        let d = Directive::from_labels(&labels(&[
            (RUN_DURATION_LABEL, "soon"),
            (TERMINAL_PHASE_LABEL, "Failed"),
        ]));
        assert_eq!(d.duration, None);
        assert_eq!(d.terminal_phase, Some(TerminalPhase::Failed));
        assert!(!d.expires());
    }

    #[test]
    fn test_unknown_phase_is_absent() {
        let d = Directive::from_labels(&labels(&[
            (RUN_DURATION_LABEL, "2s"),
            (TERMINAL_PHASE_LABEL, "Exploded"),
        ]));
        assert_eq!(d.duration, Some(Duration::from_secs(2)));
        assert_eq!(d.terminal_phase, None);
        assert!(!d.expires());
    }

    #[test]
    fn test_phase_case_insensitive() {
        assert_eq!(TerminalPhase::parse("terminated"), Some(TerminalPhase::Terminated));
        assert_eq!(TerminalPhase::parse(" FAILED "), Some(TerminalPhase::Failed));
    }

    #[test]
    fn test_no_labels() {
        let d = Directive::from_labels(&HashMap::new());
        assert_eq!(d, Directive::default());
        assert!(!d.expires());
    }

    #[test]
    fn test_or_fills_missing_fields() {
        let own = Directive {
            duration: Some(Duration::from_secs(1)),
            terminal_phase: None,
        };
        let parent = Directive {
            duration: Some(Duration::from_secs(60)),
            terminal_phase: Some(TerminalPhase::Failed),
        };
        let merged = own.or(parent);
        assert_eq!(merged.duration, Some(Duration::from_secs(1)));
        assert_eq!(merged.terminal_phase, Some(TerminalPhase::Failed));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(TerminalPhase::Succeeded.exit_code(), 0);
        assert_eq!(TerminalPhase::Failed.exit_code(), 1);
        assert_eq!(TerminalPhase::Terminated.exit_code(), 143);
    }
}
