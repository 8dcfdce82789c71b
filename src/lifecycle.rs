//! # Transition Engine
//!
//! Derives the current lifecycle phase of a simulated record from its stored
//! timestamps and directive. Nothing here mutates state or schedules work:
//! the phase is computed at query time, so thousands of simulated pods need no
//! timers and a status query can never race a background sweep.
//!
//! ```text
//!   ┌─────────┐   start   ┌─────────┐   duration elapsed   ┌──────────────┐
//!   │ Created │ ────────► │ Running │ ───────────────────► │ Terminal(P)  │
//!   └─────────┘           └─────────┘                      └──────────────┘
//!        │                     │              stop                ▲
//!        └─────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Sandboxes are running from creation; containers wait in `Created` until
//! started. An explicit stop always wins over the simulated timeline, but a
//! record that had already expired keeps the phase it reached first.

use crate::directive::{Directive, TerminalPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived lifecycle phase of a sandbox or container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Created but not yet started (containers only).
    Created,
    /// Running.
    Running,
    /// Reached a terminal phase.
    Terminal(TerminalPhase),
}

impl Phase {
    /// Returns true for any terminal phase.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Terminal(p) => write!(f, "{p}"),
        }
    }
}

/// Timestamps and directive a phase is derived from.
#[derive(Debug, Clone, Copy)]
pub struct Timeline {
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was started. `None` keeps it in `Created`.
    pub started_at: Option<DateTime<Utc>>,
    /// When the record was explicitly stopped (the forced-terminal flag).
    pub stopped_at: Option<DateTime<Utc>>,
    /// Simulated run duration and terminal phase.
    pub directive: Directive,
}

impl Timeline {
    /// Moment the directive makes the record expire, if it ever does.
    fn natural_expiry(&self) -> Option<(DateTime<Utc>, TerminalPhase)> {
        let (Some(duration), Some(terminal)) =
            (self.directive.duration, self.directive.terminal_phase)
        else {
            return None;
        };
        // An unrepresentable expiry is effectively never.
        let duration = chrono::Duration::from_std(duration).ok()?;
        let at = self.created_at.checked_add_signed(duration)?;
        Some((at, terminal))
    }
}

/// Derives the phase of `timeline` at `now`.
#[must_use]
pub fn phase(timeline: &Timeline, now: DateTime<Utc>) -> Phase {
    let expiry = timeline.natural_expiry();

    if let Some(stopped_at) = timeline.stopped_at {
        return match expiry {
            Some((at, terminal)) if at <= stopped_at && timeline.started_at.is_some() => {
                Phase::Terminal(terminal)
            }
            _ => Phase::Terminal(TerminalPhase::Terminated),
        };
    }

    if timeline.started_at.is_none() {
        return Phase::Created;
    }

    match expiry {
        Some((at, terminal)) if now >= at => Phase::Terminal(terminal),
        _ => Phase::Running,
    }
}

/// Time the record reached its terminal phase, if it has by `now`.
#[must_use]
pub fn finished_at(timeline: &Timeline, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let expiry = timeline.natural_expiry().map(|(at, _)| at);
    let finished = match (timeline.stopped_at, expiry) {
        (Some(stopped), Some(at)) if timeline.started_at.is_some() => Some(stopped.min(at)),
        (Some(stopped), _) => Some(stopped),
        (None, Some(at)) if timeline.started_at.is_some() && now >= at => Some(at),
        _ => None,
    };
    // A record started after its expiry finishes no earlier than its start.
    match (finished, timeline.started_at) {
        (Some(at), Some(started)) => Some(at.max(started)),
        (finished, _) => finished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    fn running(directive: Directive) -> Timeline {
        Timeline {
            created_at: t0(),
            started_at: Some(t0()),
            stopped_at: None,
            directive,
        }
    }

    fn expiring(d: u64, p: TerminalPhase) -> Directive {
        Directive {
            duration: Some(Duration::from_secs(d)),
            terminal_phase: Some(p),
        }
    }

    #[test]
    fn test_no_directive_runs_forever() {
        let tl = running(Directive::default());
        assert_eq!(phase(&tl, t0()), Phase::Running);
        assert_eq!(phase(&tl, t0() + secs(3600)), Phase::Running);
        assert_eq!(phase(&tl, t0() + secs(86_400 * 365)), Phase::Running);
        assert_eq!(finished_at(&tl, t0() + secs(3600)), None);
    }

    #[test]
    fn test_duration_without_phase_runs_forever() {
        let tl = running(Directive {
            duration: Some(Duration::from_secs(1)),
            terminal_phase: None,
        });
        assert_eq!(phase(&tl, t0() + secs(10)), Phase::Running);
    }

    #[test]
    fn test_phase_without_duration_runs_forever() {
        let tl = running(Directive {
            duration: None,
            terminal_phase: Some(TerminalPhase::Failed),
        });
        assert_eq!(phase(&tl, t0() + secs(10)), Phase::Running);
    }

    #[test]
    fn test_expiry_boundary() {
        let tl = running(expiring(2, TerminalPhase::Terminated));
        assert_eq!(phase(&tl, t0() + chrono::Duration::milliseconds(1999)), Phase::Running);
        assert_eq!(
            phase(&tl, t0() + secs(2)),
            Phase::Terminal(TerminalPhase::Terminated)
        );
        assert_eq!(finished_at(&tl, t0() + secs(3)), Some(t0() + secs(2)));
    }

    #[test]
    fn test_zero_duration_terminal_immediately() {
        let tl = running(expiring(0, TerminalPhase::Succeeded));
        assert_eq!(phase(&tl, t0()), Phase::Terminal(TerminalPhase::Succeeded));
    }

    #[test]
    fn test_stop_before_expiry_forces_terminated() {
        let mut tl = running(expiring(60, TerminalPhase::Succeeded));
        tl.stopped_at = Some(t0() + secs(5));
        assert_eq!(
            phase(&tl, t0() + secs(6)),
            Phase::Terminal(TerminalPhase::Terminated)
        );
        // Still terminated long after the simulated duration would have elapsed.
        assert_eq!(
            phase(&tl, t0() + secs(600)),
            Phase::Terminal(TerminalPhase::Terminated)
        );
        assert_eq!(finished_at(&tl, t0() + secs(600)), Some(t0() + secs(5)));
    }

    #[test]
    fn test_stop_after_expiry_keeps_natural_phase() {
        let mut tl = running(expiring(2, TerminalPhase::Failed));
        tl.stopped_at = Some(t0() + secs(10));
        assert_eq!(
            phase(&tl, t0() + secs(11)),
            Phase::Terminal(TerminalPhase::Failed)
        );
        assert_eq!(finished_at(&tl, t0() + secs(11)), Some(t0() + secs(2)));
    }

    #[test]
    fn test_start_after_expiry_finishes_at_start() {
        let mut tl = running(expiring(1, TerminalPhase::Succeeded));
        tl.started_at = Some(t0() + secs(10));
        assert_eq!(
            phase(&tl, t0() + secs(10)),
            Phase::Terminal(TerminalPhase::Succeeded)
        );
        assert_eq!(finished_at(&tl, t0() + secs(10)), Some(t0() + secs(10)));

        tl.stopped_at = Some(t0() + secs(20));
        assert_eq!(finished_at(&tl, t0() + secs(30)), Some(t0() + secs(10)));
    }

    #[test]
    fn test_stop_without_directive() {
        let mut tl = running(Directive::default());
        tl.stopped_at = Some(t0() + secs(1));
        assert_eq!(
            phase(&tl, t0() + secs(1)),
            Phase::Terminal(TerminalPhase::Terminated)
        );
    }

    #[test]
    fn test_unstarted_stays_created() {
        let tl = Timeline {
            created_at: t0(),
            started_at: None,
            stopped_at: None,
            directive: expiring(1, TerminalPhase::Succeeded),
        };
        assert_eq!(phase(&tl, t0() + secs(100)), Phase::Created);
        assert_eq!(finished_at(&tl, t0() + secs(100)), None);
    }

    #[test]
    fn test_unstarted_stop_is_terminated() {
        let tl = Timeline {
            created_at: t0(),
            started_at: None,
            stopped_at: Some(t0() + secs(5)),
            directive: expiring(1, TerminalPhase::Succeeded),
        };
        assert_eq!(
            phase(&tl, t0() + secs(6)),
            Phase::Terminal(TerminalPhase::Terminated)
        );
    }

    #[test]
    fn test_monotonic_over_time() {
        let tl = running(expiring(30, TerminalPhase::Succeeded));
        let mut seen_terminal = false;
        for s in 0..120 {
            let p = phase(&tl, t0() + secs(s));
            if seen_terminal {
                assert!(p.is_terminal(), "phase went backwards at t+{s}s");
            }
            seen_terminal |= p.is_terminal();
        }
        assert!(seen_terminal);
    }
}
