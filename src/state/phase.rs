use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Named ordered stages of the retrospective lifecycle.
///
/// The ordering is advisory metadata for clients; the controller itself
/// treats the tags as opaque and allows any host-requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetroPhase {
    /// Participants post free-text responses.
    Brainstorm,
    /// Responses are clustered into groups.
    Group,
    /// Participants distribute their vote budget across groups.
    Vote,
    /// The host walks through the results.
    Discuss,
}

/// Timer fields carried by a phase change request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerRequest {
    /// Countdown length in seconds, when the host starts a fresh timer.
    pub duration_secs: Option<u64>,
    /// Explicit request to clear the countdown.
    pub stop: bool,
}

/// Resolve the advisory countdown end time for a phase transition.
///
/// `stop` clears the end time; otherwise a given duration starts a fresh
/// countdown from `now`; otherwise the prior end time is preserved. The
/// result is metadata only, nothing fires server-side when it elapses.
pub fn resolve_timer_end(
    now: SystemTime,
    prior: Option<SystemTime>,
    request: TimerRequest,
) -> Option<SystemTime> {
    if request.stop {
        return None;
    }
    match request.duration_secs {
        Some(secs) => Some(now + Duration::from_secs(secs)),
        None => prior,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000)
    }

    #[test]
    fn stop_clears_the_end_time() {
        let prior = Some(base() + Duration::from_secs(30));
        let request = TimerRequest {
            duration_secs: None,
            stop: true,
        };
        assert_eq!(resolve_timer_end(base(), prior, request), None);
    }

    #[test]
    fn stop_wins_over_a_duration() {
        let request = TimerRequest {
            duration_secs: Some(60),
            stop: true,
        };
        assert_eq!(resolve_timer_end(base(), None, request), None);
    }

    #[test]
    fn duration_starts_a_fresh_countdown() {
        let prior = Some(base() + Duration::from_secs(5));
        let request = TimerRequest {
            duration_secs: Some(60),
            stop: false,
        };
        assert_eq!(
            resolve_timer_end(base(), prior, request),
            Some(base() + Duration::from_secs(60))
        );
    }

    #[test]
    fn absent_fields_preserve_the_prior_end_time() {
        let prior = Some(base() + Duration::from_secs(42));
        assert_eq!(
            resolve_timer_end(base(), prior, TimerRequest::default()),
            prior
        );
        assert_eq!(resolve_timer_end(base(), None, TimerRequest::default()), None);
    }

    #[test]
    fn phase_tags_are_ordered() {
        assert!(RetroPhase::Brainstorm < RetroPhase::Group);
        assert!(RetroPhase::Group < RetroPhase::Vote);
        assert!(RetroPhase::Vote < RetroPhase::Discuss);
    }
}
