//! Deadline computation, ported from the original `deadline.h`: the
//! effective deadline for a node is the earlier of the request-level
//! deadline and `start_time + node_timeout`.

use crate::Time;
use std::time::Duration;

/// An optional deadline: `None` means "no deadline".
pub type OptionalDeadline = Option<Time>;

/// Check if a deadline has been exceeded right now.
pub fn deadline_exceeded(now: Time, deadline: OptionalDeadline) -> bool {
    deadline.is_some_and(|d| now >= d)
}

/// Check if a deadline has been exceeded as of a given instant.
///
/// Same as [`deadline_exceeded`] but named to mirror the original
/// `deadline_exceeded_at`, which takes `now` explicitly for
/// deterministic testing.
pub fn deadline_exceeded_at(now: Time, deadline: OptionalDeadline) -> bool {
    deadline_exceeded(now, deadline)
}

/// Compute the effective deadline for a node: the earlier of the
/// request-level deadline and `start_time + node_timeout`.
///
/// Returns `None` if neither is set.
pub fn compute_effective_deadline(
    start_time: Time,
    request_deadline: OptionalDeadline,
    node_timeout: Option<Duration>,
) -> OptionalDeadline {
    let mut effective = request_deadline;

    if let Some(timeout) = node_timeout {
        let node_deadline = start_time + timeout;
        effective = Some(match effective {
            Some(d) if d < node_deadline => d,
            _ => node_deadline,
        });
    }

    effective
}

/// Milliseconds remaining until `deadline`, saturating at zero.
pub fn ms_until_deadline(now: Time, deadline: Time) -> u64 {
    deadline.saturating_duration_since(now).as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn effective_deadline_takes_earlier() {
        let start = Instant::now();
        let request_deadline = start + Duration::from_millis(100);
        let node_timeout = Duration::from_millis(50);

        let effective = compute_effective_deadline(start, Some(request_deadline), Some(node_timeout));
        assert_eq!(effective, Some(start + Duration::from_millis(50)));
    }

    #[test]
    fn effective_deadline_none_when_unset() {
        let start = Instant::now();
        assert_eq!(compute_effective_deadline(start, None, None), None);
    }

    #[test]
    fn exceeded_checks_boundary() {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(10);
        assert!(!deadline_exceeded(start, Some(deadline)));
        assert!(deadline_exceeded(start + Duration::from_millis(10), Some(deadline)));
        assert!(!deadline_exceeded(start, None));
    }

    #[test]
    fn ms_until_deadline_saturates() {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(10);
        assert_eq!(ms_until_deadline(start, deadline), 10);
        assert_eq!(ms_until_deadline(start + Duration::from_millis(20), deadline), 0);
    }
}
