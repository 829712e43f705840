use std::collections::BTreeMap;

use crate::node::{ParamValue, Plan};

/// Raw, unvalidated per-request parameter overrides, keyed by node id
/// then param name. Normalising this into a typed parameter table is
/// an external collaborator's job (`spec.md` §6.1); the core only
/// needs to thread it through to that collaborator and to
/// `task_registry`'s per-node param resolution.
pub type ParamOverrides = BTreeMap<String, BTreeMap<String, ParamValue>>;

/// A positive, 32-bit user identifier, accepted from JSON as either a
/// positive integer or a decimal-only non-empty string in
/// `[1, 2^32 - 1]` (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(u32);

#[derive(Debug, snafu::Snafu)]
pub enum UserIdError {
    #[snafu(display("user_id must be in [1, 2^32-1], got {value}"))]
    OutOfRange { value: i64 },
    #[snafu(display("user_id string {raw:?} is not a non-empty decimal integer"))]
    NotDecimal { raw: String },
}

impl UserId {
    pub fn new(value: u32) -> Result<Self, UserIdError> {
        if value == 0 {
            return Err(UserIdError::OutOfRange { value: 0 });
        }
        Ok(Self(value))
    }

    /// Parse from a decimal-only, non-empty string (no sign, no
    /// leading `+`, no whitespace, no leading zero beyond `"0"`
    /// itself — `u32::from_str` already rejects all of those).
    pub fn parse(raw: &str) -> Result<Self, UserIdError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UserIdError::NotDecimal { raw: raw.to_string() });
        }
        let value: u32 = raw.parse().map_err(|_| UserIdError::NotDecimal { raw: raw.to_string() })?;
        Self::new(value)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The boundary-of-the-core request envelope (§6.1): a validated
/// [`Plan`], raw per-node param overrides, the requesting user, and an
/// opaque request id (generated by the caller if absent — generation
/// itself is not this crate's concern, callers pass an already-decided
/// id).
#[derive(Debug, Clone)]
pub struct Request {
    pub plan: Plan,
    pub param_overrides: ParamOverrides,
    pub user_id: UserId,
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_positive_integer() {
        assert_eq!(UserId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn user_id_rejects_zero() {
        assert!(UserId::new(0).is_err());
    }

    #[test]
    fn user_id_parses_decimal_string() {
        assert_eq!(UserId::parse("123").unwrap().get(), 123);
    }

    #[test]
    fn user_id_rejects_non_decimal_string() {
        assert!(UserId::parse("-1").is_err());
        assert!(UserId::parse("1.5").is_err());
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse(" 1").is_err());
    }

    #[test]
    fn user_id_max_value_accepted() {
        assert_eq!(UserId::parse("4294967295").unwrap().get(), u32::MAX);
    }
}
