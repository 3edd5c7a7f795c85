//! Decisions, deny reasons and obligations.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::attributes::Attributes;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenyReason {
    /// Not denied.
    #[default]
    None,
    /// Denied by IAM policy.
    #[serde(rename = "IAM")]
    Iam,
    /// Denied by a context-based restriction.
    Context,
}

impl DenyReason {
    /// Map the PDP `reason` field of a deny. Anything other than `Context`
    /// (including no reason at all) is an IAM deny.
    pub fn from_pdp(reason: Option<&str>) -> Self {
        match reason {
            Some(r) if r.eq_ignore_ascii_case("context") => Self::Context,
            _ => Self::Iam,
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Iam => f.write_str("IAM"),
            Self::Context => f.write_str("Context"),
        }
    }
}

/// Permit metadata describing the wider set of requests a permit covers.
///
/// Any part may be missing; a missing part narrows caching to the exact
/// request shape on that side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Obligation {
    /// Actions the permit also grants.
    pub actions: BTreeSet<String>,
    /// Maximum age advertised by the PDP.
    pub max_cache_age: Option<Duration>,
    /// Subject attributes the permit applies to.
    pub subject: Option<Attributes>,
    /// Resource attributes the permit applies to.
    pub resource: Option<Attributes>,
}

impl Obligation {
    /// Builder-style action list.
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style max age.
    pub fn with_max_cache_age(mut self, age: Duration) -> Self {
        self.max_cache_age = Some(age);
        self
    }

    /// Builder-style subject attributes.
    pub fn with_subject(mut self, subject: Attributes) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Builder-style resource attributes.
    pub fn with_resource(mut self, resource: Attributes) -> Self {
        self.resource = Some(resource);
        self
    }
}

/// One decision as parsed from a PDP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdpDecision {
    /// Whether the request is permitted.
    pub permitted: bool,
    /// Deny reason (`None` for permits).
    pub reason: DenyReason,
    /// Obligation attached to a permit.
    pub obligation: Option<Obligation>,
}

impl PdpDecision {
    /// A permit with an optional obligation.
    pub fn permit(obligation: Option<Obligation>) -> Self {
        Self {
            permitted: true,
            reason: DenyReason::None,
            obligation,
        }
    }

    /// A deny with the given reason.
    pub fn deny(reason: DenyReason) -> Self {
        Self {
            permitted: false,
            reason,
            obligation: None,
        }
    }
}

/// The decision returned to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Whether the request is permitted.
    pub permitted: bool,
    /// Whether the decision came from the cache.
    pub cached: bool,
    /// Whether a cached decision past its TTL was served because the PDP
    /// failed. Implies `cached`.
    pub expired: bool,
    /// Number of PDP retries that preceded this decision.
    pub retry_count: u32,
    /// Deny reason.
    pub reason: DenyReason,
}

impl Decision {
    /// A decision freshly returned by the PDP.
    pub fn from_pdp(decision: &PdpDecision, retry_count: u32) -> Self {
        Self {
            permitted: decision.permitted,
            cached: false,
            expired: false,
            retry_count,
            reason: decision.reason,
        }
    }

    /// A decision served from the cache.
    pub fn from_cache(permitted: bool, reason: DenyReason, expired: bool) -> Self {
        Self {
            permitted,
            cached: true,
            expired,
            retry_count: 0,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_reason_mapping() {
        assert_eq!(DenyReason::from_pdp(Some("Context")), DenyReason::Context);
        assert_eq!(DenyReason::from_pdp(Some("context")), DenyReason::Context);
        assert_eq!(DenyReason::from_pdp(None), DenyReason::Iam);
        assert_eq!(DenyReason::from_pdp(Some("Quota")), DenyReason::Iam);
    }

    #[test]
    fn test_cached_decision_flags() {
        let decision = Decision::from_cache(true, DenyReason::None, true);
        assert!(decision.cached);
        assert!(decision.expired);
        assert_eq!(decision.retry_count, 0);
    }

    #[test]
    fn test_pdp_decision_flags() {
        let decision = Decision::from_pdp(&PdpDecision::deny(DenyReason::Context), 2);
        assert!(!decision.permitted);
        assert!(!decision.cached);
        assert_eq!(decision.retry_count, 2);
        assert_eq!(decision.reason, DenyReason::Context);
    }

    #[test]
    fn test_obligation_builder() {
        let obligation = Obligation::default()
            .with_actions(["b", "a", "a"])
            .with_max_cache_age(Duration::from_secs(600));
        assert_eq!(obligation.actions.len(), 2);
        assert!(obligation.subject.is_none());
    }
}
