//! PDP wire formats.
//!
//! Everything here mirrors the JSON the PDP speaks. Conversion into the
//! domain types happens at this boundary so that the rest of the crate never
//! sees wire structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::attributes::{AttributeValue, Attributes};
use crate::decision::{DenyReason, Obligation, PdpDecision};
use crate::error::{PepError, PepResult};
use crate::pattern::{CacheKeyPattern, Slot};
use crate::request::{Request, Subject};
use crate::token::TokenSubject;

/// Attribute carrying a token payload in place of subject attributes.
pub const ACCESS_TOKEN_BODY: &str = "accessTokenBody";

/// `{"attributes": {...}}` wrapper used for subjects and resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributesWire {
    /// The wrapped attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

impl From<Attributes> for AttributesWire {
    fn from(attributes: Attributes) -> Self {
        Self { attributes }
    }
}

/// One request as sent to the PDP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestWire {
    /// Subject attributes, or the token payload.
    pub subject: AttributesWire,
    /// Action.
    pub action: String,
    /// Resource attributes.
    pub resource: AttributesWire,
}

impl From<Request> for RequestWire {
    fn from(request: Request) -> Self {
        let subject = match request.subject {
            Subject::Attributes(attrs) => attrs,
            Subject::Token(token) => Attributes::new().with(ACCESS_TOKEN_BODY, token.body()),
        };
        Self {
            subject: subject.into(),
            action: request.action,
            resource: request.resource.into(),
        }
    }
}

impl TryFrom<RequestWire> for Request {
    type Error = PepError;

    fn try_from(wire: RequestWire) -> PepResult<Self> {
        let token_body = match wire.subject.attributes.get(ACCESS_TOKEN_BODY) {
            Some(AttributeValue::Text(body)) => Some(body.clone()),
            Some(AttributeValue::Nested(_)) => {
                return Err(PepError::invalid_input(format!(
                    "{ACCESS_TOKEN_BODY} must be a string"
                )))
            }
            None => None,
        };
        let subject = match token_body {
            Some(body) => Subject::Token(TokenSubject::from_body(&body)?),
            None => Subject::Attributes(wire.subject.attributes),
        };
        Ok(Self {
            subject,
            action: wire.action,
            resource: wire.resource.attributes,
        })
    }
}

/// Body of a bulk authorization call.
#[derive(Debug, Serialize)]
pub struct BulkRequestWire<'a> {
    /// Requests in caller order.
    pub requests: &'a [Request],
}

/// `cacheKeyPattern` as found in PDP responses.
///
/// Order labels are kept as strings so that an unknown label degrades to the
/// default order instead of failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyPatternWire {
    /// Segment order labels.
    #[serde(default)]
    pub order: Vec<String>,
    /// Subject shapes.
    #[serde(default)]
    pub subject: Vec<Vec<String>>,
    /// Resource shapes.
    #[serde(default)]
    pub resource: Vec<Vec<String>>,
}

impl From<CacheKeyPatternWire> for CacheKeyPattern {
    fn from(wire: CacheKeyPatternWire) -> Self {
        let order: Option<Vec<Slot>> = wire.order.iter().map(|label| parse_slot(label)).collect();
        let order = order.unwrap_or_else(|| {
            warn!(order = ?wire.order, "unknown label in cache key pattern order, using default");
            Vec::new()
        });
        Self::new(order, wire.subject, wire.resource)
    }
}

impl From<CacheKeyPattern> for CacheKeyPatternWire {
    fn from(pattern: CacheKeyPattern) -> Self {
        Self {
            order: pattern
                .raw_order()
                .iter()
                .map(|slot| slot_label(*slot).to_string())
                .collect(),
            subject: pattern.subject_shapes().to_vec(),
            resource: pattern.resource_shapes().to_vec(),
        }
    }
}

fn parse_slot(label: &str) -> Option<Slot> {
    match label.to_ascii_lowercase().as_str() {
        "subject" => Some(Slot::Subject),
        "resource" => Some(Slot::Resource),
        "action" => Some(Slot::Action),
        _ => None,
    }
}

const fn slot_label(slot: Slot) -> &'static str {
    match slot {
        Slot::Subject => "subject",
        Slot::Resource => "resource",
        Slot::Action => "action",
    }
}

/// Permit obligation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObligationWire {
    /// Actions also granted.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Maximum cache age in seconds.
    #[serde(default)]
    pub max_cache_age_seconds: Option<i64>,
    /// Subject the permit applies to.
    #[serde(default)]
    pub subject: Option<AttributesWire>,
    /// Resource the permit applies to.
    #[serde(default)]
    pub resource: Option<AttributesWire>,
}

impl From<ObligationWire> for Obligation {
    fn from(wire: ObligationWire) -> Self {
        Self {
            actions: wire.actions.into_iter().collect(),
            max_cache_age: wire
                .max_cache_age_seconds
                .and_then(|secs| u64::try_from(secs).ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            subject: wire.subject.map(|s| s.attributes),
            resource: wire.resource.map(|r| r.attributes),
        }
    }
}

/// `authorizationDecision` of a single-authz response entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthzDecisionWire {
    /// Whether the request is permitted.
    pub permitted: bool,
    /// Deny reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Obligation attached to a permit.
    #[serde(default)]
    pub obligation: Option<ObligationWire>,
}

/// One entry of a single-authz `responses` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzEntryWire {
    /// Per-entry HTTP-like status, as a string or a number.
    #[serde(default)]
    pub status: Option<Value>,
    /// The decision, present on success.
    #[serde(default)]
    pub authorization_decision: Option<AuthzDecisionWire>,
    /// Error description, present on failure.
    #[serde(default)]
    pub error: Option<Value>,
}

/// Response of a single-authz call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzResponseWire {
    /// One entry per request, in request order.
    #[serde(default)]
    pub responses: Vec<AuthzEntryWire>,
    /// Updated cache key pattern.
    #[serde(default)]
    pub cache_key_pattern: Option<CacheKeyPattern>,
}

/// One decision of a bulk response.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkDecisionWire {
    /// `Permit` or `Deny`.
    pub decision: String,
    /// Deny reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Obligation attached to a permit.
    #[serde(default)]
    pub obligation: Option<ObligationWire>,
}

/// Response of a bulk call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponseWire {
    /// One decision per request, in request order.
    #[serde(default)]
    pub decisions: Vec<BulkDecisionWire>,
    /// Updated cache key pattern.
    #[serde(default)]
    pub cache_key_pattern: Option<CacheKeyPattern>,
}

/// A PDP response converted to domain types.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    /// Per-request outcome, in request order.
    pub decisions: Vec<PepResult<PdpDecision>>,
    /// Updated cache key pattern, if the PDP sent one.
    pub pattern: Option<CacheKeyPattern>,
}

fn permit_or_deny(
    permitted: bool,
    reason: Option<&str>,
    obligation: Option<ObligationWire>,
) -> PdpDecision {
    if permitted {
        PdpDecision::permit(obligation.map(Obligation::from))
    } else {
        PdpDecision::deny(DenyReason::from_pdp(reason))
    }
}

fn entry_status(status: Option<&Value>) -> Option<u16> {
    match status? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        _ => None,
    }
}

fn entry_error_message(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| Value::Object(map.clone()).to_string(), ToString::to_string),
        Some(other) => other.to_string(),
        None => "PDP rejected the request".to_string(),
    }
}

impl AuthzResponseWire {
    /// Convert into per-request outcomes.
    ///
    /// An entry whose status is not 2xx becomes an error at its index.
    pub fn into_parsed(self) -> ParsedResponse {
        let decisions = self
            .responses
            .into_iter()
            .map(|entry| {
                let status = entry_status(entry.status.as_ref());
                match (status, entry.authorization_decision) {
                    (Some(status), _) if !(200..300).contains(&status) => Err(PepError::api(
                        status,
                        entry_error_message(entry.error.as_ref()),
                    )),
                    (_, Some(decision)) => Ok(permit_or_deny(
                        decision.permitted,
                        decision.reason.as_deref(),
                        decision.obligation,
                    )),
                    (_, None) => Err(PepError::internal(
                        "PDP response entry carries no authorizationDecision",
                    )),
                }
            })
            .collect();

        ParsedResponse {
            decisions,
            pattern: self.cache_key_pattern,
        }
    }
}

impl BulkResponseWire {
    /// Convert into per-request outcomes.
    pub fn into_parsed(self) -> ParsedResponse {
        let decisions = self
            .decisions
            .into_iter()
            .map(|entry| {
                let permitted = entry.decision.eq_ignore_ascii_case("permit");
                if !permitted && !entry.decision.eq_ignore_ascii_case("deny") {
                    return Err(PepError::internal(format!(
                        "unknown bulk decision {:?}",
                        entry.decision
                    )));
                }
                Ok(permit_or_deny(
                    permitted,
                    entry.reason.as_deref(),
                    entry.obligation,
                ))
            })
            .collect();

        ParsedResponse {
            decisions,
            pattern: self.cache_key_pattern,
        }
    }
}
