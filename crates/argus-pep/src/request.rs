//! Authorization requests as submitted by callers.

use serde::{Deserialize, Serialize};

use crate::attributes::{Attributes, ID};
use crate::error::PepResult;
use crate::token::TokenSubject;
use crate::wire::RequestWire;

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// A subject described by discrete attributes.
    Attributes(Attributes),
    /// A subject identified by an access token payload.
    Token(TokenSubject),
}

impl Subject {
    /// A subject identified only by its IAM id.
    pub fn iam_id(id: impl Into<String>) -> Self {
        Self::Attributes(Attributes::new().with(ID, id.into()))
    }

    /// A subject identified by a compact JWT.
    pub fn from_token(token: &str) -> PepResult<Self> {
        TokenSubject::from_token(token).map(Self::Token)
    }

    /// Check if this is a token subject.
    pub const fn is_token(&self) -> bool {
        matches!(self, Self::Token(_))
    }

    /// The attributes that identify this subject for cache keys and
    /// fingerprinting. Token subjects expose their decoded claims.
    pub fn key_source(&self) -> &Attributes {
        match self {
            Self::Attributes(attrs) => attrs,
            Self::Token(token) => token.claims(),
        }
    }
}

impl From<Attributes> for Subject {
    fn from(attrs: Attributes) -> Self {
        Self::Attributes(attrs)
    }
}

impl From<TokenSubject> for Subject {
    fn from(token: TokenSubject) -> Self {
        Self::Token(token)
    }
}

/// A single authorization question: may `subject` perform `action` on
/// `resource`?
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RequestWire", into = "RequestWire")]
pub struct Request {
    /// Subject making the request.
    pub subject: Subject,
    /// Action being performed, e.g. `cloud-object-storage.object.get`.
    pub action: String,
    /// Resource being acted on.
    pub resource: Attributes,
}

impl Request {
    /// Create a new request.
    pub fn new(subject: impl Into<Subject>, action: impl Into<String>, resource: Attributes) -> Self {
        Self {
            subject: subject.into(),
            action: action.into(),
            resource,
        }
    }

    /// The same request with a different action.
    pub fn with_action(&self, action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{ACCOUNT_ID, SERVICE_NAME};

    #[test]
    fn test_iam_id_subject() {
        let subject = Subject::iam_id("IBMid-1");
        assert!(!subject.is_token());
        assert_eq!(subject.key_source().get_str(ID), Some("IBMid-1"));
    }

    #[test]
    fn test_with_action_keeps_other_fields() {
        let resource = Attributes::new()
            .with(SERVICE_NAME, "cos")
            .with(ACCOUNT_ID, "12345");
        let request = Request::new(Subject::iam_id("u"), "cos.object.get", resource.clone());
        let copy = request.with_action("cos.object.copy");

        assert_eq!(copy.action, "cos.object.copy");
        assert_eq!(copy.resource, resource);
        assert_eq!(copy.subject, request.subject);
    }
}
