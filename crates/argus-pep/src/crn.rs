//! Cloud resource names.
//!
//! A CRN has ten colon-separated segments:
//! `crn:v1:<cname>:<ctype>:<serviceName>:<location>:<scope>:<serviceInstance>:<resourceType>:<resource>`.
//! [`Crn::to_attributes`] turns one into the resource attributes of a
//! [`Request`](crate::request::Request).

use std::fmt;
use std::str::FromStr;

use crate::attributes::{Attributes, ACCOUNT_ID, RESOURCE, RESOURCE_TYPE, SERVICE_INSTANCE, SERVICE_NAME};
use crate::error::{PepError, PepResult};

const PREFIX: &str = "crn";
const VERSION: &str = "v1";
const SEGMENTS: usize = 10;

/// Scope prefix naming an account.
const ACCOUNT_SCOPE: &str = "a/";

/// Resource attribute carrying the CRN location.
pub const LOCATION: &str = "region";

/// A parsed cloud resource name. Empty segments are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Crn {
    /// Cloud name, e.g. `bluemix`.
    pub cname: Option<String>,
    /// Cloud type, e.g. `public`.
    pub ctype: Option<String>,
    /// Service name.
    pub service_name: Option<String>,
    /// Region or zone.
    pub location: Option<String>,
    /// Scope, e.g. `a/<account id>`.
    pub scope: Option<String>,
    /// Service instance.
    pub service_instance: Option<String>,
    /// Resource type.
    pub resource_type: Option<String>,
    /// Resource.
    pub resource: Option<String>,
}

impl Crn {
    /// Parse a CRN string.
    pub fn parse(value: &str) -> PepResult<Self> {
        let segments: Vec<&str> = value.split(':').collect();
        if segments.len() != SEGMENTS {
            return Err(PepError::invalid_input(format!(
                "CRN must have {SEGMENTS} segments, found {}: {value}",
                segments.len()
            )));
        }
        if segments[0] != PREFIX || segments[1] != VERSION {
            return Err(PepError::invalid_input(format!(
                "CRN must start with {PREFIX}:{VERSION}: {value}"
            )));
        }

        let field = |i: usize| Some(segments[i]).filter(|s| !s.is_empty()).map(ToString::to_string);
        Ok(Self {
            cname: field(2),
            ctype: field(3),
            service_name: field(4),
            location: field(5),
            scope: field(6),
            service_instance: field(7),
            resource_type: field(8),
            resource: field(9),
        })
    }

    /// Account id from an `a/<id>` scope.
    pub fn account_id(&self) -> Option<&str> {
        self.scope
            .as_deref()
            .and_then(|s| s.strip_prefix(ACCOUNT_SCOPE))
            .filter(|id| !id.is_empty())
    }

    /// Resource attributes named by this CRN. Empty segments are omitted.
    pub fn to_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        let mut set = |name: &str, value: Option<&str>| {
            if let Some(value) = value {
                attributes.insert(name, value);
            }
        };

        set(SERVICE_NAME, self.service_name.as_deref());
        set(ACCOUNT_ID, self.account_id());
        set(LOCATION, self.location.as_deref());
        set(SERVICE_INSTANCE, self.service_instance.as_deref());
        set(RESOURCE_TYPE, self.resource_type.as_deref());
        set(RESOURCE, self.resource.as_deref());
        attributes
    }
}

impl FromStr for Crn {
    type Err = PepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Crn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segment = |s: &Option<String>| s.clone().unwrap_or_default();
        write!(
            f,
            "{PREFIX}:{VERSION}:{}:{}:{}:{}:{}:{}:{}:{}",
            segment(&self.cname),
            segment(&self.ctype),
            segment(&self.service_name),
            segment(&self.location),
            segment(&self.scope),
            segment(&self.service_instance),
            segment(&self.resource_type),
            segment(&self.resource),
        )
    }
}
