//! Cache key synthesis for PDP decisions.
//!
//! A permit's obligation tells which other requests the permit also covers.
//! The synthesizer intersects the obligation with the current pattern and
//! produces every key under which a future request should hit. A deny has no
//! obligation and is stored under the exact request key only.

use crate::attributes::Attributes;
use crate::decision::Obligation;
use crate::keys::{
    action_segment, compose, dedup_in_order, exact_resource_segment, exact_subject_segment,
    segment, subject_is_keyable, Projection,
};
use crate::pattern::{CacheKeyPattern, Shape, Slot};
use crate::request::{Request, Subject};

/// Derives cache keys from a request, its decision and the pattern.
#[derive(Debug, Clone, Copy)]
pub struct KeySynthesizer<'a> {
    pattern: &'a CacheKeyPattern,
}

impl<'a> KeySynthesizer<'a> {
    /// Create a synthesizer for the given pattern snapshot.
    pub fn new(pattern: &'a CacheKeyPattern) -> Self {
        Self { pattern }
    }

    /// The key of the exact request shape.
    pub fn exact_key(&self, request: &Request) -> String {
        compose(
            self.pattern.order(),
            &exact_subject_segment(&request.subject, self.pattern),
            &exact_resource_segment(&request.resource),
            &action_segment(&request.action),
        )
    }

    /// Keys for a deny: the exact request key only.
    pub fn deny_keys(&self, request: &Request) -> Vec<String> {
        if !subject_is_keyable(&request.subject, self.pattern) {
            return Vec::new();
        }
        vec![self.exact_key(request)]
    }

    /// Keys for a permit.
    ///
    /// The exact request key always comes first. With an obligation, the
    /// Cartesian product of derivable subject segments, resource segments
    /// and obligation actions follows. A side the obligation cannot describe
    /// falls back to the exact request projection.
    pub fn permit_keys(&self, request: &Request, obligation: Option<&Obligation>) -> Vec<String> {
        if !subject_is_keyable(&request.subject, self.pattern) {
            return Vec::new();
        }
        let order = self.pattern.order();
        let exact_subject = exact_subject_segment(&request.subject, self.pattern);
        let exact_resource = exact_resource_segment(&request.resource);

        let mut keys = vec![compose(
            order,
            &exact_subject,
            &exact_resource,
            &action_segment(&request.action),
        )];

        let Some(obligation) = obligation else {
            return keys;
        };

        let mut subjects = self.obligation_subject_segments(&request.subject, obligation);
        if subjects.is_empty() {
            subjects.push(exact_subject);
        }

        let mut resources = self.obligation_resource_segments(obligation);
        if resources.is_empty() {
            resources.push(exact_resource);
        }

        let actions: Vec<String> = if obligation.actions.is_empty() {
            vec![action_segment(&request.action)]
        } else {
            obligation.actions.iter().map(|a| action_segment(a)).collect()
        };

        for subject in &subjects {
            for resource in &resources {
                for action in &actions {
                    keys.push(compose(order, subject, resource, action));
                }
            }
        }

        dedup_in_order(&mut keys);
        keys
    }

    fn obligation_subject_segments(&self, subject: &Subject, obligation: &Obligation) -> Vec<String> {
        let shapes = self.pattern.subject_shapes();
        match subject {
            Subject::Attributes(_) => obligation
                .subject
                .as_ref()
                .map(|attrs| exact_shape_segments(Slot::Subject, shapes, attrs, attrs))
                .unwrap_or_default(),
            Subject::Token(token) => {
                let claims = token.claims();
                let declared = obligation
                    .subject
                    .as_ref()
                    .map(|attrs| exact_shape_segments(Slot::Subject, shapes, attrs, claims))
                    .unwrap_or_default();
                if !declared.is_empty() {
                    return declared;
                }

                // Most specific shape the claims satisfy.
                shapes
                    .iter()
                    .find_map(|shape| claims.project(shape))
                    .map(|pairs| vec![segment(Slot::Subject, Projection::Shape, pairs)])
                    .unwrap_or_default()
            }
        }
    }

    fn obligation_resource_segments(&self, obligation: &Obligation) -> Vec<String> {
        obligation
            .resource
            .as_ref()
            .map(|attrs| {
                exact_shape_segments(Slot::Resource, self.pattern.resource_shapes(), attrs, attrs)
            })
            .unwrap_or_default()
    }
}

/// Segments for every shape naming exactly the attributes `declared` names,
/// with values taken from `source`.
///
/// Requiring the exact name set keeps a key from covering more than the
/// obligation states.
fn exact_shape_segments(
    slot: Slot,
    shapes: &[Shape],
    declared: &Attributes,
    source: &Attributes,
) -> Vec<String> {
    shapes
        .iter()
        .filter(|shape| declared.has_exact_names(shape))
        .filter_map(|shape| source.project(shape))
        .map(|pairs| segment(slot, Projection::Shape, pairs))
        .collect()
}
