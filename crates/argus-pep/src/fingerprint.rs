//! Request fingerprinting for cache lookups.
//!
//! A request is looked up under its exact key first and then under every
//! pattern projection it satisfies, most specific first. The first fresh hit
//! wins, so a narrow cached deny or permit always takes precedence over a
//! broader permit.

use tracing::debug;

use crate::attributes::Attributes;
use crate::keys::{
    action_segment, compose, dedup_in_order, exact_resource_segment, exact_subject_segment,
    segment, subject_is_keyable, Projection,
};
use crate::pattern::{CacheKeyPattern, Shape, Slot};
use crate::request::Request;

/// Computes candidate lookup keys for a request.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter<'a> {
    pattern: &'a CacheKeyPattern,
}

impl<'a> Fingerprinter<'a> {
    /// Create a fingerprinter for the given pattern snapshot.
    pub fn new(pattern: &'a CacheKeyPattern) -> Self {
        Self { pattern }
    }

    /// Candidate keys in lookup order, without duplicates.
    ///
    /// The first key is always the exact request key. A token subject
    /// without keyable claims has no candidates.
    pub fn lookup_keys(&self, request: &Request) -> Vec<String> {
        if !subject_is_keyable(&request.subject, self.pattern) {
            debug!(action = %request.action, "token subject has no keyable claims, bypassing cache");
            return Vec::new();
        }

        let mut subjects = vec![exact_subject_segment(&request.subject, self.pattern)];
        subjects.extend(satisfied_segments(
            Slot::Subject,
            self.pattern.subject_shapes(),
            request.subject.key_source(),
        ));

        let mut resources = vec![exact_resource_segment(&request.resource)];
        resources.extend(satisfied_segments(
            Slot::Resource,
            self.pattern.resource_shapes(),
            &request.resource,
        ));

        let action = action_segment(&request.action);
        let order = self.pattern.order();

        let mut keys = Vec::with_capacity(subjects.len() * resources.len());
        for subject in &subjects {
            for resource in &resources {
                keys.push(compose(order, subject, resource, &action));
            }
        }

        dedup_in_order(&mut keys);
        keys
    }

    /// The exact request key, used to coalesce concurrent identical misses.
    pub fn primary_key(&self, request: &Request) -> String {
        compose(
            self.pattern.order(),
            &exact_subject_segment(&request.subject, self.pattern),
            &exact_resource_segment(&request.resource),
            &action_segment(&request.action),
        )
    }
}

fn satisfied_segments<'s>(
    slot: Slot,
    shapes: &'s [Shape],
    attrs: &'s Attributes,
) -> impl Iterator<Item = String> + 's {
    shapes
        .iter()
        .filter_map(move |shape| attrs.project(shape))
        .map(move |pairs| segment(slot, Projection::Shape, pairs))
}
