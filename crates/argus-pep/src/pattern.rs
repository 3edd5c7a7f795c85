//! Server-issued cache key patterns and the store holding the latest one.
//!
//! The PDP declares which attribute subsets are valid cache projections and
//! in which order the subject, resource and action segments are concatenated.
//! Every PDP response carrying a pattern replaces the stored one wholesale.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::wire::CacheKeyPatternWire;

/// One of the three segments of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Subject projection.
    Subject,
    /// Resource projection.
    Resource,
    /// Action.
    Action,
}

/// Segment order used until the PDP supplies one.
pub const DEFAULT_ORDER: [Slot; 3] = [Slot::Subject, Slot::Resource, Slot::Action];

/// A projection shape: the attribute names that form one valid key segment.
pub type Shape = Vec<String>;

/// Cache key pattern as issued by the PDP.
///
/// Shapes are held sorted by descending arity (stable), so iteration goes
/// from most to least specific.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CacheKeyPatternWire", into = "CacheKeyPatternWire")]
pub struct CacheKeyPattern {
    order: [Slot; 3],
    raw_order: Vec<Slot>,
    subject: Vec<Shape>,
    resource: Vec<Shape>,
}

impl CacheKeyPattern {
    /// Build a pattern, normalizing shape order and validating slot order.
    pub fn new(order: Vec<Slot>, subject: Vec<Shape>, resource: Vec<Shape>) -> Self {
        let effective = effective_order(&order);
        Self {
            order: effective,
            raw_order: order,
            subject: sort_shapes(subject),
            resource: sort_shapes(resource),
        }
    }

    /// The pattern in effect before any PDP response: no projections.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    /// Check if the pattern declares no projections.
    pub fn is_empty(&self) -> bool {
        self.subject.is_empty() && self.resource.is_empty()
    }

    /// Segment order.
    pub fn order(&self) -> [Slot; 3] {
        self.order
    }

    /// Order exactly as received.
    pub fn raw_order(&self) -> &[Slot] {
        &self.raw_order
    }

    /// Subject shapes, most specific first.
    pub fn subject_shapes(&self) -> &[Shape] {
        &self.subject
    }

    /// Resource shapes, most specific first.
    pub fn resource_shapes(&self) -> &[Shape] {
        &self.resource
    }

    /// Every attribute name mentioned by any subject shape.
    pub fn subject_names(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self.subject.iter().flatten().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter()
    }
}

impl Default for CacheKeyPattern {
    fn default() -> Self {
        Self::empty()
    }
}

fn effective_order(order: &[Slot]) -> [Slot; 3] {
    if order.is_empty() {
        return DEFAULT_ORDER;
    }

    match order {
        [a, b, c] if a != b && b != c && a != c => [*a, *b, *c],
        _ => {
            warn!(?order, "cache key pattern order is not a permutation of subject/resource/action, using default");
            DEFAULT_ORDER
        }
    }
}

fn sort_shapes(mut shapes: Vec<Shape>) -> Vec<Shape> {
    let mut seen = Vec::with_capacity(shapes.len());
    shapes.retain(|shape| {
        if seen.contains(shape) {
            false
        } else {
            seen.push(shape.clone());
            true
        }
    });
    shapes.sort_by(|a, b| b.len().cmp(&a.len()));
    shapes
}

/// Single-slot holder for the most recent cache key pattern.
///
/// Readers take an `Arc` snapshot and never observe a partially replaced
/// pattern. Concurrent writers: last writer wins.
#[derive(Debug)]
pub struct PatternStore {
    current: RwLock<Arc<CacheKeyPattern>>,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternStore {
    /// Create a store holding the empty pattern.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(CacheKeyPattern::empty())),
        }
    }

    /// A consistent snapshot of the current pattern.
    pub fn snapshot(&self) -> Arc<CacheKeyPattern> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current pattern.
    pub fn replace(&self, pattern: CacheKeyPattern) {
        let pattern = Arc::new(pattern);
        let mut current = self.current.write();
        if **current != *pattern {
            debug!(
                subject_shapes = pattern.subject_shapes().len(),
                resource_shapes = pattern.resource_shapes().len(),
                "cache key pattern updated"
            );
        }
        *current = pattern;
    }

    /// Reset to the empty pattern.
    #[cfg(test)]
    pub(crate) fn reset(&self) {
        *self.current.write() = Arc::new(CacheKeyPattern::empty());
    }
}
