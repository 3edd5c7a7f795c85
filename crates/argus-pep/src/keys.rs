//! Canonical cache key encoding.
//!
//! A key is three segments joined by `#`, in the order the pattern declares:
//!
//! ```text
//! subject|id=IBMid-1#resource|serviceName=cos|accountId=12345#action|cos.object.get
//! ```
//!
//! Pattern projections use `|` after the slot name and keep the shape's
//! attribute order. Exact request projections use `!` and sorted attribute
//! order, so an exact projection can never collide with a pattern projection
//! (in particular, an empty exact resource is not the `*` wildcard).
//! Reserved characters inside names and values are percent-escaped.

use std::borrow::Cow;
use std::fmt::Write;

use crate::attributes::{AttributeValue, Attributes};
use crate::pattern::{CacheKeyPattern, Slot};
use crate::request::Subject;

const SEGMENT_SEPARATOR: char = '#';
const RESERVED: [char; 8] = ['%', '|', '!', '=', '#', '{', '}', ','];

/// How a segment's attributes were selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// All attributes of the request side.
    Exact,
    /// The attributes named by one pattern shape.
    Shape,
}

impl Projection {
    const fn marker(self) -> char {
        match self {
            Self::Exact => '!',
            Self::Shape => '|',
        }
    }
}

const fn slot_name(slot: Slot) -> &'static str {
    match slot {
        Slot::Subject => "subject",
        Slot::Resource => "resource",
        Slot::Action => "action",
    }
}

/// Encode a subject or resource segment.
///
/// An empty shape projection is the wildcard `<slot>|*`.
pub fn segment<'a, I>(slot: Slot, projection: Projection, pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a AttributeValue)>,
{
    let mut out = String::from(slot_name(slot));
    let marker = projection.marker();
    let mut empty = true;

    for (i, (name, value)) in pairs.into_iter().enumerate() {
        empty = false;
        if i == 0 || projection == Projection::Shape {
            out.push(marker);
        } else {
            out.push('|');
        }
        out.push_str(&escape(name));
        out.push('=');
        write_value(&mut out, value);
    }

    if empty {
        out.push(marker);
        if projection == Projection::Shape {
            out.push('*');
        }
    }

    out
}

/// Encode the action segment.
pub fn action_segment(action: &str) -> String {
    format!("{}|{}", slot_name(Slot::Action), escape(action))
}

/// Join three segments in pattern order.
pub fn compose(order: [Slot; 3], subject: &str, resource: &str, action: &str) -> String {
    let mut key = String::with_capacity(subject.len() + resource.len() + action.len() + 2);
    for (i, slot) in order.iter().enumerate() {
        if i > 0 {
            key.push(SEGMENT_SEPARATOR);
        }
        key.push_str(match slot {
            Slot::Subject => subject,
            Slot::Resource => resource,
            Slot::Action => action,
        });
    }
    key
}

/// The subject attributes that form the exact projection.
///
/// Token subjects contribute only the claims the pattern names (or `id` and
/// `scope` when it names none), never the opaque token.
pub fn exact_subject<'a>(subject: &'a Subject, pattern: &CacheKeyPattern) -> Cow<'a, Attributes> {
    match subject {
        Subject::Attributes(attrs) => Cow::Borrowed(attrs),
        Subject::Token(token) => Cow::Owned(token.key_claims(pattern.subject_names())),
    }
}

/// Check if the subject has anything to key on.
///
/// A token carrying none of the claims the pattern uses would share keys with
/// every other such token, so decisions for it are never cached.
pub fn subject_is_keyable(subject: &Subject, pattern: &CacheKeyPattern) -> bool {
    match subject {
        Subject::Attributes(_) => true,
        Subject::Token(_) => !exact_subject(subject, pattern).is_empty(),
    }
}

/// Exact subject segment for a request.
pub fn exact_subject_segment(subject: &Subject, pattern: &CacheKeyPattern) -> String {
    segment(
        Slot::Subject,
        Projection::Exact,
        exact_subject(subject, pattern).iter(),
    )
}

/// Exact resource segment for a request.
pub fn exact_resource_segment(resource: &Attributes) -> String {
    segment(Slot::Resource, Projection::Exact, resource.iter())
}

/// Remove duplicate keys, keeping first occurrences.
pub fn dedup_in_order(keys: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::with_capacity(keys.len());
    keys.retain(|key| seen.insert(key.clone()));
}

fn write_value(out: &mut String, value: &AttributeValue) {
    match value {
        AttributeValue::Text(s) => out.push_str(&escape(s)),
        AttributeValue::Nested(attrs) => {
            out.push('{');
            for (i, (name, nested)) in attrs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&escape(name));
                out.push('=');
                write_value(out, nested);
            }
            out.push('}');
        }
    }
}

fn escape(raw: &str) -> Cow<'_, str> {
    if !raw.contains(&RESERVED[..]) {
        return Cow::Borrowed(raw);
    }

    let mut escaped = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        if RESERVED.contains(&c) {
            let _ = write!(escaped, "%{:02X}", c as u32);
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}
