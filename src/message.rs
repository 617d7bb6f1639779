//! The message shape and pattern language.
//!
//! Messages form a tagged sum over a small closed set of shapes plus an
//! opaque payload, per the crate's design notes on replacing a dynamically
//! typed source language's ad-hoc message values. Patterns mirror the same
//! shapes so that matching stays total and side-effect free.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value carried between actors.
///
/// The closed variants (`Unit`/`Bool`/`Int`/`Text`/`Tuple`) support
/// structural equality for literal patterns; `Payload` wraps an arbitrary
/// `Send + Sync` value for type-predicate matching and is otherwise opaque.
#[derive(Clone)]
pub enum Message {
    Unit,
    Bool(bool),
    Int(i64),
    Text(String),
    Tuple(Vec<Message>),
    Payload(Arc<dyn Any + Send + Sync>),
}

impl Message {
    pub fn payload<T: Any + Send + Sync>(value: T) -> Self {
        Message::Payload(Arc::new(value))
    }

    pub fn tuple(items: impl IntoIterator<Item = Message>) -> Self {
        Message::Tuple(items.into_iter().collect())
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Message::Payload(p) => p.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is_payload_of<T: Any + Send + Sync>(&self) -> bool {
        matches!(self, Message::Payload(p) if p.is::<T>())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Unit => write!(f, "()"),
            Message::Bool(b) => write!(f, "{b}"),
            Message::Int(i) => write!(f, "{i}"),
            Message::Text(s) => write!(f, "{s:?}"),
            Message::Tuple(items) => f.debug_tuple("").field(items).finish(),
            Message::Payload(_) => write!(f, "<payload>"),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Message) -> bool {
        match (self, other) {
            (Message::Unit, Message::Unit) => true,
            (Message::Bool(a), Message::Bool(b)) => a == b,
            (Message::Int(a), Message::Int(b)) => a == b,
            (Message::Text(a), Message::Text(b)) => a == b,
            (Message::Tuple(a), Message::Tuple(b)) => a == b,
            // Opaque payloads are never literal-equal; match them with a
            // type predicate instead.
            _ => false,
        }
    }
}

impl From<bool> for Message {
    fn from(v: bool) -> Self {
        Message::Bool(v)
    }
}

impl From<i64> for Message {
    fn from(v: i64) -> Self {
        Message::Int(v)
    }
}

impl From<&str> for Message {
    fn from(v: &str) -> Self {
        Message::Text(v.to_string())
    }
}

impl From<String> for Message {
    fn from(v: String) -> Self {
        Message::Text(v)
    }
}

/// A structural pattern matched against a [`Message`].
///
/// `Pattern::Type` is erased to a runtime type check (`Any::is::<T>()`)
/// rather than carrying `T` as a generic parameter, so that patterns of
/// different payload types can sit side by side inside a `Tuple` pattern.
#[derive(Clone)]
pub enum Pattern {
    Any,
    Type(TypePredicate),
    Literal(Message),
    Tuple(Vec<Pattern>),
}

#[derive(Clone)]
pub struct TypePredicate {
    check: Arc<dyn Fn(&Message) -> bool + Send + Sync>,
    label: &'static str,
}

impl fmt::Debug for TypePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type({})", self.label)
    }
}

impl Pattern {
    pub fn any() -> Self {
        Pattern::Any
    }

    /// Matches any `Message::Payload` whose erased type is `T`.
    pub fn of_type<T: Any + Send + Sync>(label: &'static str) -> Self {
        Pattern::Type(TypePredicate {
            check: Arc::new(|m: &Message| m.is_payload_of::<T>()),
            label,
        })
    }

    pub fn literal(value: impl Into<Message>) -> Self {
        Pattern::Literal(value.into())
    }

    pub fn tuple(items: impl IntoIterator<Item = Pattern>) -> Self {
        Pattern::Tuple(items.into_iter().collect())
    }
}

/// Matches `pattern` against `value`. Total and pure: it never panics and
/// never mutates either argument, returning the bound sub-value on success.
pub fn matches(pattern: &Pattern, value: &Message) -> Option<Message> {
    match pattern {
        Pattern::Any => Some(value.clone()),
        Pattern::Type(pred) => {
            if (pred.check)(value) {
                Some(value.clone())
            } else {
                None
            }
        }
        Pattern::Literal(lit) => {
            if lit == value {
                Some(value.clone())
            } else {
                None
            }
        }
        Pattern::Tuple(pats) => match value {
            Message::Tuple(vals) if vals.len() == pats.len() => {
                let mut bound = Vec::with_capacity(pats.len());
                for (p, v) in pats.iter().zip(vals.iter()) {
                    bound.push(matches(p, v)?);
                }
                Some(Message::Tuple(bound))
            }
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_everything() {
        assert!(matches(&Pattern::any(), &Message::Int(7)).is_some());
        assert!(matches(&Pattern::any(), &Message::Unit).is_some());
    }

    #[test]
    fn literal_requires_structural_equality() {
        assert!(matches(&Pattern::literal(3i64), &Message::Int(3)).is_some());
        assert!(matches(&Pattern::literal(3i64), &Message::Int(4)).is_none());
    }

    #[test]
    fn tuple_matches_pairwise_and_binds_elements() {
        let pattern = Pattern::tuple([Pattern::literal("baz"), Pattern::any()]);
        let hit = Message::tuple([Message::from("baz"), Message::Int(2)]);
        let miss = Message::tuple([Message::from("foo"), Message::Int(1)]);

        let bound = matches(&pattern, &hit).expect("tuple should match");
        assert_eq!(bound, hit);
        assert!(matches(&pattern, &miss).is_none());
    }

    #[test]
    fn tuple_arity_mismatch_never_matches() {
        let pattern = Pattern::tuple([Pattern::any(), Pattern::any()]);
        let value = Message::tuple([Message::Int(1)]);
        assert!(matches(&pattern, &value).is_none());
    }

    #[test]
    fn type_predicate_matches_only_matching_payload() {
        struct Ping;
        struct Pong;

        let pattern = Pattern::of_type::<Ping>("Ping");
        assert!(matches(&pattern, &Message::payload(Ping)).is_some());
        assert!(matches(&pattern, &Message::payload(Pong)).is_none());
        assert!(matches(&pattern, &Message::Int(1)).is_none());
    }
}
