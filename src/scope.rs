//! Request-scoped context carrying tags and trace identity.
//!
//! A [`Scope`] is an immutable, append-only chain. Every `with_*` call returns
//! a new scope whose head points at the parent, so deriving never disturbs the
//! scope it was derived from and concurrent derivations from one parent are
//! independent branches.
//!
//! ```rust
//! use tracelog::Scope;
//!
//! let request = Scope::new().with_tag("user", "alice");
//! let job = request.with_tag("job", 42);
//!
//! assert_eq!(job.tags().len(), 2);
//! assert_eq!(request.tags().len(), 1);
//! ```

use std::sync::Arc;

use opentelemetry::trace::TraceContextExt;
use serde::Serialize;
use serde_json::Value;

use crate::tags::Tags;
use crate::trace_context::{parse_span_id, parse_trace_id, TraceInfo};

/// Request-scoped context.
///
/// Cheap to clone: clones share the underlying chain.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    head: Option<Arc<Node>>,
}

#[derive(Debug)]
struct Node {
    entry: Entry,
    parent: Option<Arc<Node>>,
}

#[derive(Debug)]
enum Entry {
    Tags(Tags),
    TraceIds { trace_id: String, span_id: String },
    Otel(opentelemetry::Context),
}

impl Scope {
    /// Create an empty scope.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: Entry) -> Scope {
        Scope {
            head: Some(Arc::new(Node {
                entry,
                parent: self.head.clone(),
            })),
        }
    }

    /// Iterate entries from the most specific outward.
    fn entries(&self) -> impl Iterator<Item = &Entry> {
        std::iter::successors(self.head.as_deref(), |node| node.parent.as_deref())
            .map(|node| &node.entry)
    }

    /// Derive a scope where `key` maps to `value`.
    ///
    /// An empty key is ignored.
    pub fn with_tag(&self, key: &str, value: impl Serialize) -> Scope {
        if key.is_empty() {
            tracing::debug!("ignoring tag with empty key");
            return self.clone();
        }
        let mut tags = Tags::new();
        tags.insert(key, value);
        self.push(Entry::Tags(tags))
    }

    /// Derive a scope with every entry of `tags` added; `tags` wins on collision.
    pub fn with_tags(&self, tags: &Tags) -> Scope {
        if tags.is_empty() {
            return self.clone();
        }
        let mut owned = Tags::new();
        for (key, value) in tags.iter().filter(|(k, _)| !k.is_empty()) {
            owned.insert(key.clone(), value);
        }
        self.push(Entry::Tags(owned))
    }

    /// All tags visible from this scope.
    pub fn tags(&self) -> Tags {
        let layers: Vec<&Tags> = self
            .entries()
            .filter_map(|entry| match entry {
                Entry::Tags(tags) => Some(tags),
                _ => None,
            })
            .collect();

        // Oldest first so that nearer layers overwrite.
        let mut resolved = Tags::new();
        for layer in layers.into_iter().rev() {
            resolved.extend_from(layer);
        }
        resolved
    }

    /// Look up a single tag, nearest layer first.
    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.entries().find_map(|entry| match entry {
            Entry::Tags(tags) => tags.get(key),
            _ => None,
        })
    }

    /// Attach plain trace and span id text.
    pub fn with_trace_ids(&self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Scope {
        self.push(Entry::TraceIds {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
        })
    }

    /// Nearest plain trace and span id text, if any was attached.
    pub fn trace_ids(&self) -> Option<(&str, &str)> {
        self.entries().find_map(|entry| match entry {
            Entry::TraceIds { trace_id, span_id } => Some((trace_id.as_str(), span_id.as_str())),
            _ => None,
        })
    }

    /// Attach an OpenTelemetry context (the ambient tracing state).
    pub fn with_otel_context(&self, cx: opentelemetry::Context) -> Scope {
        self.push(Entry::Otel(cx))
    }

    /// Nearest attached OpenTelemetry context.
    pub fn otel_context(&self) -> Option<&opentelemetry::Context> {
        self.entries().find_map(|entry| match entry {
            Entry::Otel(cx) => Some(cx),
            _ => None,
        })
    }

    /// Trace identity for log correlation.
    ///
    /// Prefers a valid span context from the attached OpenTelemetry context and
    /// falls back to the plain id text. Empty when neither is valid.
    pub fn trace_info(&self) -> TraceInfo {
        if let Some(cx) = self.otel_context() {
            let info = TraceInfo::from_span_context(cx.span().span_context());
            if !info.is_empty() {
                return info;
            }
        }

        match self.trace_ids() {
            Some((trace_id, span_id)) => {
                let trace_id = parse_trace_id(trace_id);
                let span_id = parse_span_id(span_id);
                if trace_id == opentelemetry::trace::TraceId::INVALID
                    || span_id == opentelemetry::trace::SpanId::INVALID
                {
                    TraceInfo::default()
                } else {
                    TraceInfo {
                        trace_id: trace_id.to_string(),
                        span_id: span_id.to_string(),
                        trace_flags: "00".to_string(),
                    }
                }
            }
            None => TraceInfo::default(),
        }
    }
}
