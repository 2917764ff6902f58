//! Hook for distributed tracing.
//!
//! The tracer itself is not part of this crate: a span implements [TraceSpan], and the invoker
//! injects it into the attachments of the outgoing invocation.

use crate::invocation::Attachments;
use std::fmt;
use std::sync::Arc;

pub trait TraceSpan: Send + Sync + fmt::Debug {
    /// Write the span context into the carrier as text key/value pairs
    fn inject(&self, carrier: &mut Attachments) -> Result<(), TraceError>;
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum TraceError {
    #[error("span context is not valid: {0}")]
    InvalidSpanContext(String),
    #[error("carrier rejected key {0:?}")]
    InvalidCarrier(String),
}

/// Ambient state of a call, passed explicitly to every invocation
#[derive(Clone, Default, Debug)]
pub struct CallContext {
    span: Option<Arc<dyn TraceSpan>>,
}

impl CallContext {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_span(span: Arc<dyn TraceSpan>) -> Self {
        Self { span: Some(span) }
    }

    #[inline]
    pub fn span(&self) -> Option<&dyn TraceSpan> {
        self.span.as_deref()
    }
}

/// Returns the attachments with the span context added; the input is left untouched on error.
pub fn inject_trace_ctx(
    span: &dyn TraceSpan, attachments: &Attachments,
) -> Result<Attachments, TraceError> {
    let mut carrier = attachments.clone();
    span.inject(&mut carrier)?;
    Ok(carrier)
}
