//! Hand-rolled W3C `traceparent` propagation for outbound worker calls.
//!
//! No `opentelemetry` dependency: a `RequestContext` carries the ids
//! explicitly (SPEC_FULL.md §9 REDESIGN FLAG on ambient logging), and this
//! module renders/attaches the standard header, modeled on
//! `other_examples`' `trace_context::propagate_trace_context` middleware.

use uuid::Uuid;

/// Trace/span identifiers threaded explicitly through admission,
/// orchestration and worker-client calls instead of relying on a global
/// logger or tracing registry.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
            request_id: request_id.into(),
        }
    }

    /// Version-00, sampled `traceparent` header value.
    pub fn traceparent(&self) -> String {
        let span_id = Uuid::new_v4().simple().to_string();
        format!("00-{}-{}-01", self.trace_id, &span_id[..16])
    }

    pub fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("traceparent", self.traceparent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceparent_has_w3c_shape() {
        let ctx = RequestContext::new("req-1");
        let header = ctx.traceparent();
        let parts: Vec<&str> = header.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "00");
        assert_eq!(parts[1].len(), 32);
        assert_eq!(parts[2].len(), 16);
        assert_eq!(parts[3], "01");
    }
}
