//! # cw-dispatch
//!
//! Action delivery for Crosswatch.
//!
//! The dispatcher takes the actions a policy decision named, delivers
//! each through its registered sink with bounded retries, and records
//! every attempt in the investigation's append-only dispatch log.

pub mod dispatcher;
pub mod escalation;
pub mod sink;
pub mod webhook;

pub use dispatcher::{DispatchError, Dispatcher, RetryPolicy};
pub use escalation::{EscalationReasoner, TemplateReasoner};
pub use sink::{ActionRequest, ActionSink, LogSink, MockSink, SinkRegistry, SinkResponse};
pub use webhook::WebhookSink;
