//! Tenant webhooks.

pub mod dispatcher;
pub mod transport;
pub mod types;

pub use dispatcher::WebhookDispatcher;
pub use transport::{WebhookError, HttpWebhookTransport, WebhookTransport, EVENT_HEADER};
pub use types::{WebhookPayload, WebhookRegistration};
