pub mod domain_event;
pub mod sink;
pub mod webhook_event;

pub use domain_event::DomainEvent;
pub use sink::{DomainEventSink, MockDomainEventSink, NoOpDomainEventSink};
pub use webhook_event::{SaltEdgeStage, SaltEdgeWebhook, SnapTradeWebhook, WebhookEvent};
