//! In-process event queue and worker.
//!
//! An unbounded `tokio::sync::mpsc` channel stands in for the at-least-once
//! transport: handlers enqueue and return immediately, the worker consumes
//! serially. A failed delivery is re-sent with an incremented attempt count
//! up to `MAX_DELIVERIES`, then dropped with an error log so one poison
//! message cannot wedge the queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ledgerlink_connect::providers::ProviderFactory;
use ledgerlink_connect::sync::SyncService;
use ledgerlink_connect::webhooks::WebhookProcessor;
use ledgerlink_connect::ProviderKind;
use ledgerlink_core::connections::{
    InstitutionConnectionRepositoryTrait, ProviderConnectionRepositoryTrait,
};
use ledgerlink_core::errors::{Error, Result};
use ledgerlink_core::events::{DomainEvent, DomainEventSink, WebhookEvent};

const MAX_DELIVERIES: u32 = 5;

/// One unit of queued work.
#[derive(Clone, Debug, PartialEq)]
pub enum QueueMessage {
    Webhook(WebhookEvent),
    Domain(DomainEvent),
}

#[derive(Clone, Debug)]
pub struct Delivery {
    pub message: QueueMessage,
    pub attempts: u32,
}

/// Cloneable producer side of the queue.
#[derive(Clone)]
pub struct QueueHandle {
    sender: mpsc::UnboundedSender<Delivery>,
}

impl QueueHandle {
    pub fn enqueue_webhook(&self, event: WebhookEvent) {
        self.send(QueueMessage::Webhook(event));
    }

    fn send(&self, message: QueueMessage) {
        let delivery = Delivery {
            message,
            attempts: 0,
        };
        if self.sender.send(delivery).is_err() {
            warn!("Queue worker is gone; dropping message");
        }
    }
}

impl DomainEventSink for QueueHandle {
    fn emit(&self, event: DomainEvent) {
        self.send(QueueMessage::Domain(event));
    }
}

pub fn channel() -> (QueueHandle, mpsc::UnboundedReceiver<Delivery>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (QueueHandle { sender }, receiver)
}

/// Consumes the queue: webhook events go to the processor, domain events
/// trigger follow-up work (initial sync after a new connection).
pub struct QueueWorker {
    receiver: mpsc::UnboundedReceiver<Delivery>,
    redelivery: QueueHandle,
    processor: WebhookProcessor,
    sync: SyncService,
    institution_connections: Arc<dyn InstitutionConnectionRepositoryTrait>,
    provider_connections: Arc<dyn ProviderConnectionRepositoryTrait>,
    factory: Arc<dyn ProviderFactory>,
}

impl QueueWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Delivery>,
        redelivery: QueueHandle,
        processor: WebhookProcessor,
        sync: SyncService,
        institution_connections: Arc<dyn InstitutionConnectionRepositoryTrait>,
        provider_connections: Arc<dyn ProviderConnectionRepositoryTrait>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            receiver,
            redelivery,
            processor,
            sync,
            institution_connections,
            provider_connections,
            factory,
        }
    }

    pub async fn run(mut self) {
        while let Some(delivery) = self.receiver.recv().await {
            match self.handle_message(&delivery.message).await {
                Ok(()) => {}
                Err(e) => {
                    let attempts = delivery.attempts + 1;
                    if attempts >= MAX_DELIVERIES {
                        error!(
                            "Dropping queue message after {} failed deliveries: {}",
                            attempts, e
                        );
                    } else {
                        warn!("Queue delivery failed (attempt {}): {}", attempts, e);
                        let _ = self.redelivery.sender.send(Delivery {
                            message: delivery.message,
                            attempts,
                        });
                    }
                }
            }
        }
    }

    pub async fn handle_message(&self, message: &QueueMessage) -> Result<()> {
        match message {
            QueueMessage::Webhook(event) => self.processor.process(event.clone()).await,
            QueueMessage::Domain(event) => self.handle_domain(event).await,
        }
    }

    async fn handle_domain(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::ConnectionEstablished {
                institution_connection_id,
                user_id,
                provider,
            } => {
                info!(
                    "Running initial sync for connection {} (user {})",
                    institution_connection_id, user_id
                );
                let connection = self
                    .institution_connections
                    .get_by_id(institution_connection_id)?;
                let provider_connection = self
                    .provider_connections
                    .get_by_id(&connection.provider_connection_id)?;
                let kind = ProviderKind::from_name(provider)?;
                let client = self.factory.client(kind).map_err(Error::from)?;
                let summary = self
                    .sync
                    .sync_connection(&client, &connection, &provider_connection)
                    .await?;
                info!(
                    "Initial sync for connection {}: {} accounts, {} transactions",
                    institution_connection_id,
                    summary.accounts_synced,
                    summary.transactions_inserted
                );
                Ok(())
            }
            DomainEvent::AccountsChanged { account_ids } => {
                debug!("Accounts changed: {:?}", account_ids);
                Ok(())
            }
            DomainEvent::TransactionsChanged { account_ids } => {
                debug!("Transactions changed: {:?}", account_ids);
                Ok(())
            }
        }
    }
}
