//! LedgerLink server binary.
//!
//! Wires the SQLite repositories, provider configuration, sync service, and
//! webhook processor together, then serves the callback/webhook routes while
//! a background worker drains the event queue.

mod api;
mod config;
mod queue;
mod state;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ledgerlink_connect::providers::ProviderFactory;
use ledgerlink_connect::sync::{seed_providers, SyncService};
use ledgerlink_connect::webhooks::WebhookProcessor;
use ledgerlink_connect::ConnectConfig;
use ledgerlink_core::accounts::AccountRepositoryTrait;
use ledgerlink_core::connections::{
    InstitutionConnectionRepositoryTrait, InstitutionRepositoryTrait,
    ProviderConnectionRepositoryTrait, ProviderRepositoryTrait,
};
use ledgerlink_core::events::DomainEventSink;
use ledgerlink_core::transactions::TransactionRepositoryTrait;
use ledgerlink_storage_sqlite::accounts::AccountRepository;
use ledgerlink_storage_sqlite::connections::{
    InstitutionConnectionRepository, InstitutionRepository, ProviderConnectionRepository,
    ProviderRepository,
};
use ledgerlink_storage_sqlite::transactions::TransactionRepository;
use ledgerlink_storage_sqlite::{create_pool, init_schema, spawn_writer};

use crate::config::ServerConfig;
use crate::queue::QueueWorker;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ledgerlink_server=info,info")),
        )
        .init();

    let server_config = ServerConfig::from_env()?;
    let connect_config = Arc::new(ConnectConfig::from_env()?);

    let pool = create_pool(&server_config.database_path)?;
    init_schema(&pool)?;
    let writer = spawn_writer(pool.as_ref().clone());

    let providers: Arc<dyn ProviderRepositoryTrait> =
        Arc::new(ProviderRepository::new(Arc::clone(&pool), writer.clone()));
    let institutions: Arc<dyn InstitutionRepositoryTrait> =
        Arc::new(InstitutionRepository::new(Arc::clone(&pool), writer.clone()));
    let provider_connections: Arc<dyn ProviderConnectionRepositoryTrait> = Arc::new(
        ProviderConnectionRepository::new(Arc::clone(&pool), writer.clone()),
    );
    let institution_connections: Arc<dyn InstitutionConnectionRepositoryTrait> = Arc::new(
        InstitutionConnectionRepository::new(Arc::clone(&pool), writer.clone()),
    );
    let accounts: Arc<dyn AccountRepositoryTrait> =
        Arc::new(AccountRepository::new(Arc::clone(&pool), writer.clone()));
    let transactions: Arc<dyn TransactionRepositoryTrait> =
        Arc::new(TransactionRepository::new(Arc::clone(&pool), writer));

    seed_providers(providers.as_ref()).await?;

    let (queue, receiver) = queue::channel();
    let events: Arc<dyn DomainEventSink> = Arc::new(queue.clone());
    let factory: Arc<dyn ProviderFactory> = connect_config.clone();

    let sync = SyncService::new(
        accounts.clone(),
        transactions.clone(),
        institutions.clone(),
        events.clone(),
    );
    let processor = WebhookProcessor::new(
        providers.clone(),
        institutions.clone(),
        provider_connections.clone(),
        institution_connections.clone(),
        accounts.clone(),
        factory.clone(),
        events,
    );
    let worker = QueueWorker::new(
        receiver,
        queue.clone(),
        processor,
        sync,
        institution_connections.clone(),
        provider_connections.clone(),
        factory,
    );
    tokio::spawn(worker.run());

    let app_state = AppState {
        connect: connect_config,
        snaptrade_webhook_secret: server_config.snaptrade_webhook_secret.clone(),
        providers,
        institutions,
        provider_connections,
        institution_connections,
        queue,
    };
    let app = api::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(server_config.listen).await?;
    info!("ledgerlink-server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Failed to install the Ctrl-C handler; running until killed");
        std::future::pending::<()>().await;
    }
}
