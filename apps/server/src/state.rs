//! Shared handler state.

use std::sync::Arc;

use ledgerlink_connect::ConnectConfig;
use ledgerlink_core::connections::{
    InstitutionConnectionRepositoryTrait, InstitutionRepositoryTrait,
    ProviderConnectionRepositoryTrait, ProviderRepositoryTrait,
};

use crate::queue::QueueHandle;

#[derive(Clone)]
pub struct AppState {
    pub connect: Arc<ConnectConfig>,
    pub snaptrade_webhook_secret: Option<String>,
    pub providers: Arc<dyn ProviderRepositoryTrait>,
    pub institutions: Arc<dyn InstitutionRepositoryTrait>,
    pub provider_connections: Arc<dyn ProviderConnectionRepositoryTrait>,
    pub institution_connections: Arc<dyn InstitutionConnectionRepositoryTrait>,
    pub queue: QueueHandle,
}
