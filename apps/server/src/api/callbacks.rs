//! Browser-facing provider callback handlers.
//!
//! These endpoints terminate the redirect leg of a connect flow: verify the
//! signed state, finish any provider-side exchange, link the connection
//! locally, and render a small HTML page. A replayed callback hits the
//! idempotent insert and is answered as a success without a second event.

use axum::extract::{Query, State};
use axum::response::Html;
use serde::Deserialize;
use tracing::{error, info, warn};

use ledgerlink_connect::providers::EnableBankingClient;
use ledgerlink_connect::{verify_state, ConnectState, ProviderKind};
use ledgerlink_core::connections::{NewInstitutionConnection, NewProviderConnection};
use ledgerlink_core::errors::{Error, Result};
use ledgerlink_core::events::{DomainEvent, DomainEventSink};

use crate::state::AppState;

use super::pages;

#[derive(Deserialize)]
pub struct EnableBankingQuery {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub async fn enablebanking_callback(
    State(state): State<AppState>,
    Query(query): Query<EnableBankingQuery>,
) -> Html<String> {
    if let Some(reason) = query.error {
        info!("EnableBanking authorization declined: {}", reason);
        return pages::error("The bank authorization was cancelled or declined.");
    }
    let Some(connect_state) = query
        .state
        .as_deref()
        .and_then(|token| verify_state(token, &state.connect.state_secret))
    else {
        warn!("EnableBanking callback with missing or invalid state");
        return pages::error("This link is invalid or has expired.");
    };
    let Some(code) = query.code else {
        return pages::error("The bank did not return an authorization code.");
    };

    match establish_enablebanking(&state, &connect_state, &code).await {
        Ok(page) => page,
        Err(e) => {
            error!("EnableBanking callback failed: {}", e);
            pages::error("Something went wrong while finishing the connection. Please try again.")
        }
    }
}

async fn establish_enablebanking(
    state: &AppState,
    connect_state: &ConnectState,
    code: &str,
) -> Result<Html<String>> {
    let config = state
        .connect
        .enable_banking
        .as_ref()
        .ok_or_else(|| Error::MissingConfigKey("ENABLEBANKING_APP_ID".to_string()))?;
    let client =
        EnableBankingClient::new(config, &state.connect.state_secret).map_err(Error::from)?;
    let session_id = client.authorize_session(code).await.map_err(Error::from)?;

    establish_connection(
        state,
        ProviderKind::EnableBanking,
        connect_state,
        session_id,
        String::new(),
    )
    .await
}

#[derive(Deserialize)]
pub struct TellerQuery {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    enrollment_id: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub async fn teller_callback(
    State(state): State<AppState>,
    Query(query): Query<TellerQuery>,
) -> Html<String> {
    if let Some(reason) = query.error {
        info!("Teller enrollment declined: {}", reason);
        return pages::error("The bank authorization was cancelled or declined.");
    }
    let Some(connect_state) = query
        .state
        .as_deref()
        .and_then(|token| verify_state(token, &state.connect.state_secret))
    else {
        warn!("Teller callback with missing or invalid state");
        return pages::error("This link is invalid or has expired.");
    };
    let (Some(enrollment_id), Some(access_token)) = (query.enrollment_id, query.access_token)
    else {
        return pages::error("The enrollment details were incomplete.");
    };

    match establish_connection(
        &state,
        ProviderKind::Teller,
        &connect_state,
        enrollment_id,
        access_token,
    )
    .await
    {
        Ok(page) => page,
        Err(e) => {
            error!("Teller callback failed: {}", e);
            pages::error("Something went wrong while finishing the connection. Please try again.")
        }
    }
}

/// Links a finished provider flow: get-or-create the user's provider
/// connection, idempotently insert the institution connection, and enqueue
/// the established event only when a row was actually inserted.
async fn establish_connection(
    state: &AppState,
    kind: ProviderKind,
    connect_state: &ConnectState,
    connection_id: String,
    secret: String,
) -> Result<Html<String>> {
    let provider = state
        .providers
        .find_by_name(kind.display_name())?
        .ok_or_else(|| Error::Unexpected(format!("Provider {} is not seeded", kind)))?;
    let institution = state
        .institutions
        .find_by_provider_institution_id(&provider.id, &connect_state.institution_id)?
        .ok_or_else(|| {
            Error::Unexpected(format!(
                "Unknown institution {} for provider {}",
                connect_state.institution_id, kind
            ))
        })?;

    let provider_connection = match state
        .provider_connections
        .find_by_user_and_provider(&connect_state.user_id, &provider.id)?
    {
        Some(existing) => existing,
        None => {
            state
                .provider_connections
                .create(NewProviderConnection {
                    user_id: connect_state.user_id.clone(),
                    provider_id: provider.id.clone(),
                    secret,
                })
                .await?
        }
    };

    let inserted = state
        .institution_connections
        .insert_idempotent(NewInstitutionConnection {
            provider_connection_id: provider_connection.id.clone(),
            institution_id: institution.id.clone(),
            connection_id,
        })
        .await?;

    match inserted {
        Some(connection) => {
            state.queue.emit(DomainEvent::connection_established(
                connection.id,
                connect_state.user_id.clone(),
                kind.as_str().to_string(),
            ));
        }
        None => {
            info!(
                "Institution already connected for user {}; treating callback as a replay",
                connect_state.user_id
            );
        }
    }

    Ok(pages::success(kind.display_name()))
}
