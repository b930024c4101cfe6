//! API client module for the back-office API

pub mod client;
mod clients;
mod company;
mod error;
mod me;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::auth::SessionEvent;
use crate::models::{ClientCreate, ClientUpdate};
use client::ApiClient;

pub use clients::ListParams;
pub use company::{CompanyFields, CompanyRegistration};
pub use error::ApiError;

/// Build a client from disk and log session changes while it lives.
pub(crate) fn connect() -> Result<ApiClient> {
    let client = ApiClient::from_config()?;
    let mut events = client.session().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::SignedIn) => tracing::debug!("Session token set"),
                Ok(SessionEvent::Refreshed) => tracing::info!("Session token refreshed"),
                Ok(SessionEvent::SignedOut) => tracing::debug!("Session cleared"),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
    Ok(client)
}

/// Point the user at `login` when a call failed because the server
/// rejected the session and it has been cleared.
pub(crate) fn hint_login<T>(client: &ApiClient, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        let rejected = e
            .chain()
            .any(|cause| cause.downcast_ref::<ApiError>().is_some_and(ApiError::is_unauthorized));
        if rejected && client.session().token().is_none() {
            e.context("Session ended. Run 'joslasync login' to sign in again.")
        } else {
            e
        }
    })
}

/// List clients
pub async fn list_clients(params: ListParams) -> Result<()> {
    clients::list_clients(params).await
}

/// Show one client
pub async fn show_client(id: Uuid) -> Result<()> {
    clients::show_client(id).await
}

/// Create a client
pub async fn add_client(payload: ClientCreate) -> Result<()> {
    clients::add_client(payload).await
}

/// Update a client
pub async fn edit_client(id: Uuid, update: ClientUpdate) -> Result<()> {
    clients::edit_client(id, update).await
}

/// Delete a client
pub async fn delete_client(id: Uuid) -> Result<()> {
    clients::delete_client(id).await
}

/// Show the current tenant's company profile
pub async fn show_company() -> Result<()> {
    company::show_company().await
}

/// Update the company profile, optionally replacing the logo
pub async fn update_company(fields: CompanyFields, logo: Option<PathBuf>) -> Result<()> {
    company::update_company(fields, logo).await
}

/// Register a new company (tenant onboarding)
pub async fn register_company(registration: CompanyRegistration) -> Result<()> {
    company::register_company(registration).await
}

/// Show current user info
pub async fn whoami() -> Result<()> {
    me::whoami().await
}
