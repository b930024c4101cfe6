//! Password login, logout, registration and session bootstrap

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use super::claims::decode_claims;
use super::TokenStore;
use crate::api::client::{ApiClient, LOGIN_PATH, ME_PATH, REGISTER_PATH};
use crate::api::ApiError;
use crate::config::{Credentials, TOKEN_ENV};
use crate::models::{LoginInput, LoginResponse, MeResponse, UserCreate, UserRead};

/// Exchange credentials for a session and load the identity behind it.
pub async fn sign_in(client: &ApiClient, username: &str, password: &str) -> Result<MeResponse> {
    let input = LoginInput { username, password };
    let resp: LoginResponse = match client.post_json(LOGIN_PATH, &input).await {
        Ok(resp) => resp,
        Err(e) if e.is_unauthorized() => bail!("Invalid username or password."),
        Err(e) => return Err(e).context("Login failed"),
    };

    client.session().set_token(Some(resp.access_token))?;
    if let Some(rt) = resp.refresh_token {
        client.session().set_refresh_token(rt)?;
    }
    tracing::info!("Signed in as {}", username);

    bootstrap(client)
        .await?
        .context("Login succeeded but the session was rejected")
}

/// Validate the persisted token against the identity endpoint.
///
/// Returns `Ok(None)` when there is no session, or when the server rejected
/// it (the local session is cleared in that case). Transport failures are
/// returned as errors and leave the session alone.
pub async fn bootstrap(client: &ApiClient) -> Result<Option<MeResponse>> {
    if client.session().token().is_none() {
        return Ok(None);
    }

    match client.get_json::<MeResponse>(ME_PATH).await {
        Ok(me) => Ok(Some(me)),
        Err(e @ ApiError::Status { .. }) => {
            tracing::warn!("Stored session rejected: {}", e);
            if let Err(e) = client.session().set_token(None) {
                tracing::warn!("Failed to clear stored session: {:#}", e);
            }
            Ok(None)
        }
        Err(e) => Err(e).context("Could not reach the identity endpoint"),
    }
}

pub fn print_identity(me: &MeResponse) {
    println!();
    println!("Username: {}", me.user.username);
    println!("Email:    {}", me.user.email);
    println!("Role:     {}", me.user.role);
    println!("User ID:  {}", me.user.id);
    println!(
        "Tenant:   {}",
        me.company
            .slug
            .as_deref()
            .or(me.company.db_name.as_deref())
            .unwrap_or("(none)")
    );
}

/// Perform password login
pub async fn login(username: &str, password: &str) -> Result<()> {
    let client = ApiClient::from_config()?;
    let me = sign_in(&client, username, password).await?;
    println!("Login successful.");
    print_identity(&me);
    Ok(())
}

/// Clear stored credentials. Needs neither the network nor an API URL.
pub async fn logout() -> Result<()> {
    clear_saved_session(Credentials::default_path()?)?;
    if std::env::var(TOKEN_ENV).is_ok_and(|t| !t.is_empty()) {
        println!(
            "Note: {} is set and still authenticates requests; unset it to sign out fully.",
            TOKEN_ENV
        );
    }
    println!("Logged out.");
    Ok(())
}

fn clear_saved_session(path: PathBuf) -> Result<()> {
    let mut credentials = Credentials::load_from(path)?;
    credentials.clear_tokens()
}

/// Create a user account
pub async fn register(username: &str, email: &str, password: &str) -> Result<()> {
    let client = ApiClient::from_config()?;
    let user: UserRead = client
        .post_json(
            REGISTER_PATH,
            &UserCreate {
                username,
                email,
                password,
            },
        )
        .await
        .context("Registration failed")?;

    println!("Registered user {} ({}), role {}.", user.username, user.email, user.role);
    Ok(())
}

/// Display current auth status. With `check`, also validate the token
/// against the server.
pub async fn status(check: bool) -> Result<()> {
    let client = ApiClient::from_config()?;
    let session = client.session();

    match session.token() {
        Some(token) => {
            println!("Access token: present");
            if let Some(claims) = decode_claims(&token) {
                if let Some(user) = claims.username.as_deref().or(claims.sub.as_deref()) {
                    println!("  user:       {}", user);
                }
                if let Some(role) = &claims.role {
                    println!("  role:       {}", role);
                }
                if let Some(slug) = &claims.company_slug {
                    println!("  company:    {}", slug);
                }
                if let Some(db) = &claims.db_name {
                    println!("  tenant db:  {}", db);
                }
                if let Some(exp) = claims.expires_at() {
                    println!("  expires_at: {}", exp.to_rfc3339());
                }
            }
        }
        None => println!("Access token: none"),
    }

    match session.refresh_token() {
        Some(_) => println!("Refresh tok:  present"),
        None => println!("Refresh tok:  none"),
    }

    if check {
        match bootstrap(&client).await? {
            Some(me) => {
                println!("\nSession is valid.");
                print_identity(&me);
            }
            None => println!("\nNo valid session."),
        }
    }

    if session.token().is_none() {
        println!("\nRun 'joslasync login' to authenticate.");
    }

    Ok(())
}
