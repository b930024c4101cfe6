//! Authenticated HTTP client for the back-office API
//!
//! Wraps reqwest::Client with bearer token injection. A 401 on any
//! endpoint other than login/refresh parks the request on the session
//! manager, which runs at most one refresh and replays parked requests
//! once with the new token.

use anyhow::{bail, Context, Result};
use futures::FutureExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::ApiError;
use crate::auth::{MemoryTokenStore, RefreshFuture, RefreshedTokens, SessionManager, TokenStore};
use crate::config::{Config, Credentials, TOKEN_ENV};
use crate::models::LoginResponse;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const ME_PATH: &str = "/api/auth/me";
pub const REGISTER_PATH: &str = "/api/auth/register";

/// Request body kept in replayable form.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

#[derive(Debug, Clone)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Description of one API call, complete enough to dispatch it again.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API base URL, e.g. /api/clients
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub bearer: Option<String>,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            bearer: None,
            retried: false,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.body = Some(RequestBody::Multipart(fields));
        self
    }

    /// Login and refresh failures must never trigger a refresh.
    pub fn is_auth_endpoint(&self) -> bool {
        self.path.contains(LOGIN_PATH) || self.path.contains(REFRESH_PATH)
    }
}

/// Authenticated client for the back-office API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    refresh_cookie: String,
    session: SessionManager,
}

impl ApiClient {
    /// Build a client from the on-disk config and credentials, or from
    /// JOSLASYNC_TOKEN when set.
    pub fn from_config() -> Result<Self> {
        let config = Config::load()?;
        let base_url = config.api_url()?;
        if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
            tracing::debug!("Using ephemeral session from {}", TOKEN_ENV);
            return Self::new(
                &base_url,
                &config,
                MemoryTokenStore::with_tokens(Some(&token), None),
            );
        }
        let credentials = Credentials::load()?;
        Self::new(&base_url, &config, credentials)
    }

    /// `base_url` is used as given; `config` supplies timeout and cookie name.
    pub fn new(base_url: &str, config: &Config, store: impl TokenStore + 'static) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            refresh_cookie: config.refresh_cookie_name().to_string(),
            session: SessionManager::new(store),
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the session token, dispatch, and route failures through
    /// the refresh protocol.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        self.session.attach_token(&mut request);
        match self.dispatch(&request).await {
            Ok(resp) => Ok(resp),
            Err(err) => self.on_response_error(request, err).await,
        }
    }

    /// Handle a failed dispatch.
    ///
    /// Only a 401 on a non-auth endpoint that has not been replayed yet is
    /// retried; everything else comes back unchanged. The replay result,
    /// success or failure, is final.
    pub async fn on_response_error(
        &self,
        mut request: ApiRequest,
        error: ApiError,
    ) -> Result<Response, ApiError> {
        if !error.is_unauthorized() || request.retried || request.is_auth_endpoint() {
            return Err(error);
        }

        let Some(token) = self.session.await_token(|| self.refresh_call()).await else {
            return Err(error);
        };

        tracing::debug!("Replaying {} {} with refreshed token", request.method, request.path);
        request.retried = true;
        request.bearer = Some(token);
        self.dispatch(&request).await
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let url = self.url(&request.path);
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            None => builder,
            Some(RequestBody::Json(body)) => builder.json(body),
            Some(RequestBody::Multipart(fields)) => builder.multipart(build_form(fields)),
        };

        let resp = builder.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;

        check_response(resp, &url).await
    }

    /// One call to the refresh endpoint, presenting the refresh cookie.
    fn refresh_call(&self) -> RefreshFuture {
        let http = self.http.clone();
        let url = self.url(REFRESH_PATH);
        let cookie = self
            .session
            .refresh_token()
            .map(|rt| format!("{}={}", self.refresh_cookie, rt));

        async move {
            let mut req = http.post(&url).header(CONTENT_LENGTH, "0");
            match cookie {
                Some(cookie) => req = req.header(COOKIE, cookie),
                None => tracing::debug!("No refresh credential stored, trying refresh anyway"),
            }

            let resp = req
                .send()
                .await
                .with_context(|| format!("POST {} failed", url))?;
            let resp = check_response(resp, &url).await?;
            let body: LoginResponse = resp
                .json()
                .await
                .context("Failed to parse refresh response")?;
            if body.access_token.is_empty() {
                bail!("Refresh response carried no access token");
            }

            Ok::<_, anyhow::Error>(RefreshedTokens {
                access_token: body.access_token,
                refresh_token: body.refresh_token,
            })
        }
        .boxed()
    }

    /// Send and decode a JSON response.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let url = self.url(&request.path);
        let resp = self.send(request).await?;
        resp.json()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::POST, path).json(to_json(path, body)?);
        self.send_json(request).await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::PUT, path).json(to_json(path, body)?);
        self.send_json(request).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::new(Method::DELETE, path)).await?;
        Ok(())
    }
}

fn to_json<B: Serialize>(path: &str, body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Forms are rebuilt per dispatch since reqwest consumes them.
fn build_form(fields: &[FormField]) -> Form {
    fields.iter().fold(Form::new(), |form, field| match field {
        FormField::Text { name, value } => form.text(name.clone(), value.clone()),
        FormField::File {
            name,
            file_name,
            bytes,
        } => form.part(
            name.clone(),
            Part::bytes(bytes.clone()).file_name(file_name.clone()),
        ),
    })
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: Response, url: &str) -> Result<Response, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status,
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}
