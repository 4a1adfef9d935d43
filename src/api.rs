//! REST client for the borrowing service backend.
//!
//! Every call reads the stored token immediately before sending and attaches
//! it as a bearer credential when present; an absent token sends the request
//! bare and leaves rejection to the server. No call is retried, and a 401
//! never clears the stored token: that decision belongs to the caller.

use log::debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::model::api::{Item, NewBorrowRequest, NewRoomRequest, Room};
use crate::receipts::ReceiptKind;
use crate::session::SessionStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not reach the server, check your connection and try again")]
    Network(#[source] reqwest::Error),
    #[error("session expired, please log in again")]
    Unauthorized,
    #[error("{0}")]
    Server(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        debug!("transport error: {}", e);
        ApiError::Network(e)
    }
}

/// What a successful login gives us. The server may also include a user
/// profile and a human-readable message.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: Option<Value>,
    pub message: Option<String>,
}

pub struct Client {
    base_url: String,
    http: reqwest::Client,
    store: SessionStore,
}

impl Client {
    pub fn new(base_url: &str, store: SessionStore) -> anyhow::Result<Self> {
        use anyhow::Context;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Client {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
            store,
        })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.store.token() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.json::<Value>().await.unwrap_or(Value::Null);
            let message =
                error_message(&body).unwrap_or_else(|| format!("server returned {}", status));
            return Err(ApiError::Server(message));
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!("GET {}", path);
        let resp = self.authed(self.http.get(self.url(path))).send().await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        debug!("POST {}", path);
        let resp = self
            .authed(self.http.post(self.url(path)).json(body))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        debug!("POST /login for {}", email);
        let resp = self
            .authed(
                self.http
                    .post(self.url("/login"))
                    .json(&json!({"email": email, "password": password})),
            )
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let body: Value = resp.json().await?;
        let token = extract_token(&body)
            .ok_or_else(|| ApiError::Server("no token returned from server".to_owned()))?;
        Ok(LoginOutcome {
            token,
            user: body.get("user").filter(|u| !u.is_null()).cloned(),
            message: body.get("message").and_then(Value::as_str).map(str::to_owned),
        })
    }

    pub async fn items(&self) -> Result<Vec<Item>, ApiError> {
        self.get_json("/items").await
    }

    pub async fn rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get_json("/rooms").await
    }

    pub async fn submit_borrow(&self, req: &NewBorrowRequest) -> Result<(), ApiError> {
        self.post_json("/requests", req).await
    }

    pub async fn submit_reservation(&self, req: &NewRoomRequest) -> Result<(), ApiError> {
        self.post_json("/room-requests", req).await
    }

    /// All item borrow requests in the system. The server does not filter by
    /// caller; reconciliation happens client-side.
    pub async fn borrow_requests(&self) -> Result<Vec<Value>, ApiError> {
        self.get_json("/requests").await
    }

    /// All room reservation requests in the system, unfiltered like
    /// `borrow_requests`.
    pub async fn room_requests(&self) -> Result<Vec<Value>, ApiError> {
        self.get_json("/room-requests").await
    }

    pub async fn cancel(&self, kind: ReceiptKind, id: &str) -> Result<(), ApiError> {
        let path = match kind {
            ReceiptKind::Item => format!("/requests/{}", id),
            ReceiptKind::Room => format!("/room-requests/{}", id),
        };
        debug!("DELETE {}", path);
        let resp = self.authed(self.http.delete(self.url(&path))).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}

/// The backend is inconsistent about where the login token lives: `token`,
/// `access_token`, or nested under `data.token`. Try each location in order;
/// first non-null wins.
pub fn extract_token(body: &Value) -> Option<String> {
    const LOCATIONS: [fn(&Value) -> Option<&Value>; 3] = [
        |v| v.get("token"),
        |v| v.get("access_token"),
        |v| v.pointer("/data/token"),
    ];
    LOCATIONS
        .iter()
        .filter_map(|f| f(body))
        .find(|v| !v.is_null())
        .and_then(Value::as_str)
        .map(|t| t.trim().to_owned())
}

/// Application-level error payload: `message` first, then `error`. Surfaced
/// verbatim when a string, serialized otherwise.
pub fn error_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|k| body.get(*k))
        .find(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}
