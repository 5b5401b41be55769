//! CHAOS API client
//!
//! Every call is a form-encoded POST carrying the credentials. The API can
//! answer 200 OK with a logical error in the envelope, so the envelope's
//! `error` field is checked before the data is handed back.

use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::auth::Auth;
use crate::error::ChaosError;
use crate::types::{BroadbandInfo, BroadbandQuota, Envelope, ErrorResponse, InfoResponse, QuotaResponse};

pub const DEFAULT_ENDPOINT: &str = "https://chaos2.aa.net.uk";
const REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// Handle on the CHAOS API. Cheap to share; the HTTP client pools connections.
#[derive(Debug, Clone)]
pub struct Chaos {
    client: Client,
    endpoint: String,
    auth: Auth,
}

impl Chaos {
    pub fn new(auth: Auth) -> Result<Self, ChaosError> {
        auth.validate()?;
        Ok(Self {
            client: build_client(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth,
        })
    }

    /// Point the client somewhere other than the production API.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ChaosError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch information about every broadband line on the account.
    pub async fn broadband_info(&self) -> Result<Vec<BroadbandInfo>, ChaosError> {
        self.request::<InfoResponse>("/broadband/info").await
    }

    /// Fetch the quota of every broadband line on the account.
    pub async fn broadband_quota(&self) -> Result<Vec<BroadbandQuota>, ChaosError> {
        self.request::<QuotaResponse>("/broadband/quota").await
    }

    async fn request<E: Envelope>(&self, path: &str) -> Result<Vec<E::Item>, ChaosError> {
        let url = format!("{}{}", self.endpoint, path);
        tracing::debug!("POST {}", url);

        let response = self.client.post(&url).form(&self.auth.form()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status != StatusCode::OK {
            return Err(ChaosError::Status {
                status: status.as_u16(),
                message: upstream_error(&body),
            });
        }

        let envelope: E = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                // An error reply may not have a well-formed data array.
                if let Some(message) = upstream_error(&body) {
                    return Err(ChaosError::Upstream(message));
                }
                return Err(ChaosError::Decode(format!("{} JSON decode: {}", path, e)));
            }
        };

        let (items, error) = envelope.into_parts();
        if !error.is_empty() {
            tracing::debug!("{} reported error: {}", path, error);
            return Err(ChaosError::Upstream(error));
        }

        tracing::debug!("{} returned {} records", path, items.len());
        Ok(items)
    }
}

fn build_client(timeout: Duration) -> Result<Client, ChaosError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// The `error` string of a body, if it is JSON and the string is set.
fn upstream_error(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorResponse>(body)
        .ok()
        .map(|r| r.error)
        .filter(|e| !e.is_empty())
}
