use std::time::Duration;

use async_trait::async_trait;

use crate::config::RemoteConfig;

use super::wire::{self, GraphQlRequest};
use super::{CrmRemote, LowStockUpdate, ProtocolError, RemoteError, RemoteOrder, ReportData, TransportError};

/// Longest response body kept in a `TransportError::Status`.
const MAX_ERROR_BODY: usize = 512;

/// `CrmRemote` over HTTP POST with a JSON `{"query": ...}` body.
///
/// One attempt per call, bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl GraphQlClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `document` and return the raw body of a 2xx response.
    async fn post(&self, document: &str) -> Result<String, RemoteError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&GraphQlRequest { query: document })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "GraphQL endpoint returned an error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(body),
            }
            .into());
        }
        Ok(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout_secs).into()
        } else {
            TransportError::Connect(err.to_string()).into()
        }
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

fn protocol(err: ProtocolError) -> RemoteError {
    RemoteError::Protocol(err)
}

#[async_trait]
impl CrmRemote for GraphQlClient {
    async fn update_low_stock_products(&self) -> Result<LowStockUpdate, RemoteError> {
        let body = self.post(wire::UPDATE_LOW_STOCK_MUTATION).await?;
        wire::decode_low_stock_update(&body).map_err(protocol)
    }

    async fn hello(&self) -> Result<String, RemoteError> {
        let body = self.post(wire::HELLO_QUERY).await?;
        wire::decode_hello(&body).map_err(protocol)
    }

    async fn report_data(&self) -> Result<ReportData, RemoteError> {
        let body = self.post(wire::REPORT_QUERY).await?;
        wire::decode_report(&body).map_err(protocol)
    }

    async fn orders(&self) -> Result<Vec<RemoteOrder>, RemoteError> {
        let body = self.post(wire::ORDERS_QUERY).await?;
        wire::decode_orders(&body).map_err(protocol)
    }
}
