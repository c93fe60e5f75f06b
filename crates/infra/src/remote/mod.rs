//! Remote CRM API (GraphQL over HTTP).
//!
//! Every job tries the remote endpoint first. Any [`RemoteError`] sends the
//! job to its local-store fallback; nothing here retries.

mod graphql;
pub mod wire;

pub use graphql::GraphQlClient;
pub use wire::{LowStockUpdate, RemoteAmount, RemoteCustomer, RemoteId, RemoteOrder, RemoteProduct, ReportData};

use async_trait::async_trait;
use thiserror::Error;

/// The request never produced a usable HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Connect(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },
}

/// A response arrived but did not carry the expected payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Top-level GraphQL `errors`.
    #[error("GraphQL errors: {0:?}")]
    GraphQl(Vec<String>),

    /// The mutation payload reported its own `errors`.
    #[error("Mutation errors: {0:?}")]
    Rejected(Vec<String>),

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Operations the jobs need from the remote CRM.
#[async_trait]
pub trait CrmRemote: Send + Sync {
    /// Run the `updateLowStockProducts` mutation.
    async fn update_low_stock_products(&self) -> Result<LowStockUpdate, RemoteError>;

    /// Liveness probe (`query { hello }`).
    async fn hello(&self) -> Result<String, RemoteError>;

    /// Customer ids and order amounts for the weekly report.
    async fn report_data(&self) -> Result<ReportData, RemoteError>;

    /// All orders with their customer's contact details.
    async fn orders(&self) -> Result<Vec<RemoteOrder>, RemoteError>;
}
