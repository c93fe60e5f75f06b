//! Low-stock replenishment.
//!
//! Remote mutation first; if it fails, restock directly against the store.
//! Every run appends exactly one record to the job log.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crm_core::ProductId;
use crm_inventory::RestockPolicy;
use crm_products::Product;

use crate::fallback::{remote_first, Method, Resolution};
use crate::log_sink::LogSink;
use crate::remote::{CrmRemote, RemoteError};
use crate::store::{InventoryStore, StoreError};

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y-%H:%M:%S";

pub const NO_LOW_STOCK: &str = "No low-stock products found.";

/// One product touched by a run. `old_stock` is unknown on the remote path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedProduct {
    pub id: String,
    pub name: String,
    pub old_stock: Option<i64>,
    pub new_stock: i64,
}

/// Structured result of one replenishment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplenishmentOutcome {
    pub method: Method,
    pub timestamp: DateTime<Utc>,
    pub updated: Vec<UpdatedProduct>,
    pub summary: String,
    /// Why the remote path was abandoned, when it was.
    pub remote_error: Option<String>,
    /// Local-path errors: per-product save failures, or the scan failure.
    pub errors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ReplenishmentError {
    #[error("could not scan for low-stock products: {0}")]
    Scan(#[source] StoreError),

    #[error("no low-stock product could be updated")]
    NothingApplied(Vec<String>),
}

/// Products updated by one path, plus per-product failures.
#[derive(Debug, Default)]
struct Applied {
    updated: Vec<UpdatedProduct>,
    errors: Vec<String>,
    message: Option<String>,
}

pub fn success_summary(count: usize) -> String {
    format!("Successfully updated {count} low-stock products.")
}

impl ReplenishmentOutcome {
    pub fn succeeded(&self) -> bool {
        self.method != Method::Failed
    }

    fn from_resolution(
        timestamp: DateTime<Utc>,
        resolution: Resolution<Applied, ReplenishmentError>,
    ) -> Self {
        match resolution {
            Resolution::Remote(applied) => Self {
                method: Method::Remote,
                timestamp,
                summary: applied
                    .message
                    .unwrap_or_else(|| success_summary(applied.updated.len())),
                updated: applied.updated,
                remote_error: None,
                errors: applied.errors,
            },
            Resolution::Local {
                value,
                remote_error,
            } => {
                let summary = if value.updated.is_empty() && value.errors.is_empty() {
                    NO_LOW_STOCK.to_string()
                } else {
                    success_summary(value.updated.len())
                };
                Self {
                    method: Method::Local,
                    timestamp,
                    updated: value.updated,
                    summary,
                    remote_error: Some(remote_error.to_string()),
                    errors: value.errors,
                }
            }
            Resolution::Failed {
                remote_error,
                local_error,
            } => {
                let summary = format!(
                    "Low-stock update failed: remote: {remote_error}; local: {local_error}"
                );
                let errors = match local_error {
                    ReplenishmentError::NothingApplied(errors) => errors,
                    scan @ ReplenishmentError::Scan(_) => vec![scan.to_string()],
                };
                Self {
                    method: Method::Failed,
                    timestamp,
                    updated: Vec::new(),
                    summary,
                    remote_error: Some(remote_error.to_string()),
                    errors,
                }
            }
        }
    }

    /// Render as the single multi-line record appended to the job log.
    pub fn log_record(&self) -> String {
        let ts = self.timestamp.format(TIMESTAMP_FORMAT);
        let mut out = String::new();

        if let Some(remote_error) = &self.remote_error {
            let _ = writeln!(out, "{ts} [GraphQL] Remote update failed: {remote_error}");
        }

        let tag = match self.method {
            Method::Remote => "[GraphQL]",
            Method::Local => "[Database Fallback]",
            Method::Failed => "[Failed]",
        };
        let _ = writeln!(out, "{ts} {tag} {}", self.summary);

        if !self.updated.is_empty() {
            let _ = writeln!(out, "{ts} {tag} Updated products:");
            for p in &self.updated {
                match p.old_stock {
                    Some(old) => {
                        let _ = writeln!(
                            out,
                            "{ts}   - {} (ID: {}) - Stock: {} -> {}",
                            p.name, p.id, old, p.new_stock
                        );
                    }
                    None => {
                        let _ = writeln!(
                            out,
                            "{ts}   - {} (ID: {}) - New stock: {}",
                            p.name, p.id, p.new_stock
                        );
                    }
                }
            }
        }
        for error in &self.errors {
            let _ = writeln!(out, "{ts} {tag} Error: {error}");
        }

        out.push('\n');
        out
    }
}

/// Runs the replenishment workflow against one store and one remote.
pub struct Replenisher<S: ?Sized> {
    store: Arc<S>,
    remote: Arc<dyn CrmRemote>,
    policy: RestockPolicy,
    sink: LogSink,
}

impl<S: InventoryStore + ?Sized> Replenisher<S> {
    pub fn new(
        store: Arc<S>,
        remote: Arc<dyn CrmRemote>,
        policy: RestockPolicy,
        sink: LogSink,
    ) -> Self {
        Self {
            store,
            remote,
            policy,
            sink,
        }
    }

    /// One run. Never panics and never returns an error: failures are in the
    /// outcome and in the log.
    pub async fn run(&self) -> ReplenishmentOutcome {
        let timestamp = Utc::now();
        let resolution = remote_first(
            "low-stock",
            || self.apply_remotely(),
            || self.apply_locally(),
        )
        .await;

        let outcome = ReplenishmentOutcome::from_resolution(timestamp, resolution);
        let destination = self.sink.append(&outcome.log_record());
        tracing::info!(
            job = "low-stock",
            method = %outcome.method,
            updated = outcome.updated.len(),
            ?destination,
            "{}",
            outcome.summary
        );
        outcome
    }

    async fn apply_remotely(&self) -> Result<Applied, RemoteError> {
        let update = self.remote.update_low_stock_products().await?;
        Ok(Applied {
            updated: update
                .products
                .into_iter()
                .map(|p| UpdatedProduct {
                    id: p.id.0,
                    name: p.name,
                    old_stock: None,
                    new_stock: p.stock,
                })
                .collect(),
            errors: Vec::new(),
            message: Some(update.success_message),
        })
    }

    /// Restock every low-stock product in store order. A failed save is
    /// recorded and the remaining candidates are still processed.
    async fn apply_locally(&self) -> Result<Applied, ReplenishmentError> {
        let products = self
            .store
            .find_low_stock(self.policy.threshold())
            .await
            .map_err(ReplenishmentError::Scan)?;

        let candidates = self.policy.select_candidates(&products);
        let mut by_id: HashMap<ProductId, Product> =
            products.into_iter().map(|p| (p.id_typed(), p)).collect();

        let mut applied = Applied::default();
        for candidate in candidates {
            let Some(mut product) = by_id.remove(&candidate.product_id) else {
                continue;
            };
            let new_stock = self.policy.apply(&candidate);

            let saved = match product.set_stock(new_stock) {
                Ok(()) => self.store.save_product(&product).await,
                Err(e) => Err(StoreError::Domain(e)),
            };
            match saved {
                Ok(()) => applied.updated.push(UpdatedProduct {
                    id: candidate.product_id.to_string(),
                    name: candidate.name,
                    old_stock: Some(candidate.old_stock),
                    new_stock,
                }),
                Err(e) => {
                    tracing::warn!(
                        job = "low-stock",
                        product_id = %candidate.product_id,
                        error = %e,
                        "failed to save restocked product"
                    );
                    applied.errors.push(format!(
                        "{} (ID: {}): {e}",
                        candidate.name, candidate.product_id
                    ));
                }
            }
        }

        if applied.updated.is_empty() && !applied.errors.is_empty() {
            return Err(ReplenishmentError::NothingApplied(applied.errors));
        }
        Ok(applied)
    }
}
