//! Tracing/logging setup shared by the CRM binaries.
//!
//! These are process diagnostics. The per-job business logs (heartbeat,
//! low-stock, reminders, report) are plain-text files written by
//! `crm_infra::log_sink`, not tracing output.

/// Tracing configuration (filters, formats).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide tracing with the given output format.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}
