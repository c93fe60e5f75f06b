//! Infrastructure layer: config, stores, the remote CRM client, job logs,
//! the scheduled jobs and their scheduler.

pub mod config;
pub mod fallback;
pub mod jobs;
pub mod log_sink;
pub mod remote;
pub mod scheduler;
pub mod store;

pub use config::{ConfigError, CrmConfig};
pub use fallback::{remote_first, Method, Resolution};
pub use jobs::{CrmJobs, JobKind, JobReport};
pub use log_sink::{LogDestination, LogSink};
pub use remote::{CrmRemote, GraphQlClient, ProtocolError, RemoteError, TransportError};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use store::{CrmStore, InMemoryCrmStore, InventoryStore, PostgresCrmStore, SalesStore, StoreError};
