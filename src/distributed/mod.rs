//! Distributed evaluation
//!
//! One master hosts the work queue; any number of workers, on any number of
//! hosts, attach to it over TCP and evaluate items until none are left.
//!
//! # Modules
//!
//! - `protocol`: message definitions, framing and authentication digests
//! - `queue`: leased work queue and result queue
//! - `master`: queue service and result aggregation
//! - `worker`: pull/evaluate/push loop

pub mod master;
pub mod protocol;
pub mod queue;
pub mod worker;

pub use master::{Master, MasterConfig, MasterReport, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PORT};
pub use protocol::{Message, PROTOCOL_VERSION};
pub use queue::{Progress, ResultQueue, WorkQueue};
pub use worker::{run_pool, DistributedWorker, WorkerConfig, WorkerSummary};
