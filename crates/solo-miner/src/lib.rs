//! Multi-threaded solo mining engine.
//!
//! An orchestrator polls a [`TemplateSource`], builds a header for each
//! new template and writes the resulting task into every worker's
//! [`TaskSlot`]. Workers search fixed slices of the nonce space and
//! report hits through the shared [`ResultSlot`]; the [`ResultChecker`]
//! rebuilds the block from the cached template and hands it to a
//! [`BlockSubmitter`].

pub mod cache;
pub mod checker;
pub mod config;
pub mod hashrate;
pub mod logging;
pub mod miner;
pub mod orchestrator;
pub mod rpc;
pub mod shutdown;
pub mod slots;
pub mod source;
pub mod worker;

pub use cache::{CachedEntry, TemplateCache};
pub use checker::{CheckOutcome, ResultChecker};
pub use config::{ConfigError, EngineConfig, MinerConfig};
pub use hashrate::{HashRate, HashrateMeter, HashrateReporter};
pub use miner::{Miner, MinerError, MinerHandle};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RepublishReason, TickOutcome};
pub use rpc::{RpcClient, RpcSettings};
pub use shutdown::ShutdownSignal;
pub use slots::{FoundNonce, ResultSlot, StatsArray, Task, TaskSlot};
pub use source::{BlockSubmitter, SourceError, SubmitError, TemplateSource};
pub use worker::{nonce_ranges, NonceRange, Worker};
