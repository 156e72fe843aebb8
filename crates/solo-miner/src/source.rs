//! Collaborators the engine talks to: where templates come from and
//! where solved blocks go.

use solo_core::{BlockTemplate, TemplateError};
use thiserror::Error;

/// Failure to obtain a template. The orchestrator skips the cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("node returned error: {0}")]
    Rpc(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Failure to submit a block. Logged, never retried.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("node returned error: {0}")]
    Rpc(String),
    /// The node answered with a rejection reason.
    #[error("block rejected: {0}")]
    Rejected(String),
}

/// Supplies the current block template.
pub trait TemplateSource: Send + Sync {
    fn fetch_template(&self) -> Result<BlockTemplate, SourceError>;
}

/// Accepts a fully serialized block as hex.
pub trait BlockSubmitter: Send + Sync {
    fn submit_block(&self, block_hex: &str) -> Result<(), SubmitError>;
}
