//! Turns published nonces into submitted blocks.

use std::sync::Arc;
use std::time::Duration;

use solo_core::{
    assemble_block, bits_to_target, double_sha256, hash_below_target, hash_to_display_hex,
    BuildError, HeaderBuilder,
};
use tracing::{debug, error, info};

use crate::cache::TemplateCache;
use crate::orchestrator::unix_time;
use crate::shutdown::ShutdownSignal;
use crate::slots::{FoundNonce, ResultSlot};
use crate::source::{BlockSubmitter, SubmitError};

/// What one pass over the result slot did.
#[derive(Debug)]
pub enum CheckOutcome {
    /// Nothing was waiting.
    Idle,
    /// The task's template is no longer cached.
    Stale(FoundNonce),
    /// The task was already submitted once.
    Duplicate(FoundNonce),
    /// The rebuilt header did not meet its target.
    Invalid(FoundNonce),
    /// The template could not be rebuilt.
    BuildFailed(FoundNonce, BuildError),
    /// The block was handed to the submitter.
    Submitted {
        found: FoundNonce,
        block_hash: String,
        result: Result<(), SubmitError>,
    },
}

/// Drains the result slot, rebuilds blocks and submits them.
pub struct ResultChecker {
    builder: HeaderBuilder,
    results: Arc<ResultSlot>,
    cache: Arc<TemplateCache>,
    submitter: Arc<dyn BlockSubmitter>,
    idle_backoff: Duration,
    shutdown: ShutdownSignal,
    last_submitted: Option<u64>,
}

impl ResultChecker {
    pub fn new(
        builder: HeaderBuilder,
        results: Arc<ResultSlot>,
        cache: Arc<TemplateCache>,
        submitter: Arc<dyn BlockSubmitter>,
        idle_backoff: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        ResultChecker {
            builder,
            results,
            cache,
            submitter,
            idle_backoff,
            shutdown,
            last_submitted: None,
        }
    }

    pub fn run(mut self) {
        debug!("result checker started");
        while !self.shutdown.is_triggered() {
            if let CheckOutcome::Idle = self.check_once() {
                self.shutdown.sleep(self.idle_backoff);
            }
        }
        debug!("result checker stopped");
    }

    /// Process the waiting result, if any, then clear the slot.
    ///
    /// The slot stays occupied while the block is built and submitted so
    /// workers cannot overwrite it.
    pub fn check_once(&mut self) -> CheckOutcome {
        let Some(found) = self.results.peek() else {
            return CheckOutcome::Idle;
        };

        let outcome = self.process(found);
        self.results.clear();
        outcome
    }

    fn process(&mut self, found: FoundNonce) -> CheckOutcome {
        if self.last_submitted == Some(found.task_id) {
            debug!(task_id = found.task_id, nonce = found.nonce, "duplicate result dropped");
            return CheckOutcome::Duplicate(found);
        }

        let Some(entry) = self.cache.snapshot(found.task_id) else {
            debug!(task_id = found.task_id, nonce = found.nonce, "stale result dropped");
            return CheckOutcome::Stale(found);
        };
        let template = entry.template;

        let (candidate, target) = match self
            .builder
            .build(&template, unix_time())
            .and_then(|candidate| {
                let bits = template.bits.value()?;
                Ok((candidate, bits_to_target(bits)))
            }) {
            Ok(built) => built,
            Err(e) => {
                error!(task_id = found.task_id, error = %e, "failed to rebuild block");
                return CheckOutcome::BuildFailed(found, e);
            }
        };

        let header = candidate.with_nonce(found.nonce);
        let hash = double_sha256(&header);
        let mut target_le = target;
        target_le.reverse();
        let block_hash = hash_to_display_hex(&hash);

        if !hash_below_target(&hash, &target_le) {
            error!(
                task_id = found.task_id,
                nonce = found.nonce,
                block_hash = %block_hash,
                "rebuilt header does not meet target"
            );
            return CheckOutcome::Invalid(found);
        }

        let block = assemble_block(&header, &candidate.coinbase, &template);
        info!(
            task_id = found.task_id,
            height = entry.height,
            nonce = found.nonce,
            block_hash = %block_hash,
            bytes = block.len(),
            "submitting block"
        );

        let result = self.submitter.submit_block(&hex::encode(&block));
        self.last_submitted = Some(found.task_id);
        match &result {
            Ok(()) => info!(height = entry.height, block_hash = %block_hash, "block accepted"),
            Err(e) => error!(
                height = entry.height,
                block_hash = %block_hash,
                error = %e,
                "block submission failed"
            ),
        }

        CheckOutcome::Submitted {
            found,
            block_hash,
            result,
        }
    }
}
