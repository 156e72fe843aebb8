//! Template polling and task publication.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use solo_core::{
    bits_to_difficulty, bits_to_target, format_difficulty, hash_to_display_hex, BlockTemplate,
    BuildError, HeaderBuilder,
};
use tracing::{debug, error, info, warn};

use crate::cache::TemplateCache;
use crate::shutdown::ShutdownSignal;
use crate::slots::{Task, TaskSlot};
use crate::source::TemplateSource;

/// Current Unix time in seconds, saturated to the header's 32-bit field.
pub fn unix_time() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Time between template fetches.
    pub check_interval: Duration,
    /// Republish when the mempool transaction count moves by more than
    /// this at the same height.
    pub churn_threshold: usize,
}

/// Why a new task was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepublishReason {
    FirstTask,
    NewHeight,
    PrevHashChanged,
    MempoolChurn,
}

impl fmt::Display for RepublishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepublishReason::FirstTask => "first task",
            RepublishReason::NewHeight => "new height",
            RepublishReason::PrevHashChanged => "previous block changed",
            RepublishReason::MempoolChurn => "mempool churn",
        };
        f.write_str(name)
    }
}

/// Summary of the task currently live in the slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedTask {
    pub id: u64,
    pub height: u64,
    pub prev_block_hash: [u8; 32],
    pub tx_count: usize,
}

/// Decide whether `template` warrants a new task.
pub fn republish_reason(
    current: Option<&PublishedTask>,
    template: &BlockTemplate,
    churn_threshold: usize,
) -> Option<RepublishReason> {
    let Some(current) = current else {
        return Some(RepublishReason::FirstTask);
    };

    if template.height > current.height {
        Some(RepublishReason::NewHeight)
    } else if template.prev_block_hash != current.prev_block_hash {
        Some(RepublishReason::PrevHashChanged)
    } else if template.tx_count().abs_diff(current.tx_count) > churn_threshold {
        Some(RepublishReason::MempoolChurn)
    } else {
        None
    }
}

/// What one orchestrator cycle did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The template source failed; nothing changed.
    SourceFailed,
    /// The live task is still current.
    Unchanged,
    /// The template could not be turned into a task.
    BuildFailed(BuildError),
    Published {
        task: Task,
        reason: RepublishReason,
        evicted: usize,
    },
}

/// Polls the template source and fans new tasks out to every worker.
pub struct Orchestrator {
    builder: HeaderBuilder,
    source: Arc<dyn TemplateSource>,
    slots: Vec<Arc<TaskSlot>>,
    cache: Arc<TemplateCache>,
    settings: OrchestratorSettings,
    shutdown: ShutdownSignal,
    next_id: u64,
    current: Option<PublishedTask>,
}

impl Orchestrator {
    pub fn new(
        builder: HeaderBuilder,
        source: Arc<dyn TemplateSource>,
        slots: Vec<Arc<TaskSlot>>,
        cache: Arc<TemplateCache>,
        settings: OrchestratorSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Orchestrator {
            builder,
            source,
            slots,
            cache,
            settings,
            shutdown,
            next_id: 1,
            current: None,
        }
    }

    /// The task currently live in the slots.
    pub fn current(&self) -> Option<&PublishedTask> {
        self.current.as_ref()
    }

    pub fn run(mut self) {
        debug!(workers = self.slots.len(), "orchestrator started");
        loop {
            self.tick();
            if self.shutdown.sleep(self.settings.check_interval) {
                break;
            }
        }
        debug!("orchestrator stopped");
    }

    /// Fetch one template and publish it if needed.
    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(unix_time())
    }

    /// [`Orchestrator::tick`] with an explicit clock.
    pub fn tick_at(&mut self, now: u32) -> TickOutcome {
        let template = match self.source.fetch_template() {
            Ok(template) => template,
            Err(e) => {
                warn!(error = %e, "failed to fetch block template");
                return TickOutcome::SourceFailed;
            }
        };

        let Some(reason) = republish_reason(
            self.current.as_ref(),
            &template,
            self.settings.churn_threshold,
        ) else {
            return TickOutcome::Unchanged;
        };

        match self.publish(template, reason, now) {
            Ok((task, evicted)) => TickOutcome::Published {
                task,
                reason,
                evicted,
            },
            Err(e) => {
                error!(error = %e, "failed to build task from template");
                TickOutcome::BuildFailed(e)
            }
        }
    }

    fn publish(
        &mut self,
        template: BlockTemplate,
        reason: RepublishReason,
        now: u32,
    ) -> Result<(Task, usize), BuildError> {
        // Absent timestamps are fixed now so the checker rebuilds the
        // exact header the workers are hashing.
        let template = template.pinned_at(now);
        let candidate = self.builder.build(&template, now)?;
        let bits = template.bits.value()?;

        let id = self.next_id;
        self.next_id += 1;
        let task = Task::new(id, candidate.bytes, bits_to_target(bits));

        let height = template.height;
        let previous_height = self.current.as_ref().map(|c| c.height);
        let published = PublishedTask {
            id,
            height,
            prev_block_hash: template.prev_block_hash,
            tx_count: template.tx_count(),
        };

        self.cache.insert(id, Arc::new(template));
        for slot in &self.slots {
            slot.publish(&task);
        }

        info!(
            task_id = id,
            height,
            txs = published.tx_count,
            prev_block = %hash_to_display_hex(&published.prev_block_hash),
            difficulty = %format_difficulty(bits_to_difficulty(bits)),
            reason = %reason,
            "published new task"
        );

        let evicted = match previous_height {
            Some(previous) if height > previous => {
                let evicted = self.cache.evict(height);
                if evicted > 0 {
                    debug!(height, evicted, "evicted cached templates");
                }
                evicted
            }
            _ => 0,
        };

        self.current = Some(published);
        Ok((task, evicted))
    }
}
