//! Engine wiring: spawns the workers and helper threads and owns their
//! shutdown.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use solo_core::HeaderBuilder;
use thiserror::Error;
use tracing::{info, Dispatch};

use crate::cache::TemplateCache;
use crate::checker::ResultChecker;
use crate::config::{ConfigError, EngineConfig};
use crate::hashrate::HashrateReporter;
use crate::logging::with_dispatch;
use crate::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::shutdown::ShutdownSignal;
use crate::slots::{ResultSlot, StatsArray, TaskSlot, SLOT_LAYOUT_VERSION};
use crate::source::{BlockSubmitter, TemplateSource};
use crate::worker::{nonce_ranges, Worker, WorkerSettings};

#[derive(Debug, Error)]
pub enum MinerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] io::Error),
}

/// A configured, not yet running, engine.
pub struct Miner {
    config: EngineConfig,
    builder: HeaderBuilder,
    source: Arc<dyn TemplateSource>,
    submitter: Arc<dyn BlockSubmitter>,
    dispatch: Dispatch,
}

impl Miner {
    pub fn new(
        config: EngineConfig,
        builder: HeaderBuilder,
        source: Arc<dyn TemplateSource>,
        submitter: Arc<dyn BlockSubmitter>,
    ) -> Result<Self, MinerError> {
        config.validate()?;
        Ok(Miner {
            config,
            builder,
            source,
            submitter,
            dispatch: Dispatch::none(),
        })
    }

    /// Log through `dispatch` on every engine thread.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Spawn all threads. Workers idle until the first task arrives.
    pub fn start(self) -> Result<MinerHandle, MinerError> {
        let shutdown = ShutdownSignal::new();
        let workers = self.config.workers;
        let slots: Vec<Arc<TaskSlot>> = (0..workers).map(|_| Arc::new(TaskSlot::new())).collect();
        let results = Arc::new(ResultSlot::new());
        let stats = Arc::new(StatsArray::new(workers));
        let cache = Arc::new(TemplateCache::new());

        let mut handle = MinerHandle {
            shutdown: shutdown.clone(),
            threads: Vec::with_capacity(workers + 3),
            stats: Arc::clone(&stats),
            cache: Arc::clone(&cache),
        };

        with_dispatch(&self.dispatch, || {
            info!(
                workers,
                chunk_size = self.config.chunk_size,
                payout = %self.builder.coinbase_builder().payout().display,
                layout = SLOT_LAYOUT_VERSION,
                "starting miner"
            );
        });

        let settings = WorkerSettings {
            chunk_size: self.config.chunk_size,
            idle_backoff: self.config.idle_backoff,
        };
        for (id, range) in nonce_ranges(workers).into_iter().enumerate() {
            let worker = Worker::new(
                id,
                range,
                settings,
                Arc::clone(&slots[id]),
                Arc::clone(&results),
                Arc::clone(&stats),
                shutdown.clone(),
            );
            handle.spawn(format!("worker-{id}"), &self.dispatch, move || worker.run())?;
        }

        let checker = ResultChecker::new(
            self.builder.clone(),
            Arc::clone(&results),
            Arc::clone(&cache),
            self.submitter,
            self.config.idle_backoff,
            shutdown.clone(),
        );
        handle.spawn("result-checker".into(), &self.dispatch, move || checker.run())?;

        let reporter = HashrateReporter::new(
            Arc::clone(&stats),
            self.config.hashrate_interval,
            shutdown.clone(),
        );
        handle.spawn("hashrate".into(), &self.dispatch, move || reporter.run())?;

        let orchestrator = Orchestrator::new(
            self.builder,
            self.source,
            slots,
            cache,
            OrchestratorSettings {
                check_interval: self.config.check_interval,
                churn_threshold: self.config.churn_threshold,
            },
            shutdown,
        );
        handle.spawn("orchestrator".into(), &self.dispatch, move || orchestrator.run())?;

        Ok(handle)
    }
}

/// A running engine.
///
/// Dropping the handle without calling [`MinerHandle::shutdown`] leaves
/// the threads running.
pub struct MinerHandle {
    shutdown: ShutdownSignal,
    threads: Vec<JoinHandle<()>>,
    stats: Arc<StatsArray>,
    cache: Arc<TemplateCache>,
}

impl MinerHandle {
    fn spawn(
        &mut self,
        name: String,
        dispatch: &Dispatch,
        body: impl FnOnce() + Send + 'static,
    ) -> Result<(), MinerError> {
        let dispatch = dispatch.clone();
        let spawned = thread::Builder::new()
            .name(name)
            .spawn(move || with_dispatch(&dispatch, body));

        match spawned {
            Ok(thread) => {
                self.threads.push(thread);
                Ok(())
            }
            Err(e) => {
                self.stop_and_join();
                Err(e.into())
            }
        }
    }

    /// Per-worker hash counters.
    pub fn stats(&self) -> &Arc<StatsArray> {
        &self.stats
    }

    /// Templates of the tasks published so far.
    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    /// A clone of the stop signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Join every thread. Returns once another holder of the signal has
    /// triggered it and all loops have exited.
    pub fn wait(mut self) {
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }

    /// Stop every loop and join all threads. In-flight search windows
    /// finish first.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.trigger();
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}
