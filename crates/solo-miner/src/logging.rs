//! Log dispatch construction.
//!
//! The engine never installs a global subscriber. It is handed a
//! [`Dispatch`] and installs it on each thread it spawns; tests pass
//! [`Dispatch::none`].

use tracing::Dispatch;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Dispatch writing to stderr, filtered by `RUST_LOG` (default `info`).
pub fn stderr_dispatch() -> Dispatch {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .finish();

    Dispatch::new(subscriber)
}

/// Run `f` with `dispatch` as the thread's default.
pub fn with_dispatch<T>(dispatch: &Dispatch, f: impl FnOnce() -> T) -> T {
    tracing::dispatcher::with_default(dispatch, f)
}
