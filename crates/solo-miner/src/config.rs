//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::rpc::RpcSettings;

/// Sleep used by workers and the result checker while idle.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(50);

/// Default nonces per search window.
pub const DEFAULT_CHUNK_SIZE: u64 = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("chunk size must be at least 1")]
    EmptyChunk,
    #[error("{0} interval must be non-zero")]
    ZeroInterval(&'static str),
}

/// Solo miner for bitcoind's getblocktemplate.
#[derive(Debug, Clone, Parser)]
#[command(name = "solo-miner", version, about, long_about = None)]
pub struct MinerConfig {
    /// Node JSON-RPC endpoint
    #[arg(long, env = "SOLO_MINER_RPC_URL", default_value = "http://127.0.0.1:8332")]
    pub rpc_url: String,

    /// RPC user name
    #[arg(short = 'u', long, env = "SOLO_MINER_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password
    #[arg(short = 'p', long, env = "SOLO_MINER_RPC_PASSWORD", hide_env_values = true)]
    pub rpc_password: Option<String>,

    /// Payout address (1..., 3... or bc1q...)
    #[arg(short, long, env = "SOLO_MINER_ADDRESS")]
    pub address: String,

    /// Number of search threads [default: logical CPUs]
    #[arg(short, long, env = "SOLO_MINER_WORKERS")]
    pub workers: Option<usize>,

    /// Nonces hashed per search window
    #[arg(long, env = "SOLO_MINER_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Seconds between template fetches
    #[arg(long, env = "SOLO_MINER_CHECK_INTERVAL", default_value_t = 5)]
    pub check_interval: u64,

    /// Seconds between hashrate reports
    #[arg(long, env = "SOLO_MINER_HASHRATE_INTERVAL", default_value_t = 10)]
    pub hashrate_interval: u64,

    /// Mempool transaction-count change that forces new work at the same height
    #[arg(long, env = "SOLO_MINER_CHURN_THRESHOLD", default_value_t = 10)]
    pub churn_threshold: usize,

    /// RPC request timeout in seconds
    #[arg(long, env = "SOLO_MINER_RPC_TIMEOUT", default_value_t = 30)]
    pub rpc_timeout: u64,
}

impl MinerConfig {
    /// Engine settings, validated.
    pub fn engine(&self) -> Result<EngineConfig, ConfigError> {
        let config = EngineConfig {
            workers: self.workers.unwrap_or_else(num_cpus::get),
            chunk_size: self.chunk_size,
            check_interval: Duration::from_secs(self.check_interval),
            hashrate_interval: Duration::from_secs(self.hashrate_interval),
            churn_threshold: self.churn_threshold,
            idle_backoff: IDLE_BACKOFF,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn rpc(&self) -> RpcSettings {
        RpcSettings {
            url: self.rpc_url.clone(),
            user: self.rpc_user.clone(),
            password: self.rpc_password.clone(),
            timeout: Duration::from_secs(self.rpc_timeout),
        }
    }
}

/// Settings the engine runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub workers: usize,
    pub chunk_size: u64,
    pub check_interval: Duration,
    pub hashrate_interval: Duration,
    pub churn_threshold: usize,
    pub idle_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: num_cpus::get(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            check_interval: Duration::from_secs(5),
            hashrate_interval: Duration::from_secs(10),
            churn_threshold: 10,
            idle_backoff: IDLE_BACKOFF,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::EmptyChunk);
        }
        if self.check_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("check"));
        }
        if self.hashrate_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("hashrate"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    #[test]
    fn test_defaults() {
        let config = MinerConfig::try_parse_from(["solo-miner", "--address", ADDRESS]).unwrap();
        assert_eq!(config.rpc_url, "http://127.0.0.1:8332");
        assert_eq!(config.chunk_size, 1 << 20);
        assert_eq!(config.churn_threshold, 10);

        let engine = config.engine().unwrap();
        assert!(engine.workers >= 1);
        assert_eq!(engine.check_interval, Duration::from_secs(5));
        assert_eq!(engine.hashrate_interval, Duration::from_secs(10));
        assert_eq!(engine.idle_backoff, Duration::from_millis(50));

        let rpc = config.rpc();
        assert_eq!(rpc.timeout, Duration::from_secs(30));
        assert_eq!(rpc.user, None);
    }

    #[test]
    fn test_flags() {
        let config = MinerConfig::try_parse_from([
            "solo-miner",
            "--address",
            ADDRESS,
            "--workers",
            "3",
            "--chunk-size",
            "4096",
            "-u",
            "alice",
            "-p",
            "secret",
            "--churn-threshold",
            "25",
        ])
        .unwrap();

        let engine = config.engine().unwrap();
        assert_eq!(engine.workers, 3);
        assert_eq!(engine.chunk_size, 4096);
        assert_eq!(engine.churn_threshold, 25);
        assert_eq!(config.rpc().user.as_deref(), Some("alice"));
        assert_eq!(config.rpc().password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_address_is_required() {
        assert!(MinerConfig::try_parse_from(["solo-miner"]).is_err());
    }

    #[test]
    fn test_validation() {
        let zero_workers = MinerConfig::try_parse_from([
            "solo-miner",
            "--address",
            ADDRESS,
            "--workers",
            "0",
        ])
        .unwrap();
        assert_eq!(zero_workers.engine(), Err(ConfigError::NoWorkers));

        let zero_chunk = MinerConfig::try_parse_from([
            "solo-miner",
            "--address",
            ADDRESS,
            "--chunk-size",
            "0",
        ])
        .unwrap();
        assert_eq!(zero_chunk.engine(), Err(ConfigError::EmptyChunk));

        let config = EngineConfig {
            check_interval: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval("check")));
    }
}
