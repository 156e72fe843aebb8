use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use solo_core::HeaderBuilder;
use solo_miner::logging::{stderr_dispatch, with_dispatch};
use solo_miner::{Miner, MinerConfig, RpcClient};
use tracing::info;

fn main() -> Result<()> {
    let config = MinerConfig::parse();
    let dispatch = stderr_dispatch();

    let engine = config.engine().context("invalid engine configuration")?;
    let builder = HeaderBuilder::for_address(&config.address)
        .with_context(|| format!("cannot pay to {}", config.address))?;
    let rpc = Arc::new(RpcClient::new(config.rpc()).context("failed to create RPC client")?);

    with_dispatch(&dispatch, || {
        info!(
            url = rpc.url(),
            address = %config.address,
            class = builder.coinbase_builder().payout().class.name(),
            "connecting to node"
        );
    });

    let handle = Miner::new(engine, builder, rpc.clone(), rpc)?
        .with_dispatch(dispatch)
        .start()
        .context("failed to start miner")?;

    // Runs until the process is terminated.
    handle.wait();
    Ok(())
}
