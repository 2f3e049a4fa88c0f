//! Otter Flow command-line client
//!
//! Browse tranche pools, manage vault positions and run the issuer and
//! verifier consoles against a JSON-RPC node.

mod config;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use otter_sdk::{
    calculator, CallContext, ContractCall, Dashboard, EventWatcher, Notifier, RpcChainClient, TransactionLog,
};
use otter_types::{Address, Pool, Tranche};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::OtterConfig;
use crate::output::ConsoleNotifier;

#[derive(Parser)]
#[command(name = "otter")]
#[command(about = "Otter Flow tranche protocol client")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "otter.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Override the wallet account
    #[arg(long)]
    account: Option<Address>,

    /// Override the RPC endpoint
    #[arg(long)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum TrancheArg {
    Senior,
    Junior,
}

impl From<TrancheArg> for Tranche {
    fn from(arg: TrancheArg) -> Self {
        match arg {
            TrancheArg::Senior => Tranche::Senior,
            TrancheArg::Junior => Tranche::Junior,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List every pool in the registry
    Pools,
    /// Show one pool
    Pool { id: u64 },
    /// Show the roles of the connected account
    Roles,
    /// Show the connected account's position in one tranche
    Position {
        pool: u64,
        #[arg(value_enum)]
        tranche: TrancheArg,
    },
    /// Every non-empty position across active pools
    Portfolio,
    /// Settlement token balance of the connected account
    Balance,
    /// Mint test settlement tokens to the connected account
    Faucet {
        #[arg(default_value = "1000")]
        amount: String,
    },
    /// Approve a tranche vault to pull settlement tokens
    Approve {
        pool: u64,
        #[arg(value_enum)]
        tranche: TrancheArg,
        amount: String,
    },
    /// Deposit into a tranche vault
    Deposit {
        pool: u64,
        #[arg(value_enum)]
        tranche: TrancheArg,
        amount: String,
        /// Approve first when the allowance is short
        #[arg(long)]
        approve: bool,
    },
    /// Redeem vault shares
    Withdraw {
        pool: u64,
        #[arg(value_enum)]
        tranche: TrancheArg,
        shares: String,
    },
    /// Claim pending rewards
    Harvest {
        pool: u64,
        #[arg(value_enum)]
        tranche: TrancheArg,
    },
    /// Issuer console: propose a new pool
    Propose {
        metadata_cid: String,
        #[arg(long, default_value_t = 2_592_000)]
        epoch_seconds: u64,
        /// Unix seconds; defaults to now
        #[arg(long)]
        start_time: Option<u64>,
        #[arg(long, default_value_t = 7000)]
        senior_split_bps: u16,
    },
    /// Verifier console: activate a pending pool
    Activate { pool: u64 },
    /// Verifier console: reject a pending pool
    Reject { pool: u64 },
    /// Verifier console: post epoch revenue to the oracle
    PostRevenue { pool: u64, epoch: u64, amount: String },
    /// Verifier console: move epoch revenue into escrow
    DepositRevenue {
        pool: u64,
        epoch: u64,
        amount: String,
        /// Approve the escrow first when the allowance is short
        #[arg(long)]
        approve: bool,
    },
    /// Verifier console: distribute escrowed revenue to the vaults
    Distribute { pool: u64, epoch: u64 },
    /// Revenue pipeline of one epoch; defaults to the current epoch
    Epoch { pool: u64, epoch: Option<u64> },
    /// Local transaction history
    History {
        #[arg(long)]
        clear: bool,
    },
    /// Follow protocol events
    Watch {
        /// First block to scan; defaults to the current head
        #[arg(long)]
        from_block: Option<u64>,
    },
    /// Project earnings for a deposit
    Calc {
        amount: f64,
        #[arg(value_enum, default_value = "senior")]
        tranche: TrancheArg,
        /// APY percentage; defaults to the tranche's advertised rate
        #[arg(long)]
        apy: Option<f64>,
        #[arg(long, default_value_t = 12)]
        months: u32,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = OtterConfig::load(&cli.config)?;
    if let Some(log_level) = cli.log_level {
        config.logging.level = log_level;
    }
    if let Some(account) = cli.account {
        config.wallet.account = Some(account);
    }
    if let Some(rpc_url) = cli.rpc_url {
        config.network.rpc_url = rpc_url;
    }

    init_logging(&config)?;
    config.validate()?;

    match cli.command {
        Command::Calc { amount, tranche, apy, months } => {
            let apy = apy.unwrap_or_else(|| calculator::default_apy(tranche.into()));
            output::print_projection(&calculator::project(amount, apy, months)?);
            return Ok(());
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            return Ok(());
        }
        _ => {}
    }

    let network = config.network();
    info!("Using {} (chain {}) at {}", network.name, network.chain_id, network.rpc_url);

    let client = Arc::new(RpcChainClient::new(network.rpc_url.clone(), config.contracts)?);
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
    let log = match TransactionLog::open(&config.history.path).await {
        Ok(log) => log,
        Err(e) => {
            warn!("Transaction history unavailable ({}); keeping it in memory for this run", e);
            TransactionLog::in_memory()
        }
    };
    let dashboard = Dashboard::new(
        client.clone(),
        client,
        notifier.clone(),
        log,
        network,
        config.dispatch_config(),
    );

    if let Some(account) = config.wallet.account {
        dashboard.connect(account).await;
    }

    run(cli.command, &dashboard, &config, notifier).await
}

async fn run(command: Command, dashboard: &Dashboard, config: &OtterConfig, notifier: Arc<dyn Notifier>) -> Result<()> {
    match command {
        Command::Pools => output::print_pools(&dashboard.pools().await?),
        Command::Pool { id } => output::print_pool(&dashboard.pool(id).await?),
        Command::Roles => output::print_roles(&dashboard.session().snapshot()),
        Command::Position { pool, tranche } => {
            let (pool, vault) = tranche_vault(dashboard, pool, tranche.into()).await?;
            let position = dashboard.position(Some(vault)).await;
            output::print_position(&pool, tranche.into(), &position);
        }
        Command::Portfolio => output::print_portfolio(&dashboard.portfolio().await?),
        Command::Balance => {
            let balance = dashboard.token_balance().await?;
            println!("{} {}", balance, otter_types::SETTLEMENT_SYMBOL);
        }
        Command::Faucet { amount } => {
            let account = dashboard.account().ok_or_else(|| anyhow!("No wallet connected"))?;
            dashboard.execute(ContractCall::mint(account, &amount)?, None).await?;
        }
        Command::Approve { pool, tranche, amount } => {
            let (pool, vault) = tranche_vault(dashboard, pool, tranche.into()).await?;
            let context = CallContext::tranche(&pool, tranche.into());
            dashboard.execute(ContractCall::approve(vault, &amount)?, Some(context)).await?;
        }
        Command::Deposit { pool, tranche, amount, approve } => {
            let (pool, vault) = tranche_vault(dashboard, pool, tranche.into()).await?;
            let call = ContractCall::deposit(vault, &amount)?;
            let context = CallContext::tranche(&pool, tranche.into());
            if dashboard.needs_approval(vault, &amount).await? {
                if !approve {
                    return Err(anyhow!("Allowance is below {}; approve first or pass --approve", amount));
                }
                dashboard
                    .execute(ContractCall::approve(vault, &amount)?, Some(context.clone()))
                    .await?;
            }
            dashboard.execute(call, Some(context)).await?;
        }
        Command::Withdraw { pool, tranche, shares } => {
            let (pool, vault) = tranche_vault(dashboard, pool, tranche.into()).await?;
            let context = CallContext::tranche(&pool, tranche.into());
            dashboard.execute(ContractCall::withdraw(vault, &shares)?, Some(context)).await?;
        }
        Command::Harvest { pool, tranche } => {
            let (pool, vault) = tranche_vault(dashboard, pool, tranche.into()).await?;
            let context = CallContext::tranche(&pool, tranche.into());
            dashboard.execute(ContractCall::harvest(vault)?, Some(context)).await?;
        }
        Command::Propose { metadata_cid, epoch_seconds, start_time, senior_split_bps } => {
            let start_time = start_time.unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64);
            let call = ContractCall::propose_pool(&metadata_cid, epoch_seconds, start_time, senior_split_bps)?;
            dashboard.execute(call, None).await?;
        }
        Command::Activate { pool } => {
            dashboard.execute(ContractCall::activate_pool(pool)?, None).await?;
        }
        Command::Reject { pool } => {
            dashboard.execute(ContractCall::reject_pool(pool)?, None).await?;
        }
        Command::PostRevenue { pool, epoch, amount } => {
            dashboard.execute(ContractCall::post_revenue(pool, epoch, &amount)?, None).await?;
        }
        Command::DepositRevenue { pool, epoch, amount, approve } => {
            let call = ContractCall::deposit_revenue(pool, epoch, &amount)?;
            let escrow = config.contracts.revenue_escrow;
            if dashboard.needs_approval(escrow, &amount).await? {
                if !approve {
                    return Err(anyhow!("Escrow allowance is below {}; approve first or pass --approve", amount));
                }
                dashboard.execute(ContractCall::approve(escrow, &amount)?, None).await?;
            }
            dashboard.execute(call, None).await?;
        }
        Command::Distribute { pool, epoch } => {
            dashboard.execute(ContractCall::distribute(pool, epoch)?, None).await?;
        }
        Command::Epoch { pool, epoch } => {
            let epoch = match epoch {
                Some(epoch) => epoch,
                None => {
                    let now = chrono::Utc::now().timestamp().max(0) as u64;
                    let pool = dashboard.pool(pool).await?;
                    pool.epoch_at(now)
                        .ok_or_else(|| anyhow!("{} has not started yet", pool.name))?
                }
            };
            output::print_epoch(&dashboard.epoch_progress(pool, epoch).await?);
        }
        Command::History { clear } => {
            if clear {
                dashboard.log().clear().await?;
                println!("Transaction history cleared");
            } else {
                output::print_history(&dashboard.log().records().await);
            }
        }
        Command::Watch { from_block } => watch(dashboard, config, notifier, from_block).await?,
        Command::Calc { .. } | Command::Config => {}
    }
    Ok(())
}

/// Pool `pool_id` and its `tranche` vault; errors while the vault is unset
async fn tranche_vault(dashboard: &Dashboard, pool_id: u64, tranche: Tranche) -> Result<(Pool, Address)> {
    let pool = dashboard.pool(pool_id).await?;
    let vault = pool
        .vault(tranche)
        .ok_or_else(|| anyhow!("{} has no {} vault yet ({})", pool.name, tranche, pool.status))?;
    Ok((pool, vault))
}

async fn watch(
    dashboard: &Dashboard,
    config: &OtterConfig,
    notifier: Arc<dyn Notifier>,
    from_block: Option<u64>,
) -> Result<()> {
    let reader = dashboard.reader();
    let from_block = match from_block {
        Some(block) => block,
        None => reader.block_number().await?,
    };

    let mut addresses = vec![config.contracts.asset_registry, config.contracts.yield_distributor];
    match dashboard.pools().await {
        Ok(pools) => {
            for pool in pools {
                addresses.extend([pool.senior_vault, pool.junior_vault].into_iter().filter(|v| !v.is_zero()));
            }
        }
        Err(e) => warn!("Could not list pools, watching registry and distributor only: {}", e),
    }

    let watcher = Arc::new(EventWatcher::new(
        reader,
        notifier,
        addresses,
        from_block,
        config.event_poll_interval(),
    ));
    let mut events = watcher.spawn(64);

    info!("Watching from block {}. Press Ctrl+C to stop.", from_block);
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(event) => output::print_event(&event),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

fn init_logging(config: &OtterConfig) -> Result<()> {
    let log_level = config.logging.level.parse().unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("otter_cli={},otter_sdk={}", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
