//! Terminal rendering

use chrono::{TimeZone, Utc};
use otter_sdk::{EpochProgress, Notice, NoticeLevel, Notifier, ObservedEvent, PortfolioEntry, Projection};
use otter_types::{Pool, RoleSnapshot, TransactionRecord, Tranche, VaultPosition, SETTLEMENT_SYMBOL};
use tracing::debug;

/// Prints notices to stdout as they arrive
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let marker = match notice.level {
            NoticeLevel::Success => "✓",
            NoticeLevel::Info => "•",
            NoticeLevel::Error => "✗",
        };
        println!("{} {}", marker, notice.title);
        if let Some(description) = &notice.description {
            println!("  {}", description);
        }
        if let Some(link) = &notice.link {
            println!("  {}", link);
        }
        debug!(level = ?notice.level, "notice shown: {}", notice.title);
    }
}

fn percent(bps: u16) -> String {
    let whole = bps / 100;
    match bps % 100 {
        0 => format!("{}%", whole),
        frac => format!("{}.{:02}%", whole, frac),
    }
}

fn vault_label(pool: &Pool, tranche: Tranche) -> String {
    pool.vault(tranche)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "not created".to_string())
}

pub fn print_pools(pools: &[Pool]) {
    if pools.is_empty() {
        println!("No pools found");
        return;
    }
    println!("{:<5} {:<18} {:<9} {:>8} {:>8}  {}", "ID", "NAME", "STATUS", "SENIOR", "JUNIOR", "ISSUER");
    for pool in pools {
        println!(
            "{:<5} {:<18} {:<9} {:>8} {:>8}  {}",
            pool.id,
            pool.name,
            pool.status,
            percent(pool.senior_split_bps),
            percent(pool.junior_split_bps()),
            pool.issuer.short()
        );
    }
}

pub fn print_pool(pool: &Pool) {
    println!("{} ({})", pool.name, pool.status);
    println!("  issuer        {}", pool.issuer);
    println!("  metadata      {}", pool.metadata_cid);
    println!("  epoch length  {}s", pool.epoch_seconds);
    println!("  start time    {}", timestamp(pool.start_time as i64 * 1000));
    println!(
        "  split         {} {} / {} {}",
        Tranche::Senior.product_name(),
        percent(pool.senior_split_bps),
        Tranche::Junior.product_name(),
        percent(pool.junior_split_bps())
    );
    println!("  senior vault  {}", vault_label(pool, Tranche::Senior));
    println!("  junior vault  {}", vault_label(pool, Tranche::Junior));
}

pub fn print_roles(snapshot: &RoleSnapshot) {
    let Some(address) = snapshot.address else {
        println!("No wallet connected");
        return;
    };
    let caps = snapshot.capabilities;
    let badge = caps.badge().map(|b| b.to_string()).unwrap_or_else(|| "none".to_string());
    println!("{}  role: {}", address, badge);
    println!("  admin     {}", caps.is_admin);
    println!("  verifier  {}", caps.is_verifier);
    println!("  issuer    {}", caps.is_issuer);
}

pub fn print_position(pool: &Pool, tranche: Tranche, position: &VaultPosition) {
    println!("{} {} ({})", pool.name, tranche.product_name(), tranche);
    println!("  shares           {}", position.shares);
    println!("  pending rewards  {} {}", position.pending_rewards, SETTLEMENT_SYMBOL);
    println!("  vault assets     {} {}", position.total_assets, SETTLEMENT_SYMBOL);
}

pub fn print_portfolio(entries: &[PortfolioEntry]) {
    if entries.is_empty() {
        println!("No positions");
        return;
    }
    for entry in entries {
        print_position(&entry.pool, entry.tranche, &entry.position);
    }
}

pub fn print_epoch(progress: &EpochProgress) {
    println!("Pool #{} epoch {}: {}", progress.pool_id, progress.epoch, progress.stage());
    println!("  posted       {} {}", progress.posted, SETTLEMENT_SYMBOL);
    println!("  escrowed     {} {}", progress.escrowed, SETTLEMENT_SYMBOL);
    println!("  distributed  {}", progress.distributed);
}

pub fn print_history(records: &[TransactionRecord]) {
    if records.is_empty() {
        println!("No transactions");
        return;
    }
    for record in records {
        let pool = match (&record.pool_name, record.tranche) {
            (Some(name), Some(tranche)) => format!("{} {}", name, tranche),
            (Some(name), None) => name.clone(),
            _ => String::new(),
        };
        println!(
            "{}  {:<8} {:>14} {:<9} {:<24} {}",
            timestamp(record.timestamp_ms),
            record.kind,
            record.amount,
            format!("{:?}", record.status).to_lowercase(),
            pool,
            record.reference
        );
    }
}

pub fn print_event(observed: &ObservedEvent) {
    let tx = observed
        .tx_hash
        .map(|h| h.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("[block {}] {:?} ({})", observed.block_number, observed.event, tx);
}

pub fn print_projection(projection: &Projection) {
    println!(
        "{:.2} {} at {:.2}% APY for {} months",
        projection.deposit, SETTLEMENT_SYMBOL, projection.apy_percent, projection.months
    );
    println!("  final amount    {:.2}", projection.final_amount);
    println!("  total earnings  {:.2}", projection.total_earnings);
    println!("  per month       {:.2}", projection.monthly_earnings);
    println!("  per day         {:.4}", projection.daily_earnings);
}

fn timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}
