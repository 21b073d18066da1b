// Demo CLI for the rewards ledger: exercises every operation against a
// local data dir. Not a service; the real surfaces are the handler APIs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use spinledger::api::handler::RewardsHandler;
use spinledger::api::types::{BalanceMutationRequest, GrantPackRequest};
use spinledger::audit_log::AuditEvent;
use spinledger::common_utils::get_current_timestamp_ms;
use spinledger::configure::load_config;
use spinledger::logger::setup_logger;
use spinledger::pack_registry::hours_to_ms;

#[derive(Parser)]
#[command(name = "spinledger_demo", about = "Rewards ledger demo CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Credit currency to an account
    Credit {
        account_id: u64,
        amount: u64,
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "promo_grant")]
        reason: String,
    },
    /// Debit currency from an account
    Debit {
        account_id: u64,
        amount: u64,
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "purchase")]
        reason: String,
    },
    /// Show an account's balance
    Balance { account_id: u64 },
    /// Grant a bonus spin pack
    Grant {
        account_id: u64,
        spins: u32,
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
    /// Show available spins at a business
    Available { account_id: u64, business_id: u64 },
    /// Consume one spin at a business
    Spin { account_id: u64, business_id: u64 },
    /// Print audit history for the last N hours
    History {
        account_id: u64,
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Run the pack expiry sweep
    Sweep,
}

fn main() -> Result<()> {
    let config = load_config().context("load config")?;
    setup_logger(&config).map_err(|e| anyhow::anyhow!("logger init: {}", e))?;

    let handler = RewardsHandler::open(&config).context("open ledger")?;
    let cli = Cli::parse();

    match cli.command {
        Command::Credit { account_id, amount, key, reason } => {
            let resp = handler.credit(BalanceMutationRequest {
                account_id,
                amount,
                idempotency_key: key,
                reason,
            })?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::Debit { account_id, amount, key, reason } => {
            let resp = handler.debit(BalanceMutationRequest {
                account_id,
                amount,
                idempotency_key: key,
                reason,
            })?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::Balance { account_id } => {
            let resp = handler.get_balance(account_id)?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::Grant { account_id, spins, ttl_hours } => {
            let resp = handler.grant_pack(GrantPackRequest {
                account_id,
                spins_granted: spins,
                ttl_ms: hours_to_ms(ttl_hours),
            })?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::Available { account_id, business_id } => {
            let resp = handler.get_available_spins(account_id, business_id)?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::Spin { account_id, business_id } => {
            let resp = handler.consume_spin(account_id, business_id)?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::History { account_id, hours } => {
            let now = get_current_timestamp_ms();
            let from = now - hours_to_ms(hours);
            for event in handler.audit.history(account_id, from, now + 1)? {
                match event? {
                    AuditEvent::Ledger(e) => println!(
                        "{} ledger   {:>8} {} -> {} ({})",
                        e.timestamp_ms,
                        e.delta,
                        e.reason.as_str(),
                        e.resulting_balance,
                        e.idempotency_key
                    ),
                    AuditEvent::Consumption(e) => println!(
                        "{} spin     business={} used={} pack={:?}",
                        e.timestamp_ms, e.business_id, e.spins_used_after, e.drew_pack
                    ),
                }
            }
        }
        Command::Sweep => {
            let now = get_current_timestamp_ms();
            let updated = handler.packs.expire_sweep(now)?;
            let cutoff = now - hours_to_ms(config.idempotency_retention_hours as i64);
            let removed = handler.store.gc_idempotency(cutoff)?;
            println!("refreshed {} pack statuses, removed {} idempotency records", updated, removed);
        }
    }

    Ok(())
}
