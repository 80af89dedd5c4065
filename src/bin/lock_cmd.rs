//! Lock Command Utility
//!
//! Sends a lock action to a smartlock and/or dumps its recent activity log
//! with decoded trigger and state descriptions. Useful for verifying API
//! credentials and watching how the lock reports keypad entries.

use anyhow::Context;
use clap::Parser;
use lockwatch::domain::types::{
    state_description, LockAction, LockDeviceState, TRIGGER_KEYPAD, TRIGGER_MANUAL,
};
use lockwatch::io::NukiApi;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "lock-cmd", about = "Nuki smartlock command utility")]
struct Args {
    /// Nuki Web API token
    #[arg(long)]
    token: String,

    /// API base URL
    #[arg(long, default_value = "https://api.nuki.io")]
    base_url: String,

    /// Smartlock ID (omit to list all locks)
    #[arg(long)]
    lock: Option<i64>,

    /// Action to send: unlock, lock, unlatch, lock_n_go, lock_n_go_with_unlatch
    #[arg(long)]
    action: Option<LockAction>,

    /// Dump this many recent log entries
    #[arg(long, default_value = "10")]
    log: u32,
}

fn trigger_name(trigger: i64) -> &'static str {
    match trigger {
        0 => "web/api",
        TRIGGER_MANUAL => "manual",
        2 => "button",
        3 => "automatic",
        4 => "keypad",
        TRIGGER_KEYPAD => "keypad_user",
        _ => "unknown",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let api = NukiApi::new(&args.base_url, &args.token, Duration::from_secs(15))?;
    api.test_connection().await.context("API connection test failed")?;

    let Some(lock_id) = args.lock else {
        let locks = api.list_smartlocks().await?;
        println!("Found {} smartlock(s):", locks.len());
        for lock in locks {
            let state = LockDeviceState::from_code(lock.state.state);
            println!("  {} - {} ({})", lock.smartlock_id, lock.name, state.as_str());
        }
        return Ok(());
    };

    if let Some(action) = args.action {
        println!("Sending {:?} (action {}) to lock {}", action, action.code(), lock_id);
        api.send_action(lock_id, action.code()).await?;
        println!("Action accepted");
    }

    let records = api.smartlock_log(lock_id, args.log).await?;
    println!("Last {} log entries for lock {}:", records.len(), lock_id);
    for (i, record) in records.iter().enumerate() {
        println!(
            "  {:2}. {} trigger={}({}) source={} action={} state={} ({}) name={:?} authId={:?}",
            i,
            record.date,
            record.trigger,
            trigger_name(record.trigger),
            record.source,
            record.action,
            record.state,
            state_description(record.state),
            record.name,
            record.auth_id,
        );
    }

    Ok(())
}
