//! CLI demo for the bank-account example.
//!
//! Walks through opening an account, depositing and withdrawing, a no-op
//! command, and a `start-from: latest` subscription, the same scenarios
//! exercised by `tests/scenarios.rs`, narrated for a human reading the
//! terminal.

use bank_account::{new_account_id, registry, AGGREGATE};
use eventide_core::log::StartFrom;
use eventide_core::registry::SubscriptionConfig;
use eventide_runtime::{app, dispatcher};
use eventide_testing::InMemoryEventLog;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Bank Account Demo ===\n");

    let deposits_seen = Arc::new(AtomicUsize::new(0));
    let counted = deposits_seen.clone();

    let mut registry = registry();
    registry.define_subscription(
        "money-deposited",
        SubscriptionConfig {
            subscriber_name: "deposit-notify".to_string(),
            event_name: "money-deposited".to_string(),
            start_from: StartFrom::Latest,
            handler: Arc::new(move |data| {
                let counted = counted.clone();
                let amount = data.get("amount").cloned().unwrap_or(json!(0.0));
                Box::pin(async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    println!("  [deposit-notify] ${amount} landed");
                    Ok(())
                })
            }),
            stream_filter: None,
        },
    );

    let event_log: Arc<dyn eventide_core::log::EventLog> = Arc::new(InMemoryEventLog::new());
    let application = app::start_application("bank-shop", registry, event_log).await?;

    println!("Opening an account...");
    let account_id = new_account_id();
    dispatcher::dispatch(
        &application,
        "open-account",
        json!({"account_id": account_id, "account_type": "checking"}),
    )
    .await?;

    let state = dispatcher::get_aggregate(&application, AGGREGATE, json!(account_id)).await?;
    println!("  account {account_id}: {state}");

    println!("\nDepositing $200...");
    dispatcher::dispatch(
        &application,
        "deposit-money",
        json!({"account_id": account_id, "amount": 200.0}),
    )
    .await?;
    let state = dispatcher::get_aggregate(&application, AGGREGATE, json!(account_id)).await?;
    println!("  account {account_id}: {state}");

    println!("\nWithdrawing $50...");
    dispatcher::dispatch(
        &application,
        "withdraw-money",
        json!({"account_id": account_id, "amount": 50.0}),
    )
    .await?;
    let state = dispatcher::get_aggregate(&application, AGGREGATE, json!(account_id)).await?;
    println!("  account {account_id}: {state}");

    println!("\nChanging account type to \"checking\" (already checking, should no-op)...");
    let events = dispatcher::dispatch(
        &application,
        "change-account-type",
        json!({"account_id": account_id, "account_type": "checking"}),
    )
    .await?;
    println!("  events emitted: {}", events.len());

    println!("\nAttempting to withdraw $10,000 (far more than the balance)...");
    match dispatcher::dispatch(
        &application,
        "withdraw-money",
        json!({"account_id": account_id, "amount": 10_000.0}),
    )
    .await
    {
        Ok(_) => println!("  unexpectedly succeeded"),
        Err(err) => println!("  rejected, as expected: {err}"),
    }

    println!(
        "\ndeposit-notify saw {} deposit(s) since the application started.",
        deposits_seen.load(Ordering::SeqCst)
    );

    app::stop_application(&application);
    println!("\n=== Demo Complete ===");
    Ok(())
}
