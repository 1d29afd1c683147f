use crate::{
    alerter::{AlertError, Notifier},
    client::StatusFetch,
    config::AppConfig,
    evaluator::evaluate_chain,
    store::VotingPowerStore,
};
use tracing::{debug, error, info};

/// What one pass over the configured chains produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub chains_checked: usize,
    pub alert_count: usize,
    pub notified: bool,
}

/// One full pass: evaluate every enabled chain in configuration order,
/// persist the voting power store, then deliver the aggregated report.
///
/// The store write happens unconditionally, even when every chain
/// evaluation produced only errors, and a write failure is logged
/// rather than propagated. A notification failure is the one error that
/// reaches the caller; silent notification loss would defeat the tool.
pub async fn run_pass(
    config: &AppConfig,
    client: &impl StatusFetch,
    store: &mut VotingPowerStore,
    notifier: &impl Notifier,
) -> Result<RunSummary, AlertError> {
    let mut report = Vec::new();
    let mut chains_checked = 0;

    for chain in &config.chains {
        if !chain.enabled {
            debug!(chain = %chain.name, "chain is disabled, skipping");
            continue;
        }
        chains_checked += 1;
        report.extend(evaluate_chain(chain, client, store).await);
    }

    if let Err(store_error) = store.persist() {
        error!(error = %store_error, "failed to persist voting power state");
    }

    let alert_count = report.len();
    let notified = if report.is_empty() {
        debug!(chains_checked, "no alerts this run");
        false
    } else {
        notifier.send_report(&report.join("\n")).await?;
        info!(chains_checked, alert_count, "alert report delivered");
        true
    };

    Ok(RunSummary {
        chains_checked,
        alert_count,
        notified,
    })
}
