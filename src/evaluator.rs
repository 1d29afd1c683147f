use crate::{
    client::{FetchError, StatusFetch},
    config::ChainConfig,
    reference::{Resolution, resolve_reference},
    store::VotingPowerStore,
};
use tracing::{error, info, warn};

/// Runs every health check for one chain and returns the alert messages
/// it produced, in detection order.
///
/// A failed local status fetch short-circuits the chain (no other check
/// is meaningful without a valid local read); every later check is
/// fail-soft, so one broken endpoint never hides the remaining checks
/// or the remaining chains. This function never returns an error.
pub async fn evaluate_chain(
    chain: &ChainConfig,
    client: &impl StatusFetch,
    store: &mut VotingPowerStore,
) -> Vec<String> {
    let mut messages = Vec::new();

    let status = match client.fetch_status(&chain.node_url).await {
        Ok(status) => status,
        Err(fetch_error) => {
            error!(
                chain = %chain.name,
                error = %fetch_error,
                "failed to fetch local node status"
            );
            messages.push(node_fetch_error_message(&chain.name, &fetch_error));
            return messages;
        }
    };

    if status.catching_up {
        warn!(chain = %chain.name, "node is syncing");
        messages.push(format!("Warning: {} node is syncing!", chain.name));
    }

    match resolve_reference(chain, status.latest_block_height, client).await {
        Resolution::Resolved(reference) => {
            let difference = status
                .latest_block_height
                .abs_diff(reference.latest_block_height);
            if difference > chain.block_height_margin {
                warn!(
                    chain = %chain.name,
                    local_height = status.latest_block_height,
                    reference_height = reference.latest_block_height,
                    difference,
                    "block height difference exceeds the margin"
                );
                messages.push(format!(
                    "Warning: Block height difference is too large for {}! (My node: {}, Reference node: {}, difference: {})",
                    chain.name,
                    status.latest_block_height,
                    reference.latest_block_height,
                    difference
                ));
            } else {
                info!(
                    chain = %chain.name,
                    local_height = status.latest_block_height,
                    reference_height = reference.latest_block_height,
                    "block height is within the margin"
                );
            }
        }
        Resolution::Unavailable(message) => messages.push(message),
    }

    if let Some(current) = status.voting_power {
        info!(chain = %chain.name, voting_power = current, "current voting power");
        let previous = store.previous_or(&chain.name, current);
        let change = current.abs_diff(previous);
        if change >= chain.voting_power_change_threshold {
            warn!(
                chain = %chain.name,
                current,
                previous,
                change,
                "voting power change detected"
            );
            messages.push(format!(
                "Info: Voting power change for {}! New voting power: {}, a change of: {:+}",
                chain.name,
                current,
                current - previous
            ));
        }
        // The stored value tracks the latest reading whether or not it
        // alerted.
        store.upsert(&chain.name, current);
    } else {
        error!(chain = %chain.name, "validator info not found in the status response");
    }

    match client.fetch_peer_count(&chain.node_url).await {
        Ok(peer_count) if peer_count < chain.min_peers => {
            warn!(
                chain = %chain.name,
                peer_count,
                min_peers = chain.min_peers,
                "peer count is below the minimum"
            );
            messages.push(format!(
                "Warning: The number of peers is too low for {}! (Current number of peers: {}, Minimum number of peers: {})",
                chain.name, peer_count, chain.min_peers
            ));
        }
        Ok(peer_count) => {
            info!(
                chain = %chain.name,
                peer_count,
                min_peers = chain.min_peers,
                "peer count is sufficient"
            );
        }
        Err(fetch_error) => {
            error!(
                chain = %chain.name,
                error = %fetch_error,
                "failed to fetch peer information"
            );
            messages.push(peer_fetch_error_message(&chain.name, &fetch_error));
        }
    }

    messages
}

fn node_fetch_error_message(chain_name: &str, error: &FetchError) -> String {
    match error {
        FetchError::Timeout => format!(
            "Error: Request timed out when connecting to the node API for {chain_name}."
        ),
        FetchError::Connection(_) => {
            format!("Error: Cannot connect to the node API for {chain_name}.")
        }
        FetchError::InvalidResponse(detail) => format!(
            "Error: Invalid response from the node API for {chain_name} ({detail})."
        ),
    }
}

fn peer_fetch_error_message(chain_name: &str, error: &FetchError) -> String {
    match error {
        FetchError::Timeout => format!(
            "Error: Request timed out when connecting to the net_info API for {chain_name}."
        ),
        FetchError::Connection(_) => {
            format!("Error: Cannot connect to the net_info API for {chain_name}.")
        }
        FetchError::InvalidResponse(detail) => format!(
            "Error: Cannot get peers information from the node API for {chain_name} ({detail})."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeStatus;
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::Mutex,
    };
    use tempfile::tempdir;

    enum Scripted {
        Status(NodeStatus),
        Failure(fn() -> FetchError),
    }

    #[derive(Default)]
    struct MockClient {
        statuses: HashMap<String, Scripted>,
        peer_counts: HashMap<String, Result<usize, fn() -> FetchError>>,
        fetched: Mutex<Vec<String>>,
    }

    impl MockClient {
        fn with_status(mut self, url: &str, status: NodeStatus) -> Self {
            self.statuses.insert(url.to_owned(), Scripted::Status(status));
            self
        }

        fn with_status_failure(mut self, url: &str, failure: fn() -> FetchError) -> Self {
            self.statuses.insert(url.to_owned(), Scripted::Failure(failure));
            self
        }

        fn with_peer_count(mut self, url: &str, peer_count: usize) -> Self {
            self.peer_counts.insert(url.to_owned(), Ok(peer_count));
            self
        }

        fn with_peer_failure(mut self, url: &str, failure: fn() -> FetchError) -> Self {
            self.peer_counts.insert(url.to_owned(), Err(failure));
            self
        }

        fn fetch_count(&self) -> usize {
            match self.fetched.lock() {
                Ok(guard) => guard.len(),
                Err(_) => 0,
            }
        }
    }

    #[async_trait]
    impl StatusFetch for MockClient {
        async fn fetch_status(&self, url: &str) -> Result<NodeStatus, FetchError> {
            if let Ok(mut guard) = self.fetched.lock() {
                guard.push(url.to_owned());
            }
            match self.statuses.get(url) {
                Some(Scripted::Status(status)) => Ok(status.clone()),
                Some(Scripted::Failure(failure)) => Err(failure()),
                None => Err(FetchError::Connection("unknown url".to_owned())),
            }
        }

        async fn fetch_peer_count(&self, url: &str) -> Result<usize, FetchError> {
            if let Ok(mut guard) = self.fetched.lock() {
                guard.push(format!("net_info:{url}"));
            }
            match self.peer_counts.get(url) {
                Some(Ok(peer_count)) => Ok(*peer_count),
                Some(Err(failure)) => Err(failure()),
                None => Err(FetchError::Connection("unknown url".to_owned())),
            }
        }
    }

    fn chain() -> ChainConfig {
        ChainConfig {
            name: "gaia-mainnet".to_owned(),
            node_url: "http://localhost:26657/status".to_owned(),
            reference_node_url: "https://ref.example.org/status".to_owned(),
            backup_reference_node_url: "https://backup.example.org/status".to_owned(),
            block_height_margin: 5,
            min_peers: 5,
            voting_power_change_threshold: 150,
            enabled: true,
        }
    }

    fn validator_status(height: u64, voting_power: i64) -> NodeStatus {
        NodeStatus {
            latest_block_height: height,
            catching_up: false,
            voting_power: Some(voting_power),
        }
    }

    fn reference_status(height: u64) -> NodeStatus {
        NodeStatus {
            latest_block_height: height,
            catching_up: false,
            voting_power: None,
        }
    }

    fn empty_store(dir: &tempfile::TempDir) -> VotingPowerStore {
        VotingPowerStore::load(dir.path().join("voting_power.json"))
    }

    #[tokio::test]
    async fn healthy_chain_produces_no_messages() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 100))
            .with_status(&chain.reference_node_url, reference_status(1003))
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert!(messages.is_empty());
        assert_eq!(store.get("gaia-mainnet"), Some(100));
    }

    #[tokio::test]
    async fn local_fetch_failure_short_circuits_the_chain() {
        let chain = chain();
        let client = MockClient::default().with_status_failure(&chain.node_url, || {
            FetchError::InvalidResponse("status code 500 Internal Server Error".to_owned())
        });
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert_eq!(messages.len(), 1);
        let message = match messages.first() {
            Some(message) => message,
            None => return,
        };
        assert!(message.contains("Invalid response from the node API for gaia-mainnet"));
        // Only the local status fetch happened: no reference, no peers.
        assert_eq!(client.fetch_count(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn timeout_on_the_local_node_names_the_failure_kind() {
        let chain = chain();
        let client =
            MockClient::default().with_status_failure(&chain.node_url, || FetchError::Timeout);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert_eq!(
            messages,
            vec![
                "Error: Request timed out when connecting to the node API for gaia-mainnet."
                    .to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn syncing_node_emits_a_warning_before_other_checks() {
        let chain = chain();
        let mut syncing = validator_status(1000, 100);
        syncing.catching_up = true;
        let client = MockClient::default()
            .with_status(&chain.node_url, syncing)
            .with_status(&chain.reference_node_url, reference_status(1000))
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert_eq!(messages, vec!["Warning: gaia-mainnet node is syncing!".to_owned()]);
    }

    #[tokio::test]
    async fn height_difference_within_the_margin_is_silent() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 100))
            .with_status(&chain.reference_node_url, reference_status(1005))
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn height_difference_beyond_the_margin_alerts_with_both_heights() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 100))
            .with_status(&chain.reference_node_url, reference_status(1006))
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert_eq!(messages.len(), 1);
        let message = match messages.first() {
            Some(message) => message,
            None => return,
        };
        assert!(message.contains("Block height difference is too large for gaia-mainnet"));
        assert!(message.contains("My node: 1000"));
        assert!(message.contains("Reference node: 1006"));
        assert!(message.contains("difference: 6"));
    }

    #[tokio::test]
    async fn unavailable_references_record_exactly_one_message() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 100))
            .with_status_failure(&chain.reference_node_url, || FetchError::Timeout)
            .with_status_failure(&chain.backup_reference_node_url, || {
                FetchError::Connection("refused".to_owned())
            })
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert_eq!(messages.len(), 1);
        let message = match messages.first() {
            Some(message) => message,
            None => return,
        };
        assert!(message.contains("Both the primary and backup reference nodes"));
    }

    #[tokio::test]
    async fn first_voting_power_observation_seeds_the_store_without_alerting() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 500))
            .with_status(&chain.reference_node_url, reference_status(1000))
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert!(messages.is_empty());
        assert_eq!(store.get("gaia-mainnet"), Some(500));
    }

    #[tokio::test]
    async fn voting_power_change_at_the_threshold_alerts_with_a_signed_delta() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 260))
            .with_status(&chain.reference_node_url, reference_status(1000))
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);
        store.upsert("gaia-mainnet", 100);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert_eq!(messages.len(), 1);
        let message = match messages.first() {
            Some(message) => message,
            None => return,
        };
        assert!(message.contains("Voting power change for gaia-mainnet"));
        assert!(message.contains("New voting power: 260"));
        assert!(message.contains("a change of: +160"));
        assert_eq!(store.get("gaia-mainnet"), Some(260));
    }

    #[tokio::test]
    async fn voting_power_drop_formats_a_negative_delta() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 100))
            .with_status(&chain.reference_node_url, reference_status(1000))
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);
        store.upsert("gaia-mainnet", 300);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert_eq!(messages.len(), 1);
        let message = match messages.first() {
            Some(message) => message,
            None => return,
        };
        assert!(message.contains("a change of: -200"));
        assert_eq!(store.get("gaia-mainnet"), Some(100));
    }

    #[tokio::test]
    async fn voting_power_change_below_the_threshold_still_updates_the_store() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 180))
            .with_status(&chain.reference_node_url, reference_status(1000))
            .with_peer_count(&chain.node_url, 8);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);
        store.upsert("gaia-mainnet", 100);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert!(messages.is_empty());
        assert_eq!(store.get("gaia-mainnet"), Some(180));
    }

    #[tokio::test]
    async fn low_peer_count_warns_with_current_and_minimum() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 100))
            .with_status(&chain.reference_node_url, reference_status(1000))
            .with_peer_count(&chain.node_url, 3);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        assert_eq!(messages.len(), 1);
        let message = match messages.first() {
            Some(message) => message,
            None => return,
        };
        assert!(message.contains("The number of peers is too low for gaia-mainnet"));
        assert!(message.contains("Current number of peers: 3"));
        assert!(message.contains("Minimum number of peers: 5"));
    }

    #[tokio::test]
    async fn peer_fetch_failure_is_reported_but_does_not_hide_other_checks() {
        let chain = chain();
        let client = MockClient::default()
            .with_status(&chain.node_url, validator_status(1000, 100))
            .with_status(&chain.reference_node_url, reference_status(1006))
            .with_peer_failure(&chain.node_url, || FetchError::Timeout);
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut store = empty_store(&dir);

        let messages = evaluate_chain(&chain, &client, &mut store).await;

        // Height alert first, then the peer fetch error.
        assert_eq!(messages.len(), 2);
        let last = match messages.last() {
            Some(message) => message,
            None => return,
        };
        assert!(last.contains("net_info API for gaia-mainnet"));
    }
}
