use crate::{
    client::StatusFetch,
    config::ChainConfig,
    models::NodeStatus,
};
use tracing::{info, warn};

/// Outcome of reference selection for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(NodeStatus),
    /// Every candidate was rejected; carries the single alert message
    /// recorded for the chain.
    Unavailable(String),
}

/// Picks the authoritative reference for a height comparison.
///
/// Candidates are tried in order (primary, then backup) and accepted
/// only when not catching up and at least at the local node's height; a
/// reference even one block behind would mask real lag on the monitored
/// node. Equal height is acceptable. Each rejection logs the condition
/// that triggered the switch; only exhausting the whole list produces
/// an alert message.
pub async fn resolve_reference(
    chain: &ChainConfig,
    local_height: u64,
    client: &impl StatusFetch,
) -> Resolution {
    let candidates = [
        ("primary", chain.reference_node_url.as_str()),
        ("backup", chain.backup_reference_node_url.as_str()),
    ];

    for (label, url) in candidates {
        match client.fetch_status(url).await {
            Ok(reference) if reference.catching_up => {
                warn!(
                    chain = %chain.name,
                    reference = label,
                    "reference node is catching up, trying next candidate"
                );
            }
            Ok(reference) if reference.latest_block_height < local_height => {
                warn!(
                    chain = %chain.name,
                    reference = label,
                    reference_height = reference.latest_block_height,
                    local_height,
                    "reference node is behind the local node, trying next candidate"
                );
            }
            Ok(reference) => {
                info!(
                    chain = %chain.name,
                    reference = label,
                    height = reference.latest_block_height,
                    "reference node accepted"
                );
                return Resolution::Resolved(reference);
            }
            Err(error) => {
                warn!(
                    chain = %chain.name,
                    reference = label,
                    error = %error,
                    "reference node fetch failed, trying next candidate"
                );
            }
        }
    }

    Resolution::Unavailable(format!(
        "Error: Both the primary and backup reference nodes for {} are unavailable or behind.",
        chain.name
    ))
}
