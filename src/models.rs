/// Status document reported by a node's RPC status endpoint.
///
/// One value per fetched endpoint; discarded after the evaluation that
/// requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub latest_block_height: u64,
    pub catching_up: bool,
    /// Present only for validator-capable nodes.
    pub voting_power: Option<i64>,
}
