pub mod graph;
pub mod store;

pub use graph::{CapacityEdge, CapacityGraph, Route};
pub use store::GossipStore;

use xln_core::{Collateral, EntityId, TokenId};

/// Find routes using the protocol default fan-out of
/// [`xln_core::constants::DEFAULT_K_ROUTES`].
pub fn find_routes(
    graph: &CapacityGraph,
    gossip: &GossipStore,
    token: TokenId,
    source: &EntityId,
    destination: &EntityId,
    amount: Collateral,
) -> Vec<Route> {
    graph::top_k_routes(
        graph,
        gossip,
        token,
        source,
        destination,
        amount,
        xln_core::constants::DEFAULT_K_ROUTES,
    )
}
