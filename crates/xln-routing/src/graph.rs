//! The directed per-token capacity multigraph and the pathfinder over it.
//!
//! Capacity flows in the direction fees are paid: the predecessor pays a
//! fee to forward `amount` on to its successor, so the amount required at
//! a hop grows as the search walks backward from the destination to the
//! source. Dijkstra with non-negative fees never revisits a node, so
//! every route returned is already loop-free.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use xln_core::{Collateral, EntityId, TokenId};

use crate::store::GossipStore;

#[derive(Clone, Debug)]
pub struct CapacityEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub token: TokenId,
    /// Spendable capacity `from` can still forward to `to` on this token.
    pub capacity: Collateral,
    /// Fraction of total capacity already committed, in `[0, 1]`.
    pub utilization: f64,
}

#[derive(Clone, Debug, Default)]
pub struct CapacityGraph {
    /// Outgoing edges, keyed by the node they originate from.
    edges: HashMap<EntityId, Vec<CapacityEdge>>,
}

impl CapacityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: CapacityEdge) {
        self.edges.entry(edge.from.clone()).or_default().push(edge);
    }

    fn incoming_at(&self, node: &EntityId, token: TokenId) -> Vec<&CapacityEdge> {
        self.edges
            .values()
            .flatten()
            .filter(|e| &e.to == node && e.token == token)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// Ordered source-to-destination, inclusive of both endpoints.
    pub hops: Vec<EntityId>,
    pub total_fee: Collateral,
    pub success_probability: f64,
}

#[derive(Clone, Debug)]
struct Frontier {
    /// Amount that must be available at `node` for the route to deliver
    /// the requested amount to the destination.
    amount_needed: Collateral,
    node: EntityId,
    path: Vec<EntityId>,
    utilizations: Vec<f64>,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.amount_needed == other.amount_needed
    }
}
impl Eq for Frontier {}
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smaller amount_needed sorts first.
        other.amount_needed.cmp(&self.amount_needed)
    }
}
impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a single loop-free route by walking backward from `destination`,
/// accumulating the forwarding fee each hop charges on top of the
/// downstream amount, until `source` is reached.
fn shortest_route(
    graph: &CapacityGraph,
    gossip: &GossipStore,
    token: TokenId,
    source: &EntityId,
    destination: &EntityId,
    amount: Collateral,
    excluded_edges: &std::collections::HashSet<(EntityId, EntityId)>,
) -> Option<Route> {
    let mut heap = BinaryHeap::new();
    heap.push(Frontier {
        amount_needed: amount,
        node: destination.clone(),
        path: vec![destination.clone()],
        utilizations: vec![],
    });

    // Smallest amount_needed seen per node so far, to prune dominated paths.
    let mut best: HashMap<EntityId, Collateral> = HashMap::new();

    while let Some(current) = heap.pop() {
        if &current.node == source {
            let mut hops = current.path;
            hops.reverse();
            let total_fee = current.amount_needed - amount;
            let success_probability: f64 = current
                .utilizations
                .iter()
                .map(|u| (-2.0 * u).exp())
                .product();
            return Some(Route { hops, total_fee, success_probability });
        }
        if let Some(&seen) = best.get(&current.node) {
            if seen <= current.amount_needed {
                continue;
            }
        }
        best.insert(current.node.clone(), current.amount_needed);

        for edge in graph.incoming_at(&current.node, token) {
            if excluded_edges.contains(&(edge.from.clone(), edge.to.clone())) {
                continue;
            }
            if current.path.contains(&edge.from) {
                continue; // keeps the route simple even under pathological inputs
            }
            if edge.capacity < current.amount_needed {
                continue;
            }
            let fee = gossip
                .get(&edge.from)
                .and_then(|p| p.fee_schedule_for(token))
                .map(|fs| fs.fee_for(current.amount_needed))
                .unwrap_or(0);
            let amount_needed = current.amount_needed + fee;
            let mut path = current.path.clone();
            path.push(edge.from.clone());
            let mut utilizations = current.utilizations.clone();
            utilizations.push(edge.utilization);
            heap.push(Frontier { amount_needed, node: edge.from.clone(), path, utilizations });
        }
    }
    None
}

/// Return up to `k` loop-free routes, most capacity-efficient first. Each
/// successive route excludes the edges of every route already returned,
/// which trades optimality for route diversity — a later route may cost
/// strictly more than a route sharing an edge with an earlier pick would
/// have, but never reuses an earlier route's exact edge set.
pub fn top_k_routes(
    graph: &CapacityGraph,
    gossip: &GossipStore,
    token: TokenId,
    source: &EntityId,
    destination: &EntityId,
    amount: Collateral,
    k: usize,
) -> Vec<Route> {
    let mut routes = Vec::new();
    let mut excluded = std::collections::HashSet::new();
    while routes.len() < k {
        let Some(route) = shortest_route(graph, gossip, token, source, destination, amount, &excluded) else {
            break;
        };
        for pair in route.hops.windows(2) {
            excluded.insert((pair[0].clone(), pair[1].clone()));
        }
        routes.push(route);
    }
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_core::FeeSchedule;

    fn id(b: u8) -> EntityId {
        EntityId::from_bytes([b; 32])
    }

    fn profile_with_fee(entity: EntityId, base_fee: Collateral, rate_ppm: u32) -> xln_core::GossipProfile {
        xln_core::GossipProfile {
            entity_id: entity,
            onion_public_key: [0u8; 32],
            fee_schedules: vec![(TokenId(0), FeeSchedule { base_fee, fee_rate_ppm: rate_ppm })],
            updated_at: 1,
        }
    }

    #[test]
    fn finds_direct_route_when_capacity_suffices() {
        let mut graph = CapacityGraph::new();
        graph.add_edge(CapacityEdge { from: id(1), to: id(2), token: TokenId(0), capacity: 1_000, utilization: 0.1 });
        let gossip = GossipStore::new();
        let route = shortest_route(&graph, &gossip, TokenId(0), &id(1), &id(2), 100, &Default::default()).unwrap();
        assert_eq!(route.hops, vec![id(1), id(2)]);
        assert_eq!(route.total_fee, 0);
    }

    #[test]
    fn prefers_multi_hop_when_direct_lacks_capacity() {
        let mut graph = CapacityGraph::new();
        graph.add_edge(CapacityEdge { from: id(1), to: id(2), token: TokenId(0), capacity: 10, utilization: 0.9 });
        graph.add_edge(CapacityEdge { from: id(1), to: id(3), token: TokenId(0), capacity: 1_000, utilization: 0.1 });
        graph.add_edge(CapacityEdge { from: id(3), to: id(2), token: TokenId(0), capacity: 1_000, utilization: 0.1 });
        let mut gossip = GossipStore::new();
        gossip.apply(profile_with_fee(id(3), 1, 1_000));

        let route = shortest_route(&graph, &gossip, TokenId(0), &id(1), &id(2), 100, &Default::default()).unwrap();
        assert_eq!(route.hops, vec![id(1), id(3), id(2)]);
        assert!(route.total_fee > 0);
    }

    #[test]
    fn top_k_returns_fewer_than_k_when_exhausted() {
        let mut graph = CapacityGraph::new();
        graph.add_edge(CapacityEdge { from: id(1), to: id(2), token: TokenId(0), capacity: 1_000, utilization: 0.0 });
        let gossip = GossipStore::new();
        let routes = top_k_routes(&graph, &gossip, TokenId(0), &id(1), &id(2), 50, 5);
        assert_eq!(routes.len(), 1);
    }
}
