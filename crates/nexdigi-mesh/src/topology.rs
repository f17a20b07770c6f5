//! Mesh topology map and Dijkstra shortest-path computation (§4.7
//! "Topology"/"Shortest path").
//!
//! The local node's view of the mesh: every known node's declared neighbor
//! links (its own, directly configured, plus everyone else's as learned
//! from their LSAs), keyed by origin.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use nexdigi_core::Environment;
use nexdigi_proto::Callsign;

/// One directed link from a node to a neighbor: declared cost and when it
/// was last confirmed (by a fresh LSA, a route-reply install, or direct
/// local configuration).
#[derive(Debug, Clone, Copy)]
struct LinkInfo<I> {
    cost: u32,
    #[allow(dead_code)]
    last_seen: I,
}

#[derive(Debug, Clone, Default)]
struct NodeLinks<I> {
    links: HashMap<Callsign, LinkInfo<I>>,
}

/// Map of node-callsign to declared neighbor links, with per-origin LSA
/// sequence tracking for monotonicity (§8 "LSA monotonicity").
pub struct Topology<E: Environment> {
    nodes: HashMap<Callsign, NodeLinks<E::Instant>>,
    sequences: HashMap<Callsign, u64>,
}

impl<E: Environment> Topology<E> {
    /// Builds an empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: HashMap::new(), sequences: HashMap::new() }
    }

    /// Replaces `origin`'s entire declared link set, e.g. when applying a
    /// fresh LSA or regenerating the local node's own entry.
    pub fn set_links(&mut self, origin: Callsign, links: Vec<(Callsign, u32)>, now: E::Instant) {
        let entry = self.nodes.entry(origin).or_default();
        entry.links = links.into_iter().map(|(n, cost)| (n, LinkInfo { cost, last_seen: now })).collect();
    }

    /// Adds or updates a single link from `origin` to `neighbor`, leaving
    /// `origin`'s other links untouched (used to install links learned
    /// from a `RouteReply`, §4.7).
    pub fn upsert_link(&mut self, origin: Callsign, neighbor: Callsign, cost: u32, now: E::Instant) {
        let entry = self.nodes.entry(origin).or_default();
        entry.links.insert(neighbor, LinkInfo { cost, last_seen: now });
    }

    /// Removes `node` entirely: its own entry and every other node's link
    /// to it (§4.7 "Link failure": "remove from topology").
    pub fn remove_node(&mut self, node: &Callsign) {
        self.nodes.remove(node);
        for entry in self.nodes.values_mut() {
            entry.links.remove(node);
        }
    }

    /// The last-applied LSA sequence number for `origin`, if any.
    #[must_use]
    pub fn last_sequence(&self, origin: &Callsign) -> Option<u64> {
        self.sequences.get(origin).copied()
    }

    /// Records `sequence` as the last-applied sequence for `origin`.
    pub fn record_sequence(&mut self, origin: Callsign, sequence: u64) {
        self.sequences.insert(origin, sequence);
    }

    /// Computes single-source shortest distances and predecessor links from
    /// `source` via Dijkstra over declared link costs.
    fn dijkstra(&self, source: &Callsign) -> (HashMap<Callsign, u32>, HashMap<Callsign, Callsign>) {
        let mut dist: HashMap<Callsign, u32> = HashMap::new();
        let mut prev: HashMap<Callsign, Callsign> = HashMap::new();
        let mut visited: HashSet<Callsign> = HashSet::new();
        let mut heap: BinaryHeap<Reverse<(u32, Callsign)>> = BinaryHeap::new();

        dist.insert(source.clone(), 0);
        heap.push(Reverse((0, source.clone())));

        while let Some(Reverse((d, node))) = heap.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            if dist.get(&node).is_some_and(|&best| d > best) {
                continue;
            }
            let Some(links) = self.nodes.get(&node) else { continue };
            for (neighbor, info) in &links.links {
                let candidate = d.saturating_add(info.cost);
                if dist.get(neighbor).is_none_or(|&best| candidate < best) {
                    dist.insert(neighbor.clone(), candidate);
                    prev.insert(neighbor.clone(), node.clone());
                    heap.push(Reverse((candidate, neighbor.clone())));
                }
            }
        }

        (dist, prev)
    }

    /// The shortest path from `source` to `dest`, inclusive of both
    /// endpoints, or `None` if `dest` is unreachable.
    #[must_use]
    pub fn shortest_path(&self, source: &Callsign, dest: &Callsign) -> Option<Vec<Callsign>> {
        if source == dest {
            return Some(vec![source.clone()]);
        }
        let (dist, prev) = self.dijkstra(source);
        dist.contains_key(dest).then(|| {
            let mut path = vec![dest.clone()];
            let mut current = dest.clone();
            while let Some(p) = prev.get(&current) {
                path.push(p.clone());
                if *p == *source {
                    break;
                }
                current = p.clone();
            }
            path.reverse();
            path
        })
    }

    /// Total cost of the shortest path from `source` to `dest`, or `None`
    /// if unreachable — must agree with the summed link costs along
    /// [`Topology::shortest_path`]'s result (§8 "Dijkstra agreement").
    #[must_use]
    pub fn distance(&self, source: &Callsign, dest: &Callsign) -> Option<u32> {
        if source == dest {
            return Some(0);
        }
        self.dijkstra(source).0.get(dest).copied()
    }
}

impl<E: Environment> Default for Topology<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_core::test_support::ManualClock;

    fn cs(s: &str) -> Callsign {
        s.parse().unwrap()
    }

    fn sample() -> Topology<ManualClock> {
        let clock = ManualClock::new();
        let mut topo: Topology<ManualClock> = Topology::new();
        topo.set_links(cs("A"), vec![(cs("B"), 1)], clock.now());
        topo.set_links(cs("B"), vec![(cs("A"), 1), (cs("C"), 1)], clock.now());
        topo.set_links(cs("C"), vec![(cs("B"), 1)], clock.now());
        topo
    }

    #[test]
    fn shortest_path_through_intermediate_node() {
        let topo = sample();
        let path = topo.shortest_path(&cs("A"), &cs("C")).unwrap();
        assert_eq!(path, vec![cs("A"), cs("B"), cs("C")]);
    }

    #[test]
    fn distance_agrees_with_path_cost() {
        let topo = sample();
        let path = topo.shortest_path(&cs("A"), &cs("C")).unwrap();
        let cost: u32 = (path.len() - 1) as u32; // every link above costs 1
        assert_eq!(topo.distance(&cs("A"), &cs("C")), Some(cost));
    }

    #[test]
    fn unreachable_node_returns_none() {
        let topo = sample();
        assert_eq!(topo.shortest_path(&cs("A"), &cs("Z")), None);
        assert_eq!(topo.distance(&cs("A"), &cs("Z")), None);
    }

    #[test]
    fn removing_node_drops_paths_through_it() {
        let mut topo = sample();
        topo.remove_node(&cs("B"));
        assert_eq!(topo.shortest_path(&cs("A"), &cs("C")), None);
    }

    #[test]
    fn source_equals_dest_is_trivial_path() {
        let topo = sample();
        assert_eq!(topo.shortest_path(&cs("A"), &cs("A")), Some(vec![cs("A")]));
        assert_eq!(topo.distance(&cs("A"), &cs("A")), Some(0));
    }

    #[test]
    fn cheaper_alternate_path_is_preferred() {
        let clock = ManualClock::new();
        let mut topo: Topology<ManualClock> = Topology::new();
        topo.set_links(cs("A"), vec![(cs("B"), 1), (cs("C"), 10)], clock.now());
        topo.set_links(cs("B"), vec![(cs("C"), 1)], clock.now());
        let path = topo.shortest_path(&cs("A"), &cs("C")).unwrap();
        assert_eq!(path, vec![cs("A"), cs("B"), cs("C")]);
        assert_eq!(topo.distance(&cs("A"), &cs("C")), Some(2));
    }
}
