//! Composition Graph
//!
//! Directed graph of how indexed cards plug into each other, built from
//! their composition interfaces:
//!
//! - `A.delegates_to -> B`: edge A → B
//! - `A.orchestrated_by -> B`: edge B → A
//! - `A.emits e`, `B.listens_to e` (from A or from anyone): edge A → B
//!
//! Behavior references resolve against card names, or against problem
//! categories when prefixed `pattern:`; `*` matches any run of characters.
//! Cycles are reported as strongly connected components.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::card::BehaviorCard;
use crate::resolve::PATTERN_PREFIX;
use crate::version::CardIdentity;

/// Why two cards are connected
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositionEdge {
    /// Source hands work to target through an interface
    Delegates {
        interface: Option<String>,
        required: bool,
    },
    /// Source orchestrates target
    Orchestrates { required: bool },
    /// Target consumes an event source emits
    Event { event: String, required: bool },
}

pub struct CompositionGraph {
    graph: DiGraph<CardIdentity, CompositionEdge>,
    node_indices: HashMap<CardIdentity, NodeIndex>,
}

impl CompositionGraph {
    /// Connect every pair of cards whose composition interfaces line up
    pub fn build<'a>(cards: impl IntoIterator<Item = &'a BehaviorCard>) -> Self {
        let cards: Vec<&BehaviorCard> = cards.into_iter().collect();
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        let nodes: Vec<NodeIndex> = cards
            .iter()
            .map(|card| {
                let idx = graph.add_node(card.identity());
                node_indices.insert(card.identity(), idx);
                idx
            })
            .collect();

        for (i, source) in cards.iter().enumerate() {
            for (j, target) in cards.iter().enumerate() {
                if source.name() == target.name() {
                    continue;
                }
                for edge in edges_between(source, target) {
                    graph.add_edge(nodes[i], nodes[j], edge);
                }
            }
        }

        Self { graph, node_indices }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Cards this card hands work or events to
    pub fn downstream(&self, id: &CardIdentity) -> Vec<(&CardIdentity, &CompositionEdge)> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Cards that hand work or events to this card
    pub fn upstream(&self, id: &CardIdentity) -> Vec<(&CardIdentity, &CompositionEdge)> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Every card connected to this one in either direction, sorted
    pub fn composable_with(&self, id: &CardIdentity) -> Vec<&CardIdentity> {
        let connected: BTreeSet<&CardIdentity> = self
            .downstream(id)
            .into_iter()
            .chain(self.upstream(id))
            .map(|(other, _)| other)
            .collect();
        connected.into_iter().collect()
    }

    /// Groups of cards that compose in a loop
    pub fn cycles(&self) -> Vec<Vec<CardIdentity>> {
        let mut groups: Vec<Vec<CardIdentity>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<CardIdentity> = scc.iter().map(|&n| self.graph[n].clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        groups.sort();
        groups
    }

    /// All edges as `(source, target, edge)`
    pub fn edges(&self) -> Vec<(&CardIdentity, &CompositionEdge, &CardIdentity)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], e.weight(), &self.graph[e.target()]))
            .collect()
    }

    fn neighbors(&self, id: &CardIdentity, direction: Direction) -> Vec<(&CardIdentity, &CompositionEdge)> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (&self.graph[other], e.weight())
            })
            .collect()
    }
}

fn edges_between(source: &BehaviorCard, target: &BehaviorCard) -> Vec<CompositionEdge> {
    let mut edges = Vec::new();

    for link in &source.composition.delegates_to {
        if reference_matches(&link.behavior, target) {
            edges.push(CompositionEdge::Delegates {
                interface: link.interface.clone(),
                required: link.required,
            });
        }
    }

    for link in &target.composition.orchestrated_by {
        if reference_matches(&link.behavior, source) {
            edges.push(CompositionEdge::Orchestrates { required: link.required });
        }
    }

    for emission in &source.composition.emits {
        for subscription in &target.composition.listens_to {
            let from_source = subscription
                .source
                .as_deref()
                .map_or(true, |s| reference_matches(s, source));
            if subscription.event == emission.event && from_source {
                edges.push(CompositionEdge::Event {
                    event: emission.event.clone(),
                    required: subscription.required,
                });
            }
        }
    }

    edges
}

/// Does a behavior reference name this card?
pub fn reference_matches(reference: &str, card: &BehaviorCard) -> bool {
    match reference.strip_prefix(PATTERN_PREFIX) {
        Some(category) => wildcard_match(category, card.category().as_str()),
        None => wildcard_match(reference, card.name()),
    }
}

/// `*` matches any run of characters, everything else matches itself
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
