//! Registry Index
//!
//! In-memory, append-only index of accepted cards.
//!
//! The index holds an immutable [`IndexSnapshot`] behind an `RwLock<Arc<_>>`.
//! Writers take the write lock and update the snapshot copy-on-write; readers
//! clone the `Arc` under the read lock and evaluate queries without holding
//! any lock. A reader therefore sees each card completely or not at all, and
//! never blocks a writer for longer than an `Arc` clone.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::card::{BehaviorCard, ProblemCategory};
use crate::checksum::Checksum;
use crate::diagnostics::Diagnostics;
use crate::error::{CardError, Result};
use crate::graph::CompositionGraph;
use crate::pipeline::AcceptedCard;
use crate::score::{normalize_domain, CompatibilityReport, CompatibilityScorer};
use crate::version::CardIdentity;

/// A card as stored in the index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedCard {
    pub card: BehaviorCard,
    pub checksum: Checksum,
    pub warnings: Diagnostics,
    /// Position in insertion order
    pub sequence: usize,
}

impl IndexedCard {
    pub fn identity(&self) -> CardIdentity {
        self.card.identity()
    }
}

/// Result ordering for [`CardFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Insertion,
    /// Highest declared similarity to the `analog_of` domain first
    AnalogSimilarity,
    /// Best fuzzy match on the `name_like` query first
    NameMatch,
}

/// Conjunction of card predicates; unset predicates match everything
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    pub category: Option<ProblemCategory>,
    pub tag: Option<String>,
    pub origin_domain: Option<String>,
    /// Card has an adaptation point with this interface
    pub interface: Option<String>,
    /// Fuzzy match on the card name
    pub name_like: Option<String>,
    /// Card originates in, or declares an analogy to, this domain
    pub analog_of: Option<String>,
    pub sort: SortKey,
}

impl CardFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: ProblemCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn origin_domain(mut self, domain: impl Into<String>) -> Self {
        self.origin_domain = Some(domain.into());
        self
    }

    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn name_like(mut self, query: impl Into<String>) -> Self {
        self.name_like = Some(query.into());
        self
    }

    pub fn analog_of(mut self, domain: impl Into<String>) -> Self {
        self.analog_of = Some(domain.into());
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort = key;
        self
    }
}

/// One hit of a similar-card search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCard {
    pub identity: CardIdentity,
    pub score: f64,
    pub report: CompatibilityReport,
}

/// Immutable view of the index at one point in time
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    entries: Vec<Arc<IndexedCard>>,
    by_identity: HashMap<CardIdentity, usize>,
    by_category: HashMap<ProblemCategory, Vec<usize>>,
}

impl IndexSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All cards in insertion order
    pub fn cards(&self) -> &[Arc<IndexedCard>] {
        &self.entries
    }

    pub fn contains(&self, identity: &CardIdentity) -> bool {
        self.by_identity.contains_key(identity)
    }

    pub fn get(&self, identity: &CardIdentity) -> Option<Arc<IndexedCard>> {
        self.by_identity
            .get(identity)
            .map(|&pos| Arc::clone(&self.entries[pos]))
    }

    /// All indexed versions of a card, oldest version first
    pub fn versions(&self, name: &str) -> Vec<Arc<IndexedCard>> {
        let mut versions: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.card.name() == name)
            .cloned()
            .collect();
        versions.sort_by(|a, b| a.card.identity.version.cmp(&b.card.identity.version));
        versions
    }

    /// Highest indexed version of a card
    pub fn latest(&self, name: &str) -> Option<Arc<IndexedCard>> {
        self.versions(name).pop()
    }

    pub fn query(&self, filter: &CardFilter) -> Vec<Arc<IndexedCard>> {
        let matcher = SkimMatcherV2::default();

        let candidates: Box<dyn Iterator<Item = &Arc<IndexedCard>>> = match filter.category {
            Some(category) => Box::new(
                self.by_category
                    .get(&category)
                    .into_iter()
                    .flatten()
                    .map(|&pos| &self.entries[pos]),
            ),
            None => Box::new(self.entries.iter()),
        };

        let mut hits: Vec<(i64, f64, &Arc<IndexedCard>)> = Vec::new();
        for entry in candidates {
            let card = &entry.card;

            if filter.tag.as_deref().is_some_and(|tag| !card.has_tag(tag)) {
                continue;
            }
            if let Some(domain) = &filter.origin_domain {
                let same = card
                    .origin_domain()
                    .is_some_and(|origin| normalize_domain(origin) == normalize_domain(domain));
                if !same {
                    continue;
                }
            }
            if filter.interface.as_deref().is_some_and(|i| !card.has_interface(i)) {
                continue;
            }

            let name_score = match &filter.name_like {
                Some(query) => {
                    let best = matcher
                        .fuzzy_match(card.name(), query)
                        .max(matcher.fuzzy_match(&card.identity.display_name, query));
                    match best {
                        Some(score) => score,
                        None => continue,
                    }
                }
                None => 0,
            };
            let analog_score = match &filter.analog_of {
                Some(domain) => match analog_affinity(card, domain) {
                    Some(similarity) => similarity,
                    None => continue,
                },
                None => 0.0,
            };

            hits.push((name_score, analog_score, entry));
        }

        // sort_by is stable, so ties keep insertion order
        match filter.sort {
            SortKey::Insertion => {}
            SortKey::AnalogSimilarity => hits.sort_by(|a, b| b.1.total_cmp(&a.1)),
            SortKey::NameMatch => hits.sort_by(|a, b| b.0.cmp(&a.0)),
        }

        hits.into_iter().map(|(_, _, entry)| Arc::clone(entry)).collect()
    }

    /// Indexed cards ranked by compatibility with `card`
    ///
    /// Versions of the card itself are skipped.
    pub fn find_similar(
        &self,
        card: &AcceptedCard,
        scorer: &CompatibilityScorer,
        min_score: f64,
        max_results: usize,
    ) -> Vec<SimilarCard> {
        let mut similar: Vec<SimilarCard> = self
            .entries
            .iter()
            .filter(|entry| entry.card.name() != card.card().name())
            .map(|entry| {
                let report = scorer.compare(card.card(), &entry.card);
                SimilarCard {
                    identity: entry.identity(),
                    score: report.score,
                    report,
                }
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        similar.sort_by(|a, b| b.score.total_cmp(&a.score));
        similar.truncate(max_results);
        similar
    }

    /// Delegation and event edges between the indexed cards
    pub fn composition_graph(&self) -> CompositionGraph {
        CompositionGraph::build(self.entries.iter().map(|e| &e.card))
    }

    fn push(&mut self, entry: IndexedCard) {
        let pos = self.entries.len();
        self.by_identity.insert(entry.identity(), pos);
        self.by_category.entry(entry.card.category()).or_default().push(pos);
        self.entries.push(Arc::new(entry));
    }
}

/// Declared similarity of a card to a domain; 1.0 for the card's own origin
fn analog_affinity(card: &BehaviorCard, domain: &str) -> Option<f64> {
    let wanted = normalize_domain(domain);
    if card.origin_domain().is_some_and(|origin| normalize_domain(origin) == wanted) {
        return Some(1.0);
    }
    card.problem_pattern
        .analogous_domains
        .iter()
        .filter(|analog| normalize_domain(&analog.domain) == wanted)
        .map(|analog| analog.similarity)
        .reduce(f64::max)
}

/// Thread-safe registry of accepted cards
#[derive(Debug, Default)]
pub struct RegistryIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl RegistryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; later inserts do not affect it
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        let guard = self.current.read().map_err(|_| CardError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Add an accepted card
    ///
    /// Cards are append-only: a second card with the same name and version
    /// fails with [`CardError::DuplicateIdentity`], a new version does not.
    pub fn insert(&self, accepted: AcceptedCard) -> Result<Arc<IndexedCard>> {
        let identity = accepted.identity();
        let mut guard = self.current.write().map_err(|_| CardError::LockPoisoned)?;

        if guard.contains(&identity) {
            tracing::debug!(card = %identity, "duplicate card rejected by index");
            return Err(CardError::DuplicateIdentity {
                name: identity.name,
                version: identity.version.to_string(),
            });
        }

        let snapshot = Arc::make_mut(&mut *guard);
        let sequence = snapshot.len();
        let checksum = accepted.checksum().clone();
        let warnings = accepted.warnings().clone();
        snapshot.push(IndexedCard {
            card: accepted.into_card(),
            checksum,
            warnings,
            sequence,
        });

        tracing::info!(card = %identity, total = snapshot.len(), "card indexed");
        Ok(Arc::clone(&snapshot.entries[snapshot.len() - 1]))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.snapshot()?.is_empty())
    }

    pub fn get(&self, identity: &CardIdentity) -> Result<Arc<IndexedCard>> {
        self.snapshot()?
            .get(identity)
            .ok_or_else(|| CardError::NotFound {
                name: identity.name.clone(),
                version: identity.version.to_string(),
            })
    }

    pub fn latest(&self, name: &str) -> Result<Option<Arc<IndexedCard>>> {
        Ok(self.snapshot()?.latest(name))
    }

    pub fn versions(&self, name: &str) -> Result<Vec<Arc<IndexedCard>>> {
        Ok(self.snapshot()?.versions(name))
    }

    pub fn query(&self, filter: &CardFilter) -> Result<Vec<Arc<IndexedCard>>> {
        Ok(self.snapshot()?.query(filter))
    }

    pub fn find_similar(
        &self,
        card: &AcceptedCard,
        scorer: &CompatibilityScorer,
        min_score: f64,
        max_results: usize,
    ) -> Result<Vec<SimilarCard>> {
        Ok(self.snapshot()?.find_similar(card, scorer, min_score, max_results))
    }

    pub fn composition_graph(&self) -> Result<CompositionGraph> {
        Ok(self.snapshot()?.composition_graph())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{card, set};
    use crate::pipeline::accept;
    use serde_json::{json, Value};
    use std::thread;

    fn accepted(doc: &Value) -> AcceptedCard {
        accept(doc).unwrap_or_else(|r| panic!("{}", r))
    }

    fn names(cards: &[Arc<IndexedCard>]) -> Vec<&str> {
        cards.iter().map(|c| c.card.name()).collect()
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let index = RegistryIndex::new();
        let doc = card("inventory-rebalance-optimizer", "1.0.0");
        index.insert(accepted(&doc)).unwrap();

        let err = index.insert(accepted(&doc)).unwrap_err();
        assert!(matches!(err, CardError::DuplicateIdentity { ref version, .. } if version == "1.0.0"));
        assert_eq!(index.len().unwrap(), 1);
    }

    #[test]
    fn test_version_bump_accepted() {
        let index = RegistryIndex::new();
        index.insert(accepted(&card("inventory-rebalance-optimizer", "1.0.0"))).unwrap();
        index.insert(accepted(&card("inventory-rebalance-optimizer", "1.0.1"))).unwrap();

        let versions = index.versions("inventory-rebalance-optimizer").unwrap();
        assert_eq!(versions.len(), 2);
        let latest = index.latest("inventory-rebalance-optimizer").unwrap().unwrap();
        assert_eq!(latest.identity().to_string(), "inventory-rebalance-optimizer@1.0.1");
        assert!(index.latest("unknown-card").unwrap().is_none());
    }

    #[test]
    fn test_get_unknown_identity() {
        let index = RegistryIndex::new();
        let id = CardIdentity::parse("missing-card@1.0.0").unwrap();
        assert!(matches!(index.get(&id), Err(CardError::NotFound { .. })));
    }

    #[test]
    fn test_query_by_category_in_insertion_order() {
        let index = RegistryIndex::new();
        for (name, category) in [
            ("card-c", "constrained-resource-allocation"),
            ("card-a", "adaptive-communication"),
            ("card-b", "constrained-resource-allocation"),
            ("card-d", "constrained-resource-allocation"),
        ] {
            let mut doc = card(name, "1.0.0");
            set(&mut doc, "/problem_pattern/category", json!(category));
            index.insert(accepted(&doc)).unwrap();
        }

        let hits = index
            .query(&CardFilter::new().category(ProblemCategory::ConstrainedResourceAllocation))
            .unwrap();
        assert_eq!(names(&hits), vec!["card-c", "card-b", "card-d"]);
        let sequences: Vec<_> = hits.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![0, 2, 3]);
    }

    #[test]
    fn test_predicates_are_anded() {
        let index = RegistryIndex::new();

        let mut first = card("retail-rebalancer", "1.0.0");
        set(&mut first, "/identity/tags", json!(["inventory"]));
        index.insert(accepted(&first)).unwrap();

        let mut second = card("relief-rebalancer", "1.0.0");
        set(&mut second, "/identity/tags", json!(["inventory", "humanitarian"]));
        set(&mut second, "/provenance/origin/domain", json!("humanitarian_logistics"));
        index.insert(accepted(&second)).unwrap();

        let by_tag = index.query(&CardFilter::new().tag("inventory")).unwrap();
        assert_eq!(by_tag.len(), 2);

        let filter = CardFilter::new()
            .tag("inventory")
            .origin_domain("Humanitarian Logistics")
            .interface("DemandForecaster");
        assert_eq!(names(&index.query(&filter).unwrap()), vec!["relief-rebalancer"]);

        let none = CardFilter::new().tag("inventory").interface("NoSuchInterface");
        assert!(index.query(&none).unwrap().is_empty());
    }

    #[test]
    fn test_analog_sort_is_stable() {
        let index = RegistryIndex::new();
        for (name, similarity) in [("card-a", 0.5), ("card-b", 0.9), ("card-c", 0.5), ("card-d", 0.2)] {
            let mut doc = card(name, "1.0.0");
            set(&mut doc, "/problem_pattern/analogous_domains/0/similarity", json!(similarity));
            index.insert(accepted(&doc)).unwrap();
        }
        let mut other = card("card-e", "1.0.0");
        set(&mut other, "/problem_pattern/analogous_domains", json!([]));
        index.insert(accepted(&other)).unwrap();

        let filter = CardFilter::new()
            .analog_of("humanitarian-logistics")
            .sort_by(SortKey::AnalogSimilarity);
        assert_eq!(names(&index.query(&filter).unwrap()), vec!["card-b", "card-a", "card-c", "card-d"]);

        let unsorted = CardFilter::new().analog_of("humanitarian-logistics");
        assert_eq!(names(&index.query(&unsorted).unwrap()), vec!["card-a", "card-b", "card-c", "card-d"]);
    }

    #[test]
    fn test_fuzzy_name_query() {
        let index = RegistryIndex::new();
        for name in ["triage-router", "inventory-rebalancer", "inventory-auditor"] {
            index.insert(accepted(&card(name, "1.0.0"))).unwrap();
        }

        let hits = index.query(&CardFilter::new().name_like("invreb").sort_by(SortKey::NameMatch)).unwrap();
        assert_eq!(names(&hits)[0], "inventory-rebalancer");
        assert!(!names(&hits).contains(&"triage-router"));
    }

    #[test]
    fn test_fuzzy_query_matches_display_name() {
        let index = RegistryIndex::new();
        let mut desk = card("triage-router", "1.0.0");
        set(&mut desk, "/identity/display_name", json!("Field Triage Desk"));
        index.insert(accepted(&desk)).unwrap();
        index.insert(accepted(&card("inventory-rebalancer", "1.0.0"))).unwrap();

        let hits = index.query(&CardFilter::new().name_like("desk")).unwrap();
        assert_eq!(names(&hits), vec!["triage-router"]);
    }

    #[test]
    fn test_snapshot_isolated_from_later_inserts() {
        let index = RegistryIndex::new();
        index.insert(accepted(&card("card-a", "1.0.0"))).unwrap();
        let before = index.snapshot().unwrap();

        index.insert(accepted(&card("card-b", "1.0.0"))).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(index.snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_queries_see_whole_cards_in_order() {
        let index = Arc::new(RegistryIndex::new());
        let docs: Vec<Value> = (0..40).map(|i| card(&format!("card-{:03}", i), "1.0.0")).collect();
        let filter = CardFilter::new().category(ProblemCategory::ConstrainedResourceAllocation);

        let writer = {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for doc in &docs {
                    index.insert(accepted(doc)).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                let filter = filter.clone();
                thread::spawn(move || {
                    let mut seen = 0;
                    while seen < 40 {
                        let hits = index.query(&filter).unwrap();
                        assert!(hits.len() >= seen);
                        for (i, hit) in hits.iter().enumerate() {
                            assert_eq!(hit.sequence, i);
                            assert_eq!(hit.card.name(), format!("card-{:03}", i));
                            assert!(!hit.card.adaptation_points.is_empty());
                        }
                        seen = hits.len();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(index.len().unwrap(), 40);
    }

    #[test]
    fn test_find_similar_skips_same_name_and_ranks() {
        let index = RegistryIndex::new();
        index.insert(accepted(&card("inventory-rebalance-optimizer", "1.0.0"))).unwrap();

        let close = card("stock-balancer", "1.0.0");
        index.insert(accepted(&close)).unwrap();

        let mut distant = card("alert-triage", "1.0.0");
        set(&mut distant, "/problem_pattern/category", json!("anomaly-detection-and-response"));
        set(&mut distant, "/problem_pattern/analogous_domains", json!([]));
        index.insert(accepted(&distant)).unwrap();

        let query = accepted(&card("inventory-rebalance-optimizer", "2.0.0"));
        let scorer = CompatibilityScorer::default();
        let hits = index.find_similar(&query, &scorer, 0.0, 10).unwrap();

        let ranked: Vec<_> = hits.iter().map(|h| h.identity.name.as_str()).collect();
        assert_eq!(ranked, vec!["stock-balancer", "alert-triage"]);
        assert!(hits[0].score > hits[1].score);

        let capped = index.find_similar(&query, &scorer, 0.0, 1).unwrap();
        assert_eq!(capped.len(), 1);
        let strict = index.find_similar(&query, &scorer, 0.99, 10).unwrap();
        assert_eq!(strict.len(), 1);
    }
}
