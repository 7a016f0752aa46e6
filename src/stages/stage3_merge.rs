use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{info, warn};

use crate::models::{ChunkExtraction, Feature, MergeStats, MergedExtraction, Pain, Quote};

/// What to do when a repeated id carries a description that looks like a different concept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Count and log the collision, then merge anyway
    Flag,
    /// Keep the later item as a separate `<id>-alt-<n>` entry
    Split,
}

/// Configuration for merging chunk extractions
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Evidence cap per pain
    pub max_pain_evidence: usize,
    /// Evidence cap per feature request
    pub max_feature_evidence: usize,
    /// Quotes longer than this many words are dropped after merging
    pub max_quote_words: usize,
    /// Quote list cap
    pub max_quotes: usize,
    pub collision_policy: CollisionPolicy,
    /// Description word-overlap (Jaccard) below which a repeated id is suspect
    pub min_collision_similarity: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_pain_evidence: 6,
            max_feature_evidence: 5,
            max_quote_words: 45,
            max_quotes: 120,
            collision_policy: CollisionPolicy::Flag,
            min_collision_similarity: 0.2,
        }
    }
}

/// Items merged by id
trait IdKeyed: Clone {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn description(&self) -> &str;
    fn evidence(&self) -> &[String];
    fn evidence_mut(&mut self) -> &mut Vec<String>;
    /// Fold non-evidence fields of a later occurrence into this one
    fn absorb_fields(&mut self, _later: &Self) {}
}

impl IdKeyed for Pain {
    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn evidence(&self) -> &[String] {
        &self.evidence
    }
    fn evidence_mut(&mut self) -> &mut Vec<String> {
        &mut self.evidence
    }
    fn absorb_fields(&mut self, later: &Self) {
        self.severity = self.severity.max(later.severity);
    }
}

impl IdKeyed for Feature {
    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn evidence(&self) -> &[String] {
        &self.evidence
    }
    fn evidence_mut(&mut self) -> &mut Vec<String> {
        &mut self.evidence
    }
}

/// Ordered id-keyed collection
struct IdMap<T> {
    items: Vec<T>,
    /// Per item, how many merged occurrences cited each evidence string
    citations: Vec<HashMap<String, usize>>,
    index: HashMap<String, usize>,
    evidence_cap: usize,
}

impl<T: IdKeyed> IdMap<T> {
    fn new(evidence_cap: usize) -> Self {
        Self {
            items: Vec::new(),
            citations: Vec::new(),
            index: HashMap::new(),
            evidence_cap,
        }
    }

    fn merge(&mut self, item: &T, config: &MergeConfig, suspect_collisions: &mut usize) {
        let mut key = item.id().to_string();
        let mut alt = 0;

        loop {
            let Some(&slot) = self.index.get(&key) else {
                break;
            };

            let existing = &self.items[slot];
            let similarity = description_similarity(existing.description(), item.description());
            let suspect = similarity < config.min_collision_similarity;
            if suspect && alt == 0 {
                *suspect_collisions += 1;
                warn!(
                    "Id {} reused for a different-looking concept ({:.2} overlap): {:?} vs {:?}",
                    item.id(),
                    similarity,
                    existing.description(),
                    item.description()
                );
            }

            if !suspect || config.collision_policy == CollisionPolicy::Flag {
                self.items[slot].absorb_fields(item);
                self.absorb_evidence(slot, item.evidence());
                return;
            }
            alt += 1;
            key = format!("{}-alt-{}", item.id(), alt);
        }

        let mut seeded = item.clone();
        seeded.set_id(key.clone());
        seeded.evidence_mut().clear();
        let slot = self.items.len();
        self.index.insert(key, slot);
        self.items.push(seeded);
        self.citations.push(HashMap::new());
        self.absorb_evidence(slot, item.evidence());
    }

    /// Record every distinct evidence string; the cap is applied in `into_items`
    fn absorb_evidence(&mut self, slot: usize, evidence: &[String]) {
        let citations = &mut self.citations[slot];
        let target = self.items[slot].evidence_mut();
        let mut seen_here: HashSet<&str> = HashSet::new();
        for text in evidence {
            if !seen_here.insert(text.as_str()) {
                continue;
            }
            let count = citations.entry(text.clone()).or_insert(0);
            if *count == 0 {
                target.push(text.clone());
            }
            *count += 1;
        }
    }

    /// Items in first-seen order with evidence cut to the cap
    ///
    /// Which evidence survives the cap depends only on how many occurrences
    /// cited it (most first, then alphabetical), never on input order. The
    /// survivors keep first-seen order.
    fn into_items(self) -> Vec<T> {
        let cap = self.evidence_cap;
        self.items
            .into_iter()
            .zip(self.citations)
            .map(|(mut item, citations)| {
                if citations.len() > cap {
                    let mut ranked: Vec<(&String, &usize)> = citations.iter().collect();
                    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
                    let kept: HashSet<&str> =
                        ranked.into_iter().take(cap).map(|(text, _)| text.as_str()).collect();
                    item.evidence_mut().retain(|text| kept.contains(text.as_str()));
                }
                item
            })
            .collect()
    }
}

/// Fold all chunk extractions into one deduplicated structure
///
/// Pains and features are keyed by id: severity takes the max, evidence is
/// unioned without duplicates and then capped. Quotes are deduplicated by a
/// normalized key (first occurrence wins), over-long ones are dropped and the
/// list is capped. Needs are unioned.
///
/// The id-keyed maps do not depend on input order, including which evidence
/// survives the cap. Descriptions, evidence order and the quote list follow
/// first occurrence.
pub fn merge_chunk_extractions(
    extractions: &[ChunkExtraction],
    original_token_estimate: usize,
    config: &MergeConfig,
) -> MergedExtraction {
    let mut pains: IdMap<Pain> = IdMap::new(config.max_pain_evidence);
    let mut features: IdMap<Feature> = IdMap::new(config.max_feature_evidence);
    let mut quotes: Vec<Quote> = Vec::new();
    let mut quote_keys: HashSet<String> = HashSet::new();
    let mut needs: BTreeSet<String> = BTreeSet::new();
    let mut suspect_id_collisions = 0;

    for extraction in extractions {
        for pain in &extraction.pains {
            pains.merge(pain, config, &mut suspect_id_collisions);
        }
        for feature in &extraction.feature_requests {
            features.merge(feature, config, &mut suspect_id_collisions);
        }
        for quote in &extraction.quotes {
            let key = normalize_quote_key(&quote.text);
            if !key.is_empty() && quote_keys.insert(key) {
                quotes.push(quote.clone());
            }
        }
        for need in &extraction.needs {
            let need = need.trim();
            if !need.is_empty() {
                needs.insert(need.to_string());
            }
        }
    }

    quotes.retain(|q| q.text.split_whitespace().count() <= config.max_quote_words);
    quotes.truncate(config.max_quotes);
    let pains = pains.into_items();
    let feature_requests = features.into_items();

    let stats = MergeStats {
        total_chunks: extractions.len(),
        original_token_estimate,
        compression_ratio: None,
        skipped_chunks: extractions.iter().filter(|e| e.meta.skipped).count(),
        suspect_id_collisions,
    };

    info!(
        "Merge: {} chunks -> {} pains, {} features, {} quotes, {} needs ({} suspect id collisions)",
        stats.total_chunks,
        pains.len(),
        feature_requests.len(),
        quotes.len(),
        needs.len(),
        stats.suspect_id_collisions
    );

    MergedExtraction {
        pains,
        feature_requests,
        quotes,
        needs,
        stats,
    }
}

/// Lowercase, non-alphanumeric runs collapsed to one space, trimmed
pub fn normalize_quote_key(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !key.is_empty() {
                key.push(' ');
            }
            pending_space = false;
            key.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    key
}

/// Jaccard overlap of the lowercase word sets of two descriptions
///
/// An empty description gives nothing to compare and counts as a match.
fn description_similarity(a: &str, b: &str) -> f64 {
    let words = |s: &str| -> HashSet<String> {
        normalize_quote_key(s)
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    };
    let (a, b) = (words(a), words(b));
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(&b).count() as f64;
    let total = a.union(&b).count() as f64;
    shared / total
}
