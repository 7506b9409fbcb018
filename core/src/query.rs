//! Free-text query evaluation over a built [`InvertedIndex`].
//!
//! A query is a whitespace separated list of words. Words prefixed with `-`
//! exclude every document containing them. The remaining words are analyzed
//! like document text and combined according to [`MatchMode`].

use crate::index::{DocId, InvertedIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Prefix expansion only kicks in for query terms longer than this.
const MIN_PARTIAL_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every query term must match (AND).
    #[default]
    All,
    /// At least one query term must match (ranked union).
    Any,
}

/// Score contributed by one query term to one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    pub term: f32,
    pub title: f32,
    pub partial_term: f32,
    pub partial_title: f32,
}

impl Default for Scorer {
    fn default() -> Self {
        Self { term: 5.0, title: 15.0, partial_term: 2.0, partial_title: 7.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub mode: MatchMode,
    /// Also match indexed terms that start with a query term
    pub partial: bool,
    pub limit: Option<usize>,
    pub scorer: Scorer,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { mode: MatchMode::All, partial: true, limit: None, scorer: Scorer::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f32,
}

/// A query split into normalized required and excluded terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub required: Vec<String>,
    pub excluded: Vec<String>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool { self.required.is_empty() }
}

impl InvertedIndex {
    pub fn parse_query(&self, text: &str) -> ParsedQuery {
        let analyzer = self.analyzer();
        let mut required = Vec::new();
        let mut excluded = Vec::new();
        let mut seen_required = HashSet::new();
        let mut seen_excluded = HashSet::new();
        for word in text.split_whitespace() {
            let (target, seen, raw) = match word.strip_prefix('-') {
                Some(rest) => (&mut excluded, &mut seen_excluded, rest),
                None => (&mut required, &mut seen_required, word),
            };
            for term in analyzer.terms(raw) {
                if seen.insert(term.clone()) {
                    target.push(term);
                }
            }
        }
        ParsedQuery { required, excluded }
    }

    /// Document ids matching every term of `text`, best first.
    pub fn query(&self, text: &str) -> Vec<DocId> {
        self.search(text, &QueryOptions::default()).into_iter().map(|h| h.doc_id).collect()
    }

    /// Ranked search. Unknown terms and empty queries give an empty result.
    pub fn search(&self, text: &str, opts: &QueryOptions) -> Vec<SearchHit> {
        let parsed = self.parse_query(text);
        if parsed.is_empty() {
            return Vec::new();
        }

        // doc -> (score, number of required terms matched)
        let mut acc: BTreeMap<DocId, (f32, usize)> = BTreeMap::new();
        for term in &parsed.required {
            for (doc_id, score) in self.score_term(term, opts) {
                let entry = acc.entry(doc_id).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }

        let excluded: HashSet<DocId> = parsed
            .excluded
            .iter()
            .flat_map(|t| {
                self.postings(t)
                    .iter()
                    .map(|p| p.doc_id)
                    .chain(self.title_postings(t).iter().copied())
            })
            .collect();

        let needed = match opts.mode {
            MatchMode::All => parsed.required.len(),
            MatchMode::Any => 1,
        };
        let mut hits: Vec<SearchHit> = acc
            .into_iter()
            .filter(|(doc_id, (_, matched))| *matched >= needed && !excluded.contains(doc_id))
            .map(|(doc_id, (score, _))| SearchHit { doc_id, score })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.doc_id.cmp(&b.doc_id))
        });
        if let Some(limit) = opts.limit {
            hits.truncate(limit);
        }
        tracing::trace!(query = text, hits = hits.len(), "search evaluated");
        hits
    }

    /// Per-document score of a single normalized term. A document that matches
    /// exactly never also collects the partial score for the same term.
    fn score_term(&self, term: &str, opts: &QueryOptions) -> BTreeMap<DocId, f32> {
        let scorer = &opts.scorer;
        let mut exact: BTreeMap<DocId, f32> = BTreeMap::new();
        for p in self.postings(term) {
            *exact.entry(p.doc_id).or_insert(0.0) += scorer.term * (1.0 + p.weight);
        }
        for &doc_id in self.title_postings(term) {
            *exact.entry(doc_id).or_insert(0.0) += scorer.title;
        }

        if !opts.partial || term.chars().count() <= MIN_PARTIAL_LEN {
            return exact;
        }

        let mut partial: BTreeMap<DocId, f32> = BTreeMap::new();
        for (_, plist) in self.terms_with_prefix(term) {
            for p in plist {
                bump_max(&mut partial, p.doc_id, scorer.partial_term);
            }
        }
        let mut partial_title: BTreeMap<DocId, f32> = BTreeMap::new();
        for (_, ids) in self.titleterms_with_prefix(term) {
            for &doc_id in ids {
                bump_max(&mut partial_title, doc_id, scorer.partial_title);
            }
        }
        for (doc_id, score) in partial_title {
            *partial.entry(doc_id).or_insert(0.0) += score;
        }
        for (doc_id, score) in partial {
            exact.entry(doc_id).or_insert(score);
        }
        exact
    }
}

fn bump_max(scores: &mut BTreeMap<DocId, f32>, doc_id: DocId, score: f32) {
    let slot = scores.entry(doc_id).or_insert(score);
    if *slot < score {
        *slot = score;
    }
}
