use crate::error::DecodeError;
use crate::tokenizer::{Analyzer, AnalyzerConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Canonical, path-like document name, e.g. `sbm_test`
    pub name: String,
    pub title: String,
    /// Source file the document was rendered from, e.g. `sbm_test.ipynb`
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32, // normalized tf-idf weight, 1.0 when unknown
}

/// One input document for [`InvertedIndex::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl<N, T, B> From<(N, T, B)> for SourceDocument
where
    N: Into<String>,
    T: Into<String>,
    B: Into<String>,
{
    fn from((name, title, body): (N, T, B)) -> Self {
        Self { name: name.into(), title: title.into(), body: body.into(), filename: None }
    }
}

/// Term -> documents index over a fixed document set.
///
/// Built once, read-only afterwards: nothing hands out `&mut` access, so a
/// built index can be shared between any number of readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    docs: Vec<DocMeta>,
    terms: BTreeMap<String, Vec<Posting>>, // postings sorted by doc_id
    titleterms: BTreeMap<String, Vec<DocId>>,
    analyzer: AnalyzerConfig,
}

impl InvertedIndex {
    /// Build with the default analyzer settings.
    pub fn build<I, D>(documents: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<SourceDocument>,
    {
        let mut builder = IndexBuilder::new(AnalyzerConfig::default());
        for doc in documents {
            builder.add(doc.into());
        }
        builder.finish()
    }

    /// Assemble an index from decoded tables, normalizing every posting list to
    /// sorted, duplicate-free form and rejecting references past the registry.
    pub(crate) fn from_parts(
        docs: Vec<DocMeta>,
        terms: BTreeMap<String, Vec<Posting>>,
        titleterms: BTreeMap<String, Vec<DocId>>,
        analyzer: AnalyzerConfig,
    ) -> Result<Self, DecodeError> {
        let num_docs = docs.len();
        let mut checked_terms = BTreeMap::new();
        for (term, mut plist) in terms {
            if let Some(p) = plist.iter().find(|p| p.doc_id as usize >= num_docs) {
                return Err(DecodeError::DocOutOfRange { table: "terms", term, doc: p.doc_id, num_docs });
            }
            plist.sort_by_key(|p| p.doc_id);
            plist.dedup_by_key(|p| p.doc_id);
            if !plist.is_empty() {
                checked_terms.insert(term, plist);
            }
        }
        let mut checked_titles = BTreeMap::new();
        for (term, mut ids) in titleterms {
            if let Some(&doc) = ids.iter().find(|&&d| d as usize >= num_docs) {
                return Err(DecodeError::DocOutOfRange { table: "titleterms", term, doc, num_docs });
            }
            ids.sort_unstable();
            ids.dedup();
            if !ids.is_empty() {
                checked_titles.insert(term, ids);
            }
        }
        Ok(Self { docs, terms: checked_terms, titleterms: checked_titles, analyzer })
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn into_parts(
        self,
    ) -> (Vec<DocMeta>, BTreeMap<String, Vec<Posting>>, BTreeMap<String, Vec<DocId>>, AnalyzerConfig) {
        (self.docs, self.terms, self.titleterms, self.analyzer)
    }

    pub fn num_docs(&self) -> usize { self.docs.len() }

    pub fn num_terms(&self) -> usize { self.terms.len() }

    pub fn docs(&self) -> &[DocMeta] { &self.docs }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocMeta> { self.docs.get(doc_id as usize) }

    pub fn analyzer_config(&self) -> &AnalyzerConfig { &self.analyzer }

    pub fn analyzer(&self) -> Analyzer { Analyzer::new(self.analyzer) }

    /// Body postings of an already normalized term.
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.terms.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Documents whose title contains the already normalized term.
    pub fn title_postings(&self, term: &str) -> &[DocId] {
        self.titleterms.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &[Posting])> {
        self.terms.iter().map(|(t, p)| (t.as_str(), p.as_slice()))
    }

    pub fn titleterms(&self) -> impl Iterator<Item = (&str, &[DocId])> {
        self.titleterms.iter().map(|(t, d)| (t.as_str(), d.as_slice()))
    }

    /// Body terms starting with `prefix`, excluding `prefix` itself.
    pub(crate) fn terms_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a [Posting])> + 'a {
        self.terms
            .range::<str, _>((std::ops::Bound::Excluded(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(t, _)| t.starts_with(prefix))
            .map(|(t, p)| (t.as_str(), p.as_slice()))
    }

    pub(crate) fn titleterms_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a [DocId])> + 'a {
        self.titleterms
            .range::<str, _>((std::ops::Bound::Excluded(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(t, _)| t.starts_with(prefix))
            .map(|(t, d)| (t.as_str(), d.as_slice()))
    }
}

/// Accumulates documents and computes normalized TF-IDF weights on `finish`.
pub struct IndexBuilder {
    analyzer: Analyzer,
    docs: Vec<DocMeta>,
    postings_raw: BTreeMap<String, Vec<(DocId, u32)>>,
    titleterms: BTreeMap<String, Vec<DocId>>,
}

impl IndexBuilder {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { analyzer: Analyzer::new(config), docs: Vec::new(), postings_raw: BTreeMap::new(), titleterms: BTreeMap::new() }
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    /// Register a document and return its id. Ids are assigned in insertion order.
    pub fn add(&mut self, doc: SourceDocument) -> DocId {
        let doc_id = self.docs.len() as DocId;

        let mut tf_counts: HashMap<String, u32> = HashMap::new();
        for (term, _pos) in self.analyzer.tokenize(&doc.body) {
            *tf_counts.entry(term).or_insert(0) += 1;
        }
        for (term, tf_raw) in tf_counts {
            self.postings_raw.entry(term).or_default().push((doc_id, tf_raw));
        }
        for term in self.analyzer.terms(&doc.title) {
            self.titleterms.entry(term).or_default().push(doc_id);
        }

        let filename = doc.filename.unwrap_or_else(|| doc.name.clone());
        self.docs.push(DocMeta { name: doc.name, title: doc.title, filename });
        doc_id
    }

    pub fn finish(self) -> InvertedIndex {
        let n = self.docs.len().max(1) as f32;
        let smoothed_idf = self.analyzer.config().smoothed_idf;

        // First pass: tf-idf per posting and per-document vector norms
        let mut doc_norms: Vec<f32> = vec![0.0; self.docs.len()];
        let mut weighted: BTreeMap<String, Vec<(DocId, f32)>> = BTreeMap::new();
        for (term, plist) in self.postings_raw {
            let df_t = plist.len().max(1) as f32;
            let idf = if smoothed_idf { (1.0 + n / df_t).ln() } else { (n / df_t).ln() };
            let out = plist
                .into_iter()
                .map(|(doc_id, tf_raw)| {
                    let tf = if tf_raw > 0 { 1.0 + (tf_raw as f32).ln() } else { 0.0 };
                    let tfidf = tf * idf;
                    doc_norms[doc_id as usize] += tfidf * tfidf;
                    (doc_id, tfidf)
                })
                .collect();
            weighted.insert(term, out);
        }
        for dn in doc_norms.iter_mut() {
            *dn = dn.sqrt();
            if *dn == 0.0 { *dn = 1.0; }
        }

        // Second pass: normalize. Documents were added in id order, so lists are already sorted.
        let terms = weighted
            .into_iter()
            .map(|(term, plist)| {
                let postings = plist
                    .into_iter()
                    .map(|(doc_id, tfidf)| Posting { doc_id, weight: tfidf / doc_norms[doc_id as usize] })
                    .collect();
                (term, postings)
            })
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(num_docs = self.docs.len(), num_terms = terms.len(), "built inverted index");
        InvertedIndex { docs: self.docs, terms, titleterms: self.titleterms, analyzer: *self.analyzer.config() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvertedIndex {
        InvertedIndex::build(vec![
            ("a", "A", "fisher exact test"),
            ("b", "B", "stochastic block model"),
        ])
    }

    #[test]
    fn builds_registry_in_input_order() {
        let idx = sample();
        assert_eq!(idx.num_docs(), 2);
        assert_eq!(idx.doc(0).unwrap().name, "a");
        assert_eq!(idx.doc(1).unwrap().title, "B");
        assert_eq!(idx.doc(1).unwrap().filename, "b");
        assert!(idx.doc(2).is_none());
    }

    #[test]
    fn each_document_appears_once_per_term() {
        let idx = InvertedIndex::build(vec![("a", "A", "test test test"), ("b", "B", "a test")]);
        let ids: Vec<DocId> = idx.postings("test").iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn repeated_terms_weigh_more() {
        let idx = InvertedIndex::build(vec![
            ("a", "A", "graph graph graph model"),
            ("b", "B", "graph model embedding spectral"),
        ]);
        let p = idx.postings("graph");
        assert!(p[0].weight > p[1].weight);
    }

    #[test]
    fn title_terms_are_indexed_separately() {
        let idx = InvertedIndex::build(vec![("er", "A density-based test", "erdos renyi")]);
        assert_eq!(idx.title_postings("densiti"), &[0]);
        assert!(idx.postings("densiti").is_empty());
    }

    #[test]
    fn empty_body_still_registers_document() {
        let idx = InvertedIndex::build(vec![("landing", "Welcome", "")]);
        assert_eq!(idx.num_docs(), 1);
        assert_eq!(idx.num_terms(), 0);
        assert_eq!(idx.title_postings("welcom"), &[0]);
    }

    #[test]
    fn from_parts_rejects_out_of_range_docs() {
        let docs = vec![DocMeta { name: "a".into(), title: "A".into(), filename: "a".into() }];
        let mut terms = BTreeMap::new();
        terms.insert("x".to_string(), vec![Posting { doc_id: 3, weight: 1.0 }]);
        let err = InvertedIndex::from_parts(docs, terms, BTreeMap::new(), AnalyzerConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::DocOutOfRange { doc: 3, num_docs: 1, .. }));
    }

    #[test]
    fn prefix_iteration_skips_exact_term() {
        let idx = InvertedIndex::build(vec![("a", "A", "hypothesis hypergeometric hyper")]);
        let found: Vec<&str> = idx.terms_with_prefix("hyper").map(|(t, _)| t).collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].starts_with("hypergeom"));
    }
}
