use searchindex_core::tokenizer::{tokenize, Analyzer, AnalyzerConfig};

#[test]
fn it_normalizes_and_stems() {
    let toks = tokenize("Running Runners RUN! The ﬁsher test.");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // NFKC folds the "ﬁ" ligature
    assert!(words.contains(&"fisher".to_string()));
}

#[test]
fn it_filters_stopwords_when_enabled() {
    let analyzer = Analyzer::new(AnalyzerConfig { stopwords: true, ..Default::default() });
    let words: Vec<String> = analyzer.tokenize("The quick brown fox and the lazy dog").into_iter().map(|(w, _)| w).collect();
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(words.contains(&"fox".to_string()));
}

#[test]
fn default_keeps_stopwords() {
    let words: Vec<String> = tokenize("the null model").into_iter().map(|(w, _)| w).collect();
    assert_eq!(words, vec!["the", "null", "model"]);
}

#[test]
fn terms_are_distinct_and_ordered() {
    let analyzer = Analyzer::default();
    assert_eq!(analyzer.terms("block model, Block MODEL"), vec!["block".to_string(), "model".to_string()]);
}
