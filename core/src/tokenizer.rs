use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}_][\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Settings shared by index build and query analysis.
///
/// Persisted next to the index so a loaded index analyzes queries exactly the
/// way its documents were analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_true")]
    pub stem: bool,
    #[serde(default)]
    pub stopwords: bool,
    /// Use smoothed IDF = ln(1 + N/df) instead of ln(N/df)
    #[serde(default = "default_true")]
    pub smoothed_idf: bool,
}

fn default_true() -> bool { true }

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { stem: true, stopwords: false, smoothed_idf: true }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self { Self { config } }

    pub fn config(&self) -> &AnalyzerConfig { &self.config }

    /// Tokenize text into (term, position) using NFKC normalization, lowercase, and
    /// the optional stopword and stemming stages. Positions count every word seen,
    /// including dropped stopwords.
    pub fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for (pos, mat) in RE.find_iter(&normalized).enumerate() {
            let token = mat.as_str();
            if self.config.stopwords && is_stopword(token) { continue; }
            let term = if self.config.stem {
                STEMMER.stem(token).into_owned()
            } else {
                token.to_string()
            };
            if term.is_empty() { continue; }
            tokens.push((term, pos));
        }
        tokens
    }

    /// Distinct terms of `text` in first-occurrence order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tokenize(text)
            .into_iter()
            .map(|(t, _)| t)
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

/// Tokenize with the default analyzer (stemming on, stopwords kept).
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    Analyzer::default().tokenize(text)
}
