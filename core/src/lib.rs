//! Full-text search index for statically generated documentation: build it from
//! rendered documents, query it, and read or write the `searchindex.js` and
//! native binary forms.

pub mod codec;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod tokenizer;

pub use codec::{decode, decode_binary, encode_binary, encode_js, encode_json, EncodeOptions};
pub use error::{DecodeError, Error, Result};
pub use index::{DocId, DocMeta, IndexBuilder, InvertedIndex, Posting, SourceDocument};
pub use query::{MatchMode, ParsedQuery, QueryOptions, Scorer, SearchHit};
pub use tokenizer::{tokenize, Analyzer, AnalyzerConfig};
