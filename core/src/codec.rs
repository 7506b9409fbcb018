//! Wire formats for [`InvertedIndex`].
//!
//! * The Sphinx `searchindex.js` shape: `Search.setIndex({docnames, filenames,
//!   titles, terms, titleterms, ...})`. Weights are not part of it.
//! * A versioned bincode envelope carrying the full index, weights included.

use crate::error::DecodeError;
use crate::index::{DocId, DocMeta, InvertedIndex, Posting};
use crate::tokenizer::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BINARY_VERSION: u32 = 1;

const JS_PREFIX: &str = "Search.setIndex(";

/// Posting list as it appears on the wire: a bare document index when the term
/// occurs in exactly one document, an array otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum DocRefs {
    One(DocId),
    Many(Vec<DocId>),
}

impl DocRefs {
    fn new(ids: Vec<DocId>, compact: bool) -> Self {
        match ids.as_slice() {
            [single] if compact => DocRefs::One(*single),
            _ => DocRefs::Many(ids),
        }
    }

    fn into_vec(self) -> Vec<DocId> {
        match self {
            DocRefs::One(id) => vec![id],
            DocRefs::Many(ids) => ids,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SphinxIndex {
    docnames: Vec<String>,
    #[serde(default)]
    filenames: Vec<String>,
    titles: Vec<String>,
    terms: BTreeMap<String, DocRefs>,
    #[serde(default)]
    titleterms: BTreeMap<String, DocRefs>,
    #[serde(default)]
    objects: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    objnames: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    objtypes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Write single-document posting lists as a bare integer
    pub compact: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self { Self { compact: true } }
}

fn to_sphinx(index: &InvertedIndex, opts: EncodeOptions) -> SphinxIndex {
    let docs = index.docs();
    SphinxIndex {
        docnames: docs.iter().map(|d| d.name.clone()).collect(),
        filenames: docs.iter().map(|d| d.filename.clone()).collect(),
        titles: docs.iter().map(|d| d.title.clone()).collect(),
        terms: index
            .terms()
            .map(|(t, p)| (t.to_string(), DocRefs::new(p.iter().map(|p| p.doc_id).collect(), opts.compact)))
            .collect(),
        titleterms: index
            .titleterms()
            .map(|(t, d)| (t.to_string(), DocRefs::new(d.to_vec(), opts.compact)))
            .collect(),
        objects: Default::default(),
        objnames: Default::default(),
        objtypes: Default::default(),
    }
}

/// The bare JSON object, without the `Search.setIndex(...)` call around it.
pub fn encode_json(index: &InvertedIndex, opts: EncodeOptions) -> Result<String, serde_json::Error> {
    serde_json::to_string(&to_sphinx(index, opts))
}

/// A loadable `searchindex.js` body.
pub fn encode_js(index: &InvertedIndex, opts: EncodeOptions) -> Result<String, serde_json::Error> {
    Ok(format!("{JS_PREFIX}{})", encode_json(index, opts)?))
}

/// Decode a `searchindex.js` file or its bare JSON object.
///
/// JavaScript-style unquoted object keys are accepted, unknown fields are
/// ignored, and every posting list is normalized to a sorted set. The analyzer
/// settings are not part of this format; `analyzer` is recorded as the one the
/// terms were produced with.
pub fn decode(text: &str, analyzer: AnalyzerConfig) -> Result<InvertedIndex, DecodeError> {
    let body = unwrap_js(text)?;
    let json = quote_bare_keys(body);
    let raw: SphinxIndex = serde_json::from_str(&json)?;

    let num_docs = raw.docnames.len();
    if raw.titles.len() != num_docs {
        return Err(DecodeError::LengthMismatch { field: "titles", expected: num_docs, found: raw.titles.len() });
    }
    let filenames = if raw.filenames.is_empty() {
        raw.docnames.clone()
    } else if raw.filenames.len() != num_docs {
        return Err(DecodeError::LengthMismatch { field: "filenames", expected: num_docs, found: raw.filenames.len() });
    } else {
        raw.filenames
    };

    let docs = raw
        .docnames
        .into_iter()
        .zip(raw.titles)
        .zip(filenames)
        .map(|((name, title), filename)| DocMeta { name, title, filename })
        .collect();
    // Sphinx keeps some keys capitalized (`A`, `The`); queries are lowercased,
    // so fold keys and merge the lists that collide.
    let mut terms: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
    for (t, refs) in raw.terms {
        terms
            .entry(t.to_lowercase())
            .or_default()
            .extend(refs.into_vec().into_iter().map(|doc_id| Posting { doc_id, weight: 1.0 }));
    }
    let mut titleterms: BTreeMap<String, Vec<DocId>> = BTreeMap::new();
    for (t, refs) in raw.titleterms {
        titleterms.entry(t.to_lowercase()).or_default().extend(refs.into_vec());
    }

    let index = InvertedIndex::from_parts(docs, terms, titleterms, analyzer)?;
    tracing::debug!(num_docs = index.num_docs(), num_terms = index.num_terms(), "decoded searchindex");
    Ok(index)
}

fn unwrap_js(text: &str) -> Result<&str, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }
    let Some(rest) = trimmed.strip_prefix(JS_PREFIX) else {
        return Ok(trimmed);
    };
    let rest = rest.trim_end();
    let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
    rest.strip_suffix(')').ok_or(DecodeError::UnterminatedWrapper)
}

/// Rewrite `{key:` / `,key:` into `{"key":` outside of string literals so the
/// JavaScript object literal Sphinx writes can be read as JSON.
fn quote_bare_keys(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + src.len() / 8);
    let mut chars = src.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                expect_key = false;
                out.push(c);
            }
            '{' | ',' => {
                expect_key = true;
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            c if expect_key && (c.is_alphabetic() || c == '_' || c == '$') => {
                let mut ident = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '$' {
                        ident.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Skip whitespace between the identifier and a possible colon.
                let mut gap = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() {
                        gap.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.peek() == Some(&':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                out.push_str(&gap);
                expect_key = false;
            }
            _ => {
                expect_key = false;
                out.push(c);
            }
        }
    }
    out
}

#[derive(Serialize, Deserialize)]
struct BinaryEnvelope {
    version: u32,
    index: InvertedIndex,
}

#[derive(Serialize)]
struct BinaryEnvelopeRef<'a> {
    version: u32,
    index: &'a InvertedIndex,
}

pub fn encode_binary(index: &InvertedIndex) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(&BinaryEnvelopeRef { version: BINARY_VERSION, index })
}

pub fn decode_binary(bytes: &[u8]) -> Result<InvertedIndex, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let envelope: BinaryEnvelope = bincode::deserialize(bytes)?;
    if envelope.version != BINARY_VERSION {
        return Err(DecodeError::UnsupportedVersion { found: envelope.version, expected: BINARY_VERSION });
    }
    let (docs, terms, titleterms, analyzer) = envelope.index.into_parts();
    InvertedIndex::from_parts(docs, terms, titleterms, analyzer)
}
