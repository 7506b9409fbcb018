use crate::codec::{self, EncodeOptions, BINARY_VERSION};
use crate::error::{DecodeError, Error, Result};
use crate::index::{DocId, InvertedIndex};
use crate::tokenizer::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, remove_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

impl MetaFile {
    pub fn for_index(index: &InvertedIndex, created_at: impl Into<String>) -> Self {
        Self {
            num_docs: index.num_docs() as u32,
            num_terms: index.num_terms() as u32,
            created_at: created_at.into(),
            version: BINARY_VERSION,
            analyzer: *index.analyzer_config(),
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn searchindex_js(&self) -> PathBuf { self.root.join("searchindex.js") }
    pub fn texts_dir(&self) -> PathBuf { self.root.join("texts") }
    /// Relative path to the stored full text for snippet extraction, e.g. texts/{doc_id}.txt
    pub fn text_rel(doc_id: DocId) -> String { format!("texts/{doc_id}.txt") }
    pub fn text(&self, doc_id: DocId) -> PathBuf { self.root.join(Self::text_rel(doc_id)) }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_string(path: &Path) -> Result<String> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    Ok(buf)
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let bytes = codec::encode_binary(index).map_err(Error::EncodeBinary)?;
    let mut f = File::create(paths.index())?;
    f.write_all(&bytes)?;
    Ok(())
}

/// Load `index.bin`, refusing indexes whose `meta.json` advertises another version.
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    if meta.version != BINARY_VERSION {
        return Err(DecodeError::UnsupportedVersion { found: meta.version, expected: BINARY_VERSION }.into());
    }
    let bytes = read_bytes(&paths.index())?;
    let index = codec::decode_binary(&bytes)?;
    tracing::debug!(root = %paths.root.display(), num_docs = index.num_docs(), "loaded index");
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta).map_err(Error::EncodeJson)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let buf = read_string(&paths.meta())?;
    let meta: MetaFile = serde_json::from_str(&buf).map_err(DecodeError::from)?;
    Ok(meta)
}

pub fn save_searchindex_js(paths: &IndexPaths, index: &InvertedIndex, opts: EncodeOptions) -> Result<()> {
    create_dir_all(&paths.root)?;
    let js = codec::encode_js(index, opts).map_err(Error::EncodeJson)?;
    let mut f = File::create(paths.searchindex_js())?;
    f.write_all(js.as_bytes())?;
    Ok(())
}

/// Decode a `searchindex.js` file from anywhere on disk.
pub fn load_searchindex_js(path: &Path, analyzer: AnalyzerConfig) -> Result<InvertedIndex> {
    let text = read_string(path)?;
    Ok(codec::decode(&text, analyzer)?)
}

pub fn save_text(paths: &IndexPaths, doc_id: DocId, body: &str) -> Result<()> {
    create_dir_all(paths.texts_dir())?;
    let mut f = File::create(paths.text(doc_id))?;
    f.write_all(body.as_bytes())?;
    Ok(())
}

/// Remove stored texts left behind by a previous build in the same directory.
pub fn clear_texts(paths: &IndexPaths) -> Result<()> {
    let dir = paths.texts_dir();
    if dir.exists() {
        remove_dir_all(&dir)?;
    }
    Ok(())
}

/// Stored body text, if the index was built with texts.
pub fn load_text(paths: &IndexPaths, doc_id: DocId) -> Option<String> {
    std::fs::read_to_string(paths.text(doc_id)).ok()
}

/// Write everything the server needs: `index.bin`, `meta.json` and `searchindex.js`.
pub fn save_all(paths: &IndexPaths, index: &InvertedIndex, meta: &MetaFile) -> Result<()> {
    save_index(paths, index)?;
    save_meta(paths, meta)?;
    save_searchindex_js(paths, index, EncodeOptions::default())?;
    Ok(())
}
