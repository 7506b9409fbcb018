use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use searchindex_core::persist::{clear_texts, load_index, save_all, save_text, IndexPaths, MetaFile};
use searchindex_core::{AnalyzerConfig, IndexBuilder, MatchMode, QueryOptions};
use tracing_subscriber::{EnvFilter, fmt};

use std::path::{Path, PathBuf};

mod sources;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, import and query documentation search indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct AnalyzerArgs {
    /// Index words as written instead of their English stems
    #[arg(long, default_value_t = false)]
    no_stem: bool,
    /// Drop English stopwords from documents and queries
    #[arg(long, default_value_t = false)]
    stopwords: bool,
    /// Use IDF = ln(N/df) instead of the smoothed ln(1 + N/df)
    #[arg(long, default_value_t = false)]
    raw_idf: bool,
}

impl From<AnalyzerArgs> for AnalyzerConfig {
    fn from(args: AnalyzerArgs) -> Self {
        AnalyzerConfig { stem: !args.no_stem, stopwords: args.stopwords, smoothed_idf: !args.raw_idf }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from JSON/JSONL/HTML/Markdown files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        analyzer: AnalyzerArgs,
        /// Do not store document texts for snippets
        #[arg(long, default_value_t = false)]
        no_texts: bool,
    },
    /// Convert an existing searchindex.js into an index directory
    Import {
        /// Path to searchindex.js
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        // must match the analyzer the imported terms were produced with
        #[command(flatten)]
        analyzer: AnalyzerArgs,
    },
    /// Run a query against an index directory
    Query {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Match documents containing any term instead of all terms
        #[arg(long, default_value_t = false)]
        any: bool,
        /// Disable prefix expansion of query terms
        #[arg(long, default_value_t = false)]
        no_partial: bool,
        /// Maximum number of hits to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Query text; prefix a word with '-' to exclude it
        #[arg(required = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, analyzer, no_texts } => {
            build_index(&input, &output, analyzer.into(), !no_texts)
        }
        Commands::Import { input, output, analyzer } => import_index(&input, &output, analyzer.into()),
        Commands::Query { index, any, no_partial, limit, text } => {
            let opts = QueryOptions {
                mode: if any { MatchMode::Any } else { MatchMode::All },
                partial: !no_partial,
                limit: Some(limit.max(1)),
                ..Default::default()
            };
            run_query(&index, &text.join(" "), &opts)
        }
    }
}

fn created_at() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

fn build_index(input: &Path, output: &Path, config: AnalyzerConfig, store_texts: bool) -> Result<()> {
    let out_paths = IndexPaths::new(output);
    clear_texts(&out_paths).with_context(|| format!("clearing old texts in {}", output.display()))?;
    let (root, files) = sources::collect_files(input);
    if files.is_empty() {
        tracing::warn!(input = %input.display(), "no input files found");
    }

    let mut builder = IndexBuilder::new(config);
    for file in files {
        let docs = match sources::read_documents(&root, &file) {
            Ok(docs) => docs,
            Err(err) => {
                tracing::warn!(file = %file.display(), %err, "skipping unreadable input");
                continue;
            }
        };
        for doc in docs {
            let body = doc.body.clone();
            let doc_id = builder.add(doc);
            if store_texts {
                save_text(&out_paths, doc_id, &body)
                    .with_context(|| format!("writing text for document {doc_id}"))?;
            }
        }
    }
    tracing::info!(num_docs = builder.len(), "ingested documents");

    let index = builder.finish();
    let meta = MetaFile::for_index(&index, created_at());
    save_all(&out_paths, &index, &meta).with_context(|| format!("writing index to {}", output.display()))?;

    tracing::info!(output = %output.display(), num_terms = index.num_terms(), "index build complete");
    Ok(())
}

fn import_index(input: &Path, output: &Path, config: AnalyzerConfig) -> Result<()> {
    let index = searchindex_core::persist::load_searchindex_js(input, config)
        .with_context(|| format!("reading {}", input.display()))?;
    let out_paths = IndexPaths::new(output);
    clear_texts(&out_paths).with_context(|| format!("clearing old texts in {}", output.display()))?;
    let meta = MetaFile::for_index(&index, created_at());
    save_all(&out_paths, &index, &meta).with_context(|| format!("writing index to {}", output.display()))?;
    tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "import complete");
    Ok(())
}

fn run_query(index_dir: &Path, text: &str, opts: &QueryOptions) -> Result<()> {
    let index = load_index(&IndexPaths::new(index_dir))
        .with_context(|| format!("loading index from {}", index_dir.display()))?;
    let hits = index.search(text, opts);
    if hits.is_empty() {
        println!("no results for {text:?}");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        if let Some(doc) = index.doc(hit.doc_id) {
            println!("{:>3}. {:>7.2}  {}  ({})", rank + 1, hit.score, doc.title, doc.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchindex_core::persist::{load_text, save_searchindex_js};
    use searchindex_core::{EncodeOptions, InvertedIndex};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn rebuild_without_texts_drops_previous_texts() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("sbm_test.md"), "# A group-based test\nstochastic block model").unwrap();
        fs::write(second.join("outline.md"), "# Outline\ntable of contents").unwrap();
        let out = dir.path().join("index");
        let paths = IndexPaths::new(&out);

        build_index(&first, &out, AnalyzerConfig::default(), true).unwrap();
        assert!(load_text(&paths, 0).unwrap().contains("block"));

        build_index(&second, &out, AnalyzerConfig::default(), false).unwrap();
        assert_eq!(load_text(&paths, 0), None);
        assert_eq!(load_index(&paths).unwrap().doc(0).unwrap().name, "outline");
    }

    #[test]
    fn import_into_used_directory_drops_previous_texts() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("site");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("landing.md"), "# Welcome\nconnectome").unwrap();
        let out = dir.path().join("index");
        let paths = IndexPaths::new(&out);
        build_index(&input, &out, AnalyzerConfig::default(), true).unwrap();

        let other = IndexPaths::new(dir.path().join("export"));
        let index = InvertedIndex::build(vec![("intro", "Introduction", "hemisphere networks")]);
        save_searchindex_js(&other, &index, EncodeOptions::default()).unwrap();

        import_index(&other.searchindex_js(), &out, AnalyzerConfig::default()).unwrap();
        assert_eq!(load_text(&paths, 0), None);
        assert_eq!(load_index(&paths).unwrap().query("hemisphere"), vec![0]);
    }
}
