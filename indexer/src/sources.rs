use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use searchindex_core::SourceDocument;
use serde::Deserialize;
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(alias = "id")]
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    filename: Option<String>,
}

impl From<InputDoc> for SourceDocument {
    fn from(doc: InputDoc) -> Self {
        let title = if doc.title.trim().is_empty() { doc.name.clone() } else { doc.title };
        SourceDocument { name: doc.name, title, body: doc.body, filename: doc.filename }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Json,
    JsonLines,
    Html,
    Text,
}

impl SourceKind {
    fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str())? {
            "json" => Some(Self::Json),
            "jsonl" => Some(Self::JsonLines),
            "html" | "htm" => Some(Self::Html),
            "md" | "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Input files under `input` in a stable (sorted) order, plus the root that
/// document names are made relative to.
pub fn collect_files(input: &Path) -> (PathBuf, Vec<PathBuf>) {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && SourceKind::of(p).is_some() {
                files.push(p.to_path_buf());
            }
        }
        (input.to_path_buf(), files)
    } else {
        if input.is_file() {
            files.push(input.to_path_buf());
        }
        let root = input.parent().map(Path::to_path_buf).unwrap_or_default();
        (root, files)
    }
}

/// Read every document in `file`. Records that fail to parse are skipped.
pub fn read_documents(root: &Path, file: &Path) -> Result<Vec<SourceDocument>> {
    let kind = SourceKind::of(file).ok_or_else(|| anyhow!("unsupported input file {}", file.display()))?;
    match kind {
        SourceKind::JsonLines => read_jsonl(file),
        SourceKind::Json => read_json(file),
        SourceKind::Html => {
            let (name, filename) = doc_name(root, file);
            let html = fs::read_to_string(file)?;
            Ok(vec![html_document(name, filename, &html)?])
        }
        SourceKind::Text => {
            let (name, filename) = doc_name(root, file);
            let text = fs::read_to_string(file)?;
            Ok(vec![text_document(name, filename, text)])
        }
    }
}

fn read_jsonl(file: &Path) -> Result<Vec<SourceDocument>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let mut docs = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<InputDoc>(&line) {
            Ok(doc) => docs.push(doc.into()),
            Err(err) => tracing::warn!(file = %file.display(), line = lineno + 1, %err, "skipping malformed record"),
        }
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<SourceDocument>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => Vec::new(),
    };
    let mut docs = Vec::new();
    for (i, v) in values.into_iter().enumerate() {
        match serde_json::from_value::<InputDoc>(v) {
            Ok(doc) => docs.push(doc.into()),
            Err(err) => tracing::warn!(file = %file.display(), record = i, %err, "skipping malformed record"),
        }
    }
    Ok(docs)
}

/// `(name, filename)` for a file: the path relative to `root` with and without
/// its extension, always `/`-separated.
fn doc_name(root: &Path, file: &Path) -> (String, String) {
    let rel = file.strip_prefix(root).unwrap_or(file);
    let filename = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
    let name = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() && !stem.ends_with('/') => stem.to_string(),
        _ => filename.clone(),
    };
    (name, filename)
}

pub fn html_document(name: String, filename: String, html: &str) -> Result<SourceDocument> {
    let sel_title = Selector::parse("title").map_err(|e| anyhow!("invalid selector: {e:?}"))?;
    let sel_h1 = Selector::parse("h1").map_err(|e| anyhow!("invalid selector: {e:?}"))?;
    let sel_body = Selector::parse("body").map_err(|e| anyhow!("invalid selector: {e:?}"))?;

    let doc = Html::parse_document(html);
    let text_of = |sel: &Selector| {
        doc.select(sel)
            .next()
            .map(|n| n.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
    };
    let title = text_of(&sel_title).or_else(|| text_of(&sel_h1)).unwrap_or_else(|| name.clone());
    let body = text_of(&sel_body).unwrap_or_default();
    Ok(SourceDocument { name, title, body, filename: Some(filename) })
}

/// Markdown or plain text: the first heading (or first non-empty line) is the title.
pub fn text_document(name: String, filename: String, text: String) -> SourceDocument {
    let heading = text
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim().to_string());
    let first_line = || text.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string);
    let title = heading.filter(|t| !t.is_empty()).or_else(first_line).unwrap_or_else(|| name.clone());
    SourceDocument { name, title, body: text, filename: Some(filename) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn html_title_and_body_text() {
        let html = "<html><head><title>A group-based test</title></head>\
                    <body><h1>A group-based test</h1><p>Stochastic <b>block</b> model.</p></body></html>";
        let doc = html_document("sbm_test".into(), "sbm_test.html".into(), html).unwrap();
        assert_eq!(doc.title, "A group-based test");
        assert!(doc.body.contains("Stochastic block model."));
    }

    #[test]
    fn html_without_title_falls_back_to_h1() {
        let html = "<body><h1>Outline</h1><p>text</p></body>";
        let doc = html_document("outline".into(), "outline.html".into(), html).unwrap();
        assert_eq!(doc.title, "Outline");
    }

    #[test]
    fn markdown_title_from_heading() {
        let doc = text_document("introduction".into(), "introduction.md".into(), "\n# Introduction\n\nConnectomes.".into());
        assert_eq!(doc.title, "Introduction");
        let doc = text_document("notes".into(), "notes.txt".into(), "  \nfirst line\nsecond".into());
        assert_eq!(doc.title, "first line");
    }

    #[test]
    fn names_are_relative_without_extension() {
        let root = Path::new("/site");
        assert_eq!(
            doc_name(root, Path::new("/site/nested/sbm_test.html")),
            ("nested/sbm_test".to_string(), "nested/sbm_test.html".to_string())
        );
    }

    #[test]
    fn malformed_jsonl_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("docs.jsonl");
        fs::write(
            &file,
            "{\"id\":\"a\",\"title\":\"A\",\"body\":\"fisher exact test\"}\nnot json\n\n{\"name\":\"b\",\"body\":\"block\"}\n",
        )
        .unwrap();
        let docs = read_documents(dir.path(), &file).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, "a");
        assert_eq!(docs[1].title, "b");
    }

    #[test]
    fn collects_supported_files_in_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "# B").unwrap();
        fs::write(dir.path().join("a.html"), "<title>A</title>").unwrap();
        fs::write(dir.path().join("ignored.png"), [0u8, 1]).unwrap();
        let (root, files) = collect_files(dir.path());
        assert_eq!(root, dir.path());
        let names: Vec<_> = files.iter().map(|f| f.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["a.html", "b.md"]);
    }
}
