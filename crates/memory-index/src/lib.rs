//! Markdown indexer (spec §4.10): walk a directory for `.md` files,
//! parse each into a heading tree, chunk sections to `chunk_size`/
//! `chunk_overlap`, and feed the store with `source = "file:PATH"`
//! provenance. File-walking and section parsing are explicitly external
//! collaborators per the spec's non-goals, so this stays a thin,
//! lightly-tested layer over the store/embedder contract rather than a
//! second capture pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use memory_core::config::EngineConfig;
use memory_core::errors::{MemoryError, MemoryResult};
use memory_core::model::{MemoryRecord, MemoryType, Scope, Visibility};
use memory_core::traits::{Embedder, MemoryStore};
use memory_metrics::Metrics;

/// Recursively collect every `.md` file under `root`, following the
/// teacher's plain-`std::fs` recursion idiom rather than pulling in a
/// directory-walking crate.
pub fn walk_markdown_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    walk_into(root, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk_into(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            walk_into(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
            out.push(path);
        }
    }
    Ok(())
}

/// One node of a markdown heading tree: a title (empty for the
/// document's preamble), the body text directly under that heading
/// (before any subheading), and child sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub level: usize,
    pub body: String,
    pub children: Vec<Section>,
}

/// Parse a markdown document into a tree of ATX (`#`-prefixed) headings.
/// Content before the first heading becomes the root's own body.
pub fn parse_sections(text: &str) -> Section {
    let mut root = Section {
        title: String::new(),
        level: 0,
        body: String::new(),
        children: Vec::new(),
    };
    // Stack of (level, index-path) is unnecessary here: we walk lines
    // once, maintaining a stack of open sections by level.
    let mut stack: Vec<Section> = vec![root.clone()];

    for line in text.lines() {
        if let Some(level) = heading_level(line) {
            let title = line.trim_start_matches('#').trim().to_string();
            while stack.len() > 1 && stack.last().map(|s| s.level).unwrap_or(0) >= level {
                let finished = stack.pop().expect("stack non-empty by loop guard");
                let parent = stack.last_mut().expect("root never popped");
                parent.children.push(finished);
            }
            stack.push(Section {
                title,
                level,
                body: String::new(),
                children: Vec::new(),
            });
        } else {
            let current = stack.last_mut().expect("root never popped");
            current.body.push_str(line);
            current.body.push('\n');
        }
    }

    while stack.len() > 1 {
        let finished = stack.pop().expect("stack non-empty by loop guard");
        let parent = stack.last_mut().expect("root never popped");
        parent.children.push(finished);
    }
    root = stack.pop().expect("root always present");
    root
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if rest.is_empty() || rest.starts_with(' ') {
        Some(hashes)
    } else {
        None
    }
}

/// Flatten a section tree depth-first into `(heading_path, text)`
/// pairs, one per section that has non-blank body text.
pub fn flatten_sections(section: &Section, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, String)>) {
    if !section.title.is_empty() {
        path.push(section.title.clone());
    }
    if !section.body.trim().is_empty() {
        out.push((path.clone(), section.body.clone()));
    }
    for child in &section.children {
        flatten_sections(child, path, out);
    }
    if !section.title.is_empty() {
        path.pop();
    }
}

/// Split `text` into overlapping chunks of at most `chunk_size`
/// characters, each subsequent chunk starting `chunk_overlap`
/// characters before the previous one ended. `chunk_overlap` is always
/// strictly less than `chunk_size` (enforced by `EngineConfig::validate`
/// at config-load time), so this always makes forward progress.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let stride = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub chunks_seen: usize,
    pub dedup_skipped: usize,
    pub embedding_failed: usize,
    pub stored: usize,
    pub store_errors: usize,
}

pub struct MarkdownIndexer {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    metrics: Arc<Metrics>,
    config: EngineConfig,
}

impl MarkdownIndexer {
    pub fn new(store: Arc<dyn MemoryStore>, embedder: Arc<dyn Embedder>, metrics: Arc<Metrics>, config: EngineConfig) -> Self {
        Self {
            store,
            embedder,
            metrics,
            config,
        }
    }

    /// Walk `root` for markdown files and index every one found.
    pub async fn index_directory(&self, root: &Path, project: &str) -> MemoryResult<IndexReport> {
        let files =
            walk_markdown_files(root).map_err(|e| MemoryError::InvalidInput(format!("directory walk failed: {e}")))?;
        let mut report = IndexReport::default();
        for file in files {
            let file_report = self.index_file(&file, project).await?;
            report.files_scanned += 1;
            report.chunks_seen += file_report.chunks_seen;
            report.dedup_skipped += file_report.dedup_skipped;
            report.embedding_failed += file_report.embedding_failed;
            report.stored += file_report.stored;
            report.store_errors += file_report.store_errors;
        }
        Ok(report)
    }

    /// Index a single markdown file.
    pub async fn index_file(&self, path: &Path, project: &str) -> MemoryResult<IndexReport> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MemoryError::InvalidInput(format!("reading {}: {e}", path.display())))?;
        let root = parse_sections(&text);
        let mut sections = Vec::new();
        flatten_sections(&root, &mut Vec::new(), &mut sections);

        let source = format!("file:{}", path.display());
        let mut report = IndexReport {
            files_scanned: 1,
            ..Default::default()
        };

        for (heading_path, body) in sections {
            for chunk in chunk_text(&body, self.config.chunk_size, self.config.chunk_overlap.max(0) as usize) {
                report.chunks_seen += 1;

                let vector = match self.embedder.embed_one(&chunk).await {
                    Ok(v) => v,
                    Err(err) => {
                        tracing::warn!(error = %err, %source, "embedding failed for indexed chunk, skipping");
                        report.embedding_failed += 1;
                        continue;
                    }
                };

                match self.store.find_duplicates(&vector, self.config.dedup_threshold as f32).await {
                    Ok(hits) if !hits.is_empty() => {
                        self.metrics.record_dedup_skipped();
                        report.dedup_skipped += 1;
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "duplicate check failed for indexed chunk, proceeding anyway");
                    }
                    _ => {}
                }

                let mut record = MemoryRecord::new(chunk, MemoryType::Fact, Scope::Project);
                record.visibility = Visibility::Private;
                record.source = source.clone();
                record.project = project.to_string();
                record.tags = heading_path.clone();

                match self.store.upsert(&record, &vector).await {
                    Ok(()) => {
                        self.metrics.record_capture_stored();
                        report.stored += 1;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, id = %record.id, "failed to store indexed chunk, continuing");
                        report.store_errors += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}
