//! Markdown vault access
//!
//! A vault is a directory tree of markdown documents. Each document may start
//! with a YAML frontmatter block:
//!
//! ```text
//! ---
//! mid: 1
//! nid: 0
//! tags: [spanish]
//! ---
//! body...
//! ```
//!
//! Documents whose frontmatter carries `nid` are managed by ankisync; all
//! others are ignored by a pass.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::storage::persistence::atomic_write;
use crate::storage::{StorageError, StorageResult};

/// Frontmatter delimiter line
pub const FRONTMATTER_MARKER: &str = "---";

// ![[target]] / ![[target|alias]] / ![[target#heading]]
static WIKI_EMBED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[([^\]]+)\]\]").expect("valid regex"));
// ![alt](target)
static MARKDOWN_EMBED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").expect("valid regex"));

/// An embed found in a document body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    /// Markup exactly as written, e.g. `![[cat.png|200]]`
    pub original: String,
    /// Link target, e.g. `cat.png` or `assets/cat.png`
    pub link: String,
}

/// A markdown document read from the vault
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the vault root
    pub path: PathBuf,
    /// File name without extension
    pub basename: String,
    /// Vault-relative folder, `/`-separated, empty at the root
    pub folder: String,
    /// Raw file content
    pub content: String,
    /// Parsed frontmatter, if the document has a valid block
    pub frontmatter: Option<Mapping>,
    /// Embeds in body order
    pub embeds: Vec<Embed>,
}

impl Document {
    /// Parse a document from its vault-relative path and content
    pub fn parse(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();

        let basename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let folder = path
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();

        let frontmatter = match split_frontmatter(&content) {
            Some((yaml, _)) => match serde_yaml::from_str::<Value>(&yaml) {
                Ok(Value::Mapping(map)) => Some(map),
                Ok(Value::Null) => Some(Mapping::new()),
                Ok(_) => None,
                Err(e) => {
                    warn!("Ignoring invalid frontmatter in {:?}: {}", path, e);
                    None
                }
            },
            None => None,
        };

        let embeds = extract_embeds(&body_lines(&content).join("\n"));

        Self {
            path,
            basename,
            folder,
            content,
            frontmatter,
            embeds,
        }
    }

    /// Body lines following the frontmatter block
    pub fn body_lines(&self) -> Vec<&str> {
        body_lines(&self.content)
    }

    /// Whether this document is managed (frontmatter declares `nid`)
    pub fn is_managed(&self) -> bool {
        self.frontmatter
            .as_ref()
            .is_some_and(|fm| fm.contains_key("nid"))
    }

    /// Note id declared in the frontmatter
    pub fn note_id(&self) -> Option<i64> {
        self.frontmatter
            .as_ref()
            .and_then(|fm| fm.get("nid"))
            .and_then(Value::as_i64)
    }
}

/// Split the frontmatter block off the content
///
/// Returns the YAML text and the index of the first body line.
fn split_frontmatter(content: &str) -> Option<(String, usize)> {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.first().map(|l| l.trim_end()) != Some(FRONTMATTER_MARKER) {
        return None;
    }
    let close = lines
        .iter()
        .skip(1)
        .position(|l| l.trim_end() == FRONTMATTER_MARKER)?
        + 1;
    Some((lines[1..close].join("\n"), close + 1))
}

/// Lines after the frontmatter block (all lines when there is none)
fn body_lines(content: &str) -> Vec<&str> {
    let lines: Vec<&str> = content.split('\n').collect();
    match split_frontmatter(content) {
        Some((_, start)) => lines[start.min(lines.len())..].to_vec(),
        None => lines,
    }
}

/// Find embeds in order of appearance
fn extract_embeds(body: &str) -> Vec<Embed> {
    let mut found: Vec<(usize, Embed)> = Vec::new();

    for cap in WIKI_EMBED_RE.captures_iter(body) {
        let whole = cap.get(0).expect("match 0 always exists");
        let target = &cap[1];
        let link = target
            .split('|')
            .next()
            .unwrap_or(target)
            .split('#')
            .next()
            .unwrap_or(target)
            .trim();
        found.push((
            whole.start(),
            Embed {
                original: whole.as_str().to_string(),
                link: link.to_string(),
            },
        ));
    }

    for cap in MARKDOWN_EMBED_RE.captures_iter(body) {
        let whole = cap.get(0).expect("match 0 always exists");
        let target = cap[1].trim();
        if target.contains("://") {
            continue;
        }
        let link = urlencoding::decode(target)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| target.to_string());
        found.push((
            whole.start(),
            Embed {
                original: whole.as_str().to_string(),
                link,
            },
        ));
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, embed)| embed).collect()
}

/// A directory of markdown documents
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a vault-relative path
    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn exists(&self, relative: &Path) -> bool {
        self.absolute(relative).is_file()
    }

    /// All markdown files, vault-relative, sorted
    ///
    /// Hidden files and folders (`.obsidian`, `.trash`, ...) are skipped.
    pub fn markdown_files(&self) -> StorageResult<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(StorageError::NotFound {
                path: self.root.clone(),
            });
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
            })
            .filter_map(|e| e.path().strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Read and parse one document
    pub fn read_document(&self, relative: &Path) -> StorageResult<Document> {
        let path = self.absolute(relative);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| StorageError::from_read(e, path.clone()))?;
        Ok(Document::parse(relative, content))
    }

    /// Read every document, skipping files under `exclude`
    ///
    /// Unreadable files are logged and skipped.
    pub fn documents(&self, exclude: Option<&Path>) -> StorageResult<Vec<Document>> {
        let mut documents = Vec::new();
        for relative in self.markdown_files()? {
            if exclude.is_some_and(|dir| relative.starts_with(dir)) {
                debug!("Skipping template {:?}", relative);
                continue;
            }
            match self.read_document(&relative) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping unreadable document: {}", e),
            }
        }
        Ok(documents)
    }

    /// Create or overwrite a document
    pub fn write(&self, relative: &Path, content: &str) -> StorageResult<()> {
        atomic_write(&self.absolute(relative), content.as_bytes())
    }

    /// Delete a document; returns false when it didn't exist
    pub fn delete(&self, relative: &Path) -> StorageResult<bool> {
        let path = self.absolute(relative);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io(e, path)),
        }
    }

    /// Resolve an embed link to an existing file inside the vault
    ///
    /// Tries the link as a vault-relative path first, then the first file in
    /// the vault with the same file name. Links that climb out of the vault
    /// (`..`, absolute paths) only get the file-name lookup.
    pub fn resolve_link(&self, link: &str) -> Option<PathBuf> {
        if let Some(direct) = self.contained(Path::new(link)) {
            return Some(direct);
        }

        let wanted = Path::new(link).file_name()?;
        let mut candidates: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == wanted)
            .map(|e| e.into_path())
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }

    /// `relative` under the root, if it names a file that stays inside the vault
    fn contained(&self, relative: &Path) -> Option<PathBuf> {
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !plain {
            return None;
        }

        let path = self.root.join(relative);
        if !path.is_file() {
            return None;
        }
        // Symlinks may still point elsewhere
        let root = self.root.canonicalize().ok()?;
        path.canonicalize().ok()?.starts_with(&root).then_some(path)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
