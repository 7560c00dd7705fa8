use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::Reconciler;
use crate::models::NoteTypeDigest;
use crate::note::NoteBuilder;
use crate::vault::Vault;

/// Keeps one template document per note type in the templates folder
pub struct TemplateWriter<'a> {
    vault: &'a Vault,
    templates_dir: PathBuf,
    builder: NoteBuilder,
}

impl<'a> TemplateWriter<'a> {
    /// `templates_dir` is relative to the vault root
    pub fn new(vault: &'a Vault, templates_dir: impl Into<PathBuf>, builder: NoteBuilder) -> Self {
        Self {
            vault,
            templates_dir: templates_dir.into(),
            builder,
        }
    }

    /// Vault-relative path of a note type's template
    pub fn template_path(&self, name: &str) -> PathBuf {
        let file_name = name.replace(['/', '\\'], "-");
        self.templates_dir.join(format!("{}.md", file_name))
    }

    fn folder(&self) -> String {
        self.templates_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn remove(&self, path: &Path) {
        match self.vault.delete(path) {
            Ok(true) => debug!("Removed template {:?}", path),
            Ok(false) => {}
            Err(e) => warn!("Failed to remove template {:?}: {}", path, e),
        }
    }
}

#[async_trait]
impl Reconciler<NoteTypeDigest> for TemplateWriter<'_> {
    async fn apply(&self, id: i64, value: &NoteTypeDigest, previous: Option<&NoteTypeDigest>) -> bool {
        let note = self.builder.template_note(id, value, &self.folder());
        let path = self.template_path(&value.name);

        let text = match self.builder.serialize(&note) {
            Ok(text) => text,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };
        if let Err(e) = self.vault.write(&path, &text) {
            warn!("Failed to write template for {}: {}", value.name, e);
            return false;
        }
        debug!("Wrote template {:?}", path);

        if let Some(previous) = previous.filter(|p| p.name != value.name) {
            self.remove(&self.template_path(&previous.name));
        }
        true
    }

    async fn evict(&self, _id: i64, value: &NoteTypeDigest) {
        self.remove(&self.template_path(&value.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DigestStore;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn note_type(name: &str) -> NoteTypeDigest {
        NoteTypeDigest {
            name: name.to_string(),
            field_names: vec!["Front".to_string(), "Back".to_string()],
        }
    }

    #[tokio::test]
    async fn test_writes_templates() {
        let temp_dir = TempDir::new().unwrap();
        let vault = Vault::new(temp_dir.path());
        let writer = TemplateWriter::new(&vault, "Templates", NoteBuilder::default());

        let mut store = DigestStore::new();
        let outcome = store
            .reconcile(BTreeMap::from([(1, note_type("Basic"))]), &writer)
            .await;

        assert_eq!(outcome.applied, vec![1]);
        let text = fs::read_to_string(temp_dir.path().join("Templates/Basic.md")).unwrap();
        assert!(text.starts_with("---\nmid: 1\nnid: 0\ntags: []\n"));
        assert!(text.contains("{{date}} {{time}}"));
    }

    #[tokio::test]
    async fn test_rename_removes_stale_template() {
        let temp_dir = TempDir::new().unwrap();
        let vault = Vault::new(temp_dir.path());
        let writer = TemplateWriter::new(&vault, "Templates", NoteBuilder::default());

        let mut store = DigestStore::new();
        store
            .reconcile(BTreeMap::from([(1, note_type("Basic"))]), &writer)
            .await;
        store
            .reconcile(BTreeMap::from([(1, note_type("Simple"))]), &writer)
            .await;

        assert!(!temp_dir.path().join("Templates/Basic.md").exists());
        assert!(temp_dir.path().join("Templates/Simple.md").exists());
        assert_eq!(store.get(1).map(|d| d.name.as_str()), Some("Simple"));
    }

    #[tokio::test]
    async fn test_evict_deletes_template() {
        let temp_dir = TempDir::new().unwrap();
        let vault = Vault::new(temp_dir.path());
        let writer = TemplateWriter::new(&vault, "Templates", NoteBuilder::default());

        let mut store = DigestStore::new();
        store
            .reconcile(BTreeMap::from([(1, note_type("Basic")), (2, note_type("Cloze"))]), &writer)
            .await;
        let outcome = store
            .reconcile(BTreeMap::from([(1, note_type("Basic"))]), &writer)
            .await;

        assert_eq!(outcome.evicted, vec![2]);
        assert!(!temp_dir.path().join("Templates/Cloze.md").exists());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_previous() {
        let temp_dir = TempDir::new().unwrap();
        // A file where the templates folder should be
        fs::write(temp_dir.path().join("Templates"), "").unwrap();
        let vault = Vault::new(temp_dir.path());
        let writer = TemplateWriter::new(&vault, "Templates", NoteBuilder::default());

        let mut store = DigestStore::from_map(BTreeMap::from([(1, note_type("Basic"))]));
        let mut changed = note_type("Basic");
        changed.field_names.push("Extra".to_string());
        let outcome = store
            .reconcile(BTreeMap::from([(1, changed)]), &writer)
            .await;

        assert_eq!(outcome.failed, vec![1]);
        assert_eq!(store.get(1).map(|d| d.field_names.len()), Some(2));
    }

    #[test]
    fn test_template_path_sanitizes_separators() {
        let vault = Vault::new("/vault");
        let writer = TemplateWriter::new(&vault, "T", NoteBuilder::default());
        assert_eq!(writer.template_path("a/b"), PathBuf::from("T/a-b.md"));
    }
}
