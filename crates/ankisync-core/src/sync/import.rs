//! Note type import
//!
//! Mirrors Anki's note types into the state and writes one template document
//! per note type, so new documents can start from the right frontmatter.

use std::collections::BTreeMap;

use tracing::info;

use super::{ImportReport, SyncError, SyncResult, Synchronizer};
use crate::anki::AnkiClient;
use crate::models::NoteTypeDigest;
use crate::note::NoteBuilder;
use crate::state::{DigestStore, TemplateWriter};
use crate::storage::PassLock;

impl<C: AnkiClient> Synchronizer<C> {
    /// Fetch every note type from Anki and refresh the templates
    pub async fn import_note_types(&self) -> SyncResult<ImportReport> {
        let mut state = self.state.try_lock().map_err(|_| SyncError::Busy)?;
        let templates_dir = self.templates_dir.clone().ok_or_else(|| {
            SyncError::Precondition(
                "No templates folder configured; set templates_dir first".to_string(),
            )
        })?;
        let _lock = PassLock::acquire(&self.lock_path)?;
        self.reload(&mut state)?;

        let mut models: Vec<(String, i64)> =
            self.client.model_names_and_ids().await?.into_iter().collect();
        models.sort();

        let names: Vec<String> = models.iter().map(|(name, _)| name.clone()).collect();
        let field_names = self.client.model_field_names_batch(&names).await?;
        info!("Fetched {} note types", names.len());

        let new_state: BTreeMap<i64, NoteTypeDigest> = models
            .into_iter()
            .zip(field_names)
            .map(|((name, id), field_names)| (id, NoteTypeDigest { name, field_names }))
            .collect();

        let mut store = DigestStore::from_map(std::mem::take(&mut state.note_type_state));
        let removed: Vec<String> = store
            .iter()
            .filter(|(id, _)| !new_state.contains_key(id))
            .map(|(_, digest)| digest.name.clone())
            .collect();
        let names_by_id: BTreeMap<i64, String> = new_state
            .iter()
            .map(|(id, digest)| (*id, digest.name.clone()))
            .collect();

        let writer = TemplateWriter::new(
            &self.vault,
            templates_dir,
            NoteBuilder::new(&state.settings),
        );
        let outcome = store.reconcile(new_state, &writer).await;

        state.note_type_state = store.into_map();
        self.persistence.save(&state)?;

        let pick = |ids: &[i64]| -> Vec<String> {
            ids.iter()
                .filter_map(|id| names_by_id.get(id).cloned())
                .collect()
        };
        let report = ImportReport {
            imported: pick(&outcome.applied),
            failed: pick(&outcome.failed),
            removed,
        };
        report.log();
        Ok(report)
    }
}
