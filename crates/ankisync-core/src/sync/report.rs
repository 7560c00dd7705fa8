use serde::Serialize;
use tracing::info;

/// What a sync pass did
///
/// Documents are named by their vault-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Documents that got a new note
    pub created: Vec<String>,
    /// Documents whose note fields were updated
    pub modified: Vec<String>,
    /// Note ids deleted because their document is gone
    pub deleted: Vec<i64>,
    /// Documents skipped as unchanged
    pub cached: Vec<String>,
    /// Documents whose note moved to another deck
    pub changed_deck: Vec<String>,
    /// Decks created in Anki
    pub added_decks: Vec<String>,
    /// Anki operations that failed
    pub errors: Vec<String>,
    /// Documents that couldn't be turned into a note
    pub malformed: Vec<String>,
    /// Messages for the user
    pub notices: Vec<String>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of changes pushed to Anki
    pub fn change_count(&self) -> usize {
        self.created.len()
            + self.modified.len()
            + self.deleted.len()
            + self.changed_deck.len()
            + self.added_decks.len()
    }

    pub fn has_problems(&self) -> bool {
        !self.errors.is_empty() || !self.malformed.is_empty()
    }

    pub fn error(&mut self, message: String) {
        self.notices.push(message.clone());
        self.errors.push(message);
    }

    pub fn log(&self) {
        if !self.created.is_empty() {
            info!("Created {} notes: {:?}", self.created.len(), self.created);
        }
        if !self.modified.is_empty() {
            info!("Updated {} notes: {:?}", self.modified.len(), self.modified);
        }
        if !self.deleted.is_empty() {
            info!("Deleted {} notes: {:?}", self.deleted.len(), self.deleted);
        }
        if !self.changed_deck.is_empty() {
            info!("Moved {} notes: {:?}", self.changed_deck.len(), self.changed_deck);
        }
        if !self.added_decks.is_empty() {
            info!("Created decks: {:?}", self.added_decks);
        }
        if !self.cached.is_empty() {
            info!("{} notes unchanged", self.cached.len());
        }
        if !self.malformed.is_empty() {
            info!("Skipped {} malformed documents: {:?}", self.malformed.len(), self.malformed);
        }
        if !self.errors.is_empty() {
            info!("{} errors", self.errors.len());
        }
    }
}

/// What a note type import did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Note types with an up-to-date template
    pub imported: Vec<String>,
    /// Note types whose template couldn't be written
    pub failed: Vec<String>,
    /// Note types no longer in Anki
    pub removed: Vec<String>,
}

impl ImportReport {
    pub fn log(&self) {
        info!("Imported {} note types", self.imported.len());
        if !self.removed.is_empty() {
            info!("Removed note types: {:?}", self.removed);
        }
        if !self.failed.is_empty() {
            info!("Failed to write templates: {:?}", self.failed);
        }
    }
}
