use line_index::LineIndex;

use crate::diagnostic::Diagnostic;
use crate::model::ids::EntryId;

// A document known to the index. Identified by its URI, it holds the ids of every entry it contributed, in
// declaration order, together with the diagnostics found while collecting them
#[derive(Debug)]
pub struct Document {
    uri: String,
    line_index: LineIndex,
    entry_ids: Vec<EntryId>,
    diagnostics: Vec<Diagnostic>,
}

impl Document {
    #[must_use]
    pub fn new(uri: String, source: &str) -> Self {
        Self {
            uri,
            line_index: LineIndex::new(source),
            entry_ids: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    #[must_use]
    pub fn entry_ids(&self) -> &[EntryId] {
        &self.entry_ids
    }

    pub fn add_entry(&mut self, entry_id: EntryId) {
        debug_assert!(
            !self.entry_ids.contains(&entry_id),
            "Cannot add the same entry to a document twice. Duplicate entry IDs"
        );

        self.entry_ids.push(entry_id);
    }

    /// Drops every entry id, keeping diagnostics. Used when a file's entries are discarded because it failed to parse
    pub fn clear_entries(&mut self) {
        self.entry_ids.clear();
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
