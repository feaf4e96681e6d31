use crate::diagnostic::{Diagnostic, Rule};
use crate::model::document::Document;
use crate::model::entry::Entry;
use crate::model::identity_maps::IdentityHashMap;
use crate::model::ids::{EntryId, UriId};
use crate::offset::Offset;

/// Everything collected from a single file, ready to replace that file's previous contribution to the index.
///
/// Entries are kept in declaration order, which becomes their store order once merged.
#[derive(Debug)]
pub struct LocalIndex {
    uri_id: UriId,
    document: Document,
    entries: Vec<Entry>,
    positions: IdentityHashMap<EntryId, usize>,
}

impl LocalIndex {
    #[must_use]
    pub fn new(uri_id: UriId, document: Document) -> Self {
        Self {
            uri_id,
            document,
            entries: Vec::new(),
            positions: IdentityHashMap::default(),
        }
    }

    #[must_use]
    pub fn uri_id(&self) -> UriId {
        self.uri_id
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.entries.iter_mut()
    }

    #[must_use]
    pub fn entry_mut(&mut self, position: usize) -> Option<&mut Entry> {
        self.entries.get_mut(position)
    }

    /// Appends an entry and returns its position. An entry identical to one already collected (same file, position,
    /// kind and name) is not added twice; the existing position is returned instead.
    pub fn add_entry(&mut self, entry: Entry) -> usize {
        let entry_id = entry.id();

        if let Some(position) = self.positions.get(&entry_id) {
            return *position;
        }

        let position = self.entries.len();
        self.document.add_entry(entry_id);
        self.positions.insert(entry_id, position);
        self.entries.push(entry);
        position
    }

    pub fn add_diagnostic(&mut self, rule: Rule, offset: Offset, message: String) {
        self.document
            .add_diagnostic(Diagnostic::new(rule, self.uri_id, offset, message));
    }

    /// Drops every collected entry. The diagnostics explaining why are kept
    pub fn discard_entries(&mut self) {
        self.entries.clear();
        self.positions.clear();
        self.document.clear_entries();
    }

    #[must_use]
    pub fn into_parts(self) -> (UriId, Document, Vec<Entry>) {
        (self.uri_id, self.document, self.entries)
    }
}
