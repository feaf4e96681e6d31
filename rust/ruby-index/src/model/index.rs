use std::collections::hash_map::Entry as MapEntry;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ancestors::Ancestors;
use crate::diagnostic::Diagnostic;
use crate::indexing::local_index::LocalIndex;
use crate::model::document::Document;
use crate::model::entry::{Entry, MethodEntry, NamespaceEntry};
use crate::model::identity_maps::{IdentityHashMap, IdentityHashSet};
use crate::model::ids::{DeclarationId, EntryId, UriId};

/// Every entry stored under one fully qualified name, in store order
#[derive(Debug)]
pub struct Declaration {
    name: String,
    entry_ids: Vec<EntryId>,
    /// When this name was first declared, used to list declarations in declaration order
    sequence: u64,
}

impl Declaration {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entry_ids(&self) -> &[EntryId] {
        &self.entry_ids
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

// The `Index` is the global representation of every declaration found in the workspace. Each file contributes a set of
// entries that is replaced or removed as a whole, so reopened namespaces are merged at query time and never in place
#[derive(Debug, Default)]
pub struct Index {
    // Map of fully qualified names to the ids of their entries
    declarations: IdentityHashMap<DeclarationId, Declaration>,
    // Map of entry ids to entries
    entries: IdentityHashMap<EntryId, Entry>,
    // Map of documents, holding the ids of the entries each file contributed
    documents: IdentityHashMap<UriId, Document>,
    // Map of namespace names to the method declarations stored under them
    members: IdentityHashMap<DeclarationId, IdentityHashSet<DeclarationId>>,
    // Memoized linearizations. Cleared whenever a namespace or constant entry is added or removed, since either can
    // change what a superclass or mixin name resolves to
    ancestors: Mutex<IdentityHashMap<DeclarationId, Ancestors>>,
    next_sequence: u64,
    // Bumped by every file replacement or deletion
    generation: u64,
    // Map of URIs to the generation in which they were last replaced or deleted
    replaced_at: IdentityHashMap<UriId, u64>,
}

impl Index {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn declarations(&self) -> &IdentityHashMap<DeclarationId, Declaration> {
        &self.declarations
    }

    #[must_use]
    pub fn declaration(&self, fqn: &str) -> Option<&Declaration> {
        self.declarations.get(&DeclarationId::from(fqn))
    }

    #[must_use]
    pub fn entries(&self) -> &IdentityHashMap<EntryId, Entry> {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, entry_id: &EntryId) -> Option<&Entry> {
        self.entries.get(entry_id)
    }

    #[must_use]
    pub fn documents(&self) -> &IdentityHashMap<UriId, Document> {
        &self.documents
    }

    #[must_use]
    pub fn document(&self, uri: &str) -> Option<&Document> {
        self.documents.get(&UriId::from(uri))
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.documents.values().flat_map(Document::diagnostics)
    }

    /// All entries stored under an exact fully qualified name (or `Owner#method` key), in store order
    #[must_use]
    pub fn lookup(&self, fqn: &str) -> Vec<&Entry> {
        self.declaration(fqn)
            .map(|declaration| self.entries_of(declaration).collect())
            .unwrap_or_default()
    }

    pub fn entries_of<'a>(&'a self, declaration: &'a Declaration) -> impl Iterator<Item = &'a Entry> {
        declaration
            .entry_ids
            .iter()
            .filter_map(|entry_id| self.entries.get(entry_id))
    }

    /// The namespace entries stored under `fqn`, in store order
    #[must_use]
    pub fn namespace_entries(&self, fqn: &str) -> Vec<&NamespaceEntry> {
        self.lookup(fqn).into_iter().filter_map(Entry::as_namespace).collect()
    }

    /// The method entries stored under `owner#name`, in store order
    #[must_use]
    pub fn method_entries(&self, owner: &str, name: &str) -> Vec<&MethodEntry> {
        self.lookup(&crate::model::naming::method_key(owner, name))
            .into_iter()
            .filter_map(Entry::as_method)
            .collect()
    }

    #[must_use]
    pub fn is_namespace(&self, fqn: &str) -> bool {
        self.declaration(fqn)
            .is_some_and(|declaration| self.entries_of(declaration).any(|entry| entry.as_namespace().is_some()))
    }

    /// Declarations that have at least one namespace entry, in declaration order
    #[must_use]
    pub fn namespaces(&self) -> Vec<&Declaration> {
        let mut namespaces: Vec<&Declaration> = self
            .declarations
            .values()
            .filter(|declaration| self.entries_of(declaration).any(|entry| entry.as_namespace().is_some()))
            .collect();

        namespaces.sort_by_key(|declaration| declaration.sequence);
        namespaces
    }

    /// Names of the methods declared directly on `owner`, in declaration order
    #[must_use]
    pub fn method_names(&self, owner: &str) -> Vec<&str> {
        let Some(members) = self.members.get(&DeclarationId::from(owner)) else {
            return Vec::new();
        };

        let mut declarations: Vec<&Declaration> = members
            .iter()
            .filter_map(|member_id| self.declarations.get(member_id))
            .collect();
        declarations.sort_by_key(|declaration| declaration.sequence);

        declarations
            .into_iter()
            .filter_map(|declaration| self.entries_of(declaration).find_map(Entry::as_method))
            .map(MethodEntry::name)
            .collect()
    }

    /// The current generation. Every file replacement or deletion advances it
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces everything previously contributed by the file of `local_index` with its new entries
    pub fn index_single(&mut self, local_index: LocalIndex) {
        let uri_id = local_index.uri_id();
        self.bump_generation(uri_id);
        self.remove_document(uri_id);
        self.extend(local_index);
    }

    /// Same as [`Index::index_single`], unless the file was replaced or deleted after `generation`. A batch that read
    /// the file earlier must not overwrite a newer version of it. Returns whether the entries were stored
    pub fn index_single_since(&mut self, local_index: LocalIndex, generation: u64) -> bool {
        if self
            .replaced_at
            .get(&local_index.uri_id())
            .is_some_and(|replaced_at| *replaced_at > generation)
        {
            return false;
        }

        self.index_single(local_index);
        true
    }

    /// Removes every entry contributed by `uri`. Returns whether the file was known
    pub fn delete(&mut self, uri: &str) -> bool {
        let uri_id = UriId::from(uri);
        self.bump_generation(uri_id);
        self.remove_document(uri_id)
    }

    fn bump_generation(&mut self, uri_id: UriId) {
        self.generation += 1;
        self.replaced_at.insert(uri_id, self.generation);
    }

    fn extend(&mut self, local_index: LocalIndex) {
        let (uri_id, document, entries) = local_index.into_parts();
        let mut touched_constants = false;

        for entry in entries {
            let entry_id = entry.id();
            let name = entry.declaration_name();
            let declaration_id = DeclarationId::from(&name);

            if let Entry::Method(method) = &entry {
                self.members
                    .entry(DeclarationId::from(method.owner()))
                    .or_default()
                    .insert(declaration_id);
            }

            touched_constants |= entry.affects_constant_lookup();

            match self.declarations.entry(declaration_id) {
                MapEntry::Occupied(mut occupied) => occupied.get_mut().entry_ids.push(entry_id),
                MapEntry::Vacant(vacant) => {
                    vacant.insert(Declaration {
                        name,
                        entry_ids: vec![entry_id],
                        sequence: self.next_sequence,
                    });
                    self.next_sequence += 1;
                }
            }

            self.entries.insert(entry_id, entry);
        }

        self.documents.insert(uri_id, document);

        if touched_constants {
            self.clear_ancestors();
        }
    }

    // Removes all entries associated to the given URI. Used when a file changes, before its new entries are inserted,
    // and when a file is deleted
    fn remove_document(&mut self, uri_id: UriId) -> bool {
        let Some(document) = self.documents.remove(&uri_id) else {
            return false;
        };

        let mut touched_constants = false;

        for entry_id in document.entry_ids() {
            let Some(entry) = self.entries.remove(entry_id) else {
                continue;
            };

            touched_constants |= entry.affects_constant_lookup();
            let declaration_id = DeclarationId::from(&entry.declaration_name());

            let now_empty = match self.declarations.get_mut(&declaration_id) {
                Some(declaration) => {
                    declaration.entry_ids.retain(|id| id != entry_id);
                    declaration.entry_ids.is_empty()
                }
                None => false,
            };

            if !now_empty {
                continue;
            }

            self.declarations.remove(&declaration_id);

            if let Entry::Method(method) = &entry {
                let owner_id = DeclarationId::from(method.owner());

                if let Some(members) = self.members.get_mut(&owner_id) {
                    members.remove(&declaration_id);

                    if members.is_empty() {
                        self.members.remove(&owner_id);
                    }
                }
            }
        }

        if touched_constants {
            self.clear_ancestors();
        }

        true
    }

    fn ancestors_cache(&self) -> MutexGuard<'_, IdentityHashMap<DeclarationId, Ancestors>> {
        self.ancestors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn cached_ancestors(&self, declaration_id: &DeclarationId) -> Option<Ancestors> {
        self.ancestors_cache().get(declaration_id).cloned()
    }

    pub fn cache_ancestors(&self, declaration_id: DeclarationId, ancestors: Ancestors) {
        self.ancestors_cache().insert(declaration_id, ancestors);
    }

    #[must_use]
    pub fn cached_ancestors_count(&self) -> usize {
        self.ancestors_cache().len()
    }

    fn clear_ancestors(&mut self) {
        self.ancestors
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
