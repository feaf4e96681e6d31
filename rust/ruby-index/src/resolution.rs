use crate::model::entry::{Entry, MethodEntry};
use crate::model::identity_maps::IdentityHashSet;
use crate::model::ids::DeclarationId;
use crate::model::index::Index;
use crate::model::naming;

impl Index {
    /// Resolves a constant reference written as `name` inside `nesting` (scope names as written, outermost first), the
    /// same way Ruby looks up constants: every lexical scope from the innermost outwards, then the top level, then the
    /// ancestors of the innermost scope.
    ///
    /// Returns every entry for the constant found, or nothing if it can't be resolved.
    #[must_use]
    pub fn resolve(&self, name: &str, nesting: &[String]) -> Vec<&Entry> {
        self.resolve_constant_name(name, nesting)
            .map(|fqn| self.lookup(&fqn))
            .unwrap_or_default()
    }

    /// Same as [`Index::resolve`], returning the fully qualified name found
    #[must_use]
    pub fn resolve_constant_name(&self, name: &str, nesting: &[String]) -> Option<String> {
        if let Some(fqn) = self.resolve_lexically(name, nesting) {
            return Some(fqn);
        }

        if name.starts_with(naming::SEPARATOR) {
            return None;
        }

        // Constants can also come from the ancestors of the innermost scope
        let levels = naming::nesting_levels(nesting);
        let innermost = levels.first()?;

        self.linearized_ancestors_of(innermost)
            .iter()
            .skip(1)
            .map(|ancestor| naming::qualify(ancestor, name))
            .find(|candidate| self.declaration(candidate).is_some())
    }

    /// Resolves `name` through lexical scopes and the top level only
    pub(crate) fn resolve_lexically(&self, name: &str, nesting: &[String]) -> Option<String> {
        if let Some(absolute) = name.strip_prefix(naming::SEPARATOR) {
            return self.declaration(absolute).map(|_| absolute.to_string());
        }

        let found = naming::nesting_levels(nesting)
            .iter()
            .map(|level| naming::qualify(level, name))
            .chain(std::iter::once(name.to_string()))
            .find(|candidate| self.declaration(candidate).is_some());

        if found.is_some() {
            return found;
        }

        // For `A::B`, `A` may live in an outer scope even though `A::B` is declared somewhere else
        let (head, rest) = name.split_once(naming::SEPARATOR)?;
        let head_fqn = self.resolve_lexically(head, nesting)?;
        let candidate = format!("{head_fqn}{}{rest}", naming::SEPARATOR);

        self.declaration(&candidate).is_some().then_some(candidate)
    }

    /// Finds the method `name` that a call on an instance of `receiver_fqn` dispatches to. Walks the receiver's
    /// ancestors and returns every entry of the first one that declares the method. To resolve a method called on a
    /// namespace itself, pass its singleton class (`Foo::<Class:Foo>`).
    #[must_use]
    pub fn resolve_method(&self, name: &str, receiver_fqn: &str) -> Vec<&MethodEntry> {
        self.linearized_ancestors_of(receiver_fqn)
            .iter()
            .map(|ancestor| self.method_entries(ancestor, name))
            .find(|entries| !entries.is_empty())
            .unwrap_or_default()
    }

    /// Methods available on `receiver_fqn` whose name starts with `prefix`. Each name is reported once, with the entry
    /// that a call would dispatch to
    #[must_use]
    pub fn method_completion_candidates(&self, prefix: &str, receiver_fqn: &str) -> Vec<&MethodEntry> {
        let mut seen: IdentityHashSet<DeclarationId> = IdentityHashSet::default();
        let mut candidates = Vec::new();

        for ancestor in self.linearized_ancestors_of(receiver_fqn) {
            for name in self.method_names(&ancestor) {
                if !name.starts_with(prefix) || !seen.insert(DeclarationId::from(name)) {
                    continue;
                }

                if let Some(method) = self.method_entries(&ancestor, name).into_iter().next() {
                    candidates.push(method);
                }
            }
        }

        candidates
    }
}
