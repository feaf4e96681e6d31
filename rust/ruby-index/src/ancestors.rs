//! Linearization of ancestor chains.
//!
//! The chain of a namespace is built from all of its entries merged together: prepended modules (most recent first),
//! the namespace itself, included modules (most recent first) and finally the superclass chain. Every module is
//! expanded into its own chain and only the first occurrence of each name is kept.
//!
//! Singleton classes are linearized the same way. Modules included in `class << self` are searched first, then the
//! ones the attached namespace `extend`s, and their superclass is the singleton class of the attached namespace's
//! superclass.

use crate::model::entry::{MixinKind, NamespaceEntry, NamespaceKind};
use crate::model::identity_maps::IdentityHashSet;
use crate::model::ids::DeclarationId;
use crate::model::index::Index;
use crate::model::naming;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ancestors {
    /// The full chain
    Complete(Vec<String>),
    /// The chain of a namespace that ends up inheriting from itself. The repeated link is left out
    Cyclic(Vec<String>),
}

impl Ancestors {
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Ancestors::Complete(names) | Ancestors::Cyclic(names) => names,
        }
    }

    #[must_use]
    pub fn into_names(self) -> Vec<String> {
        match self {
            Ancestors::Complete(names) | Ancestors::Cyclic(names) => names,
        }
    }

    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        matches!(self, Ancestors::Cyclic(_))
    }
}

/// The superclass and mixins of a namespace, merged across all of its entries
struct Definition {
    kind: NamespaceKind,
    superclass: Option<String>,
    prepends: Vec<String>,
    includes: Vec<String>,
}

impl Index {
    /// The method resolution order of `fqn`. Unknown namespaces have no ancestors
    #[must_use]
    pub fn linearized_ancestors_of(&self, fqn: &str) -> Vec<String> {
        self.ancestors_of(fqn).into_names()
    }

    /// Same as [`Index::linearized_ancestors_of`], but tells apart chains that had to be cut because of a cycle
    #[must_use]
    pub fn ancestors_of(&self, fqn: &str) -> Ancestors {
        let declaration_id = DeclarationId::from(fqn);

        if let Some(cached) = self.cached_ancestors(&declaration_id) {
            return cached;
        }

        let mut linearizer = Linearizer::new(self);
        let chain = linearizer.linearize(fqn);

        let ancestors = if linearizer.cyclic {
            Ancestors::Cyclic(chain)
        } else {
            Ancestors::Complete(chain)
        };

        self.cache_ancestors(declaration_id, ancestors.clone());
        ancestors
    }

    /// Whether `fqn` is an indexed namespace, or the singleton class of one
    #[must_use]
    pub fn is_known_namespace(&self, fqn: &str) -> bool {
        self.is_namespace(fqn) || naming::attached_name(fqn).is_some_and(|attached| self.is_known_namespace(attached))
    }

    /// The kind of the namespace `fqn`, considering all of its entries. A name declared both as a class and as a
    /// module is treated as a class
    #[must_use]
    pub fn namespace_kind(&self, fqn: &str) -> Option<NamespaceKind> {
        if naming::is_singleton(fqn) && self.is_known_namespace(fqn) {
            return Some(NamespaceKind::SingletonClass);
        }

        let entries = self.namespace_entries(fqn);
        if entries.iter().any(|entry| entry.kind() == NamespaceKind::Class) {
            Some(NamespaceKind::Class)
        } else {
            entries.first().map(|entry| entry.kind())
        }
    }

    /// The superclass of `fqn`, explicit or implicit. Modules have none and neither does `BasicObject`
    #[must_use]
    pub fn superclass_of(&self, fqn: &str) -> Option<String> {
        if let Some(attached) = naming::attached_name(fqn) {
            if !self.is_known_namespace(attached) {
                return None;
            }

            return match self.namespace_kind(attached) {
                Some(NamespaceKind::Module) => Some(naming::MODULE.to_string()),
                _ if attached == naming::BASIC_OBJECT => Some(naming::CLASS.to_string()),
                _ => self
                    .superclass_of(attached)
                    .map(|superclass| naming::singleton_name(&superclass)),
            };
        }

        let entries = self.namespace_entries(fqn);
        if entries.is_empty() || self.namespace_kind(fqn) != Some(NamespaceKind::Class) {
            return None;
        }

        // The first entry that names a superclass decides it
        let explicit = entries.iter().find_map(|entry| {
            entry
                .superclass_name()
                .map(|name| self.resolve_namespace_name(name, entry.outer_nesting()))
        });

        match explicit {
            Some(superclass) => Some(superclass),
            None if fqn == naming::BASIC_OBJECT => None,
            None if fqn == naming::OBJECT => Some(naming::BASIC_OBJECT.to_string()),
            None => Some(naming::OBJECT.to_string()),
        }
    }

    /// Resolves a namespace reference lexically. Names that can't be resolved are kept as written, minus a leading
    /// `::`, so they can still show up in ancestor chains
    fn resolve_namespace_name(&self, name: &str, nesting: &[String]) -> String {
        self.resolve_lexically(name, nesting)
            .unwrap_or_else(|| name.trim_start_matches(naming::SEPARATOR).to_string())
    }

    fn definition_of(&self, fqn: &str) -> Option<Definition> {
        if !self.is_known_namespace(fqn) {
            return None;
        }

        let mut prepends = Vec::new();
        let mut includes = Vec::new();

        let mut collect = |entry: &NamespaceEntry, extends_only: bool| {
            for mixin in entry.mixins() {
                let target = match (mixin.kind(), extends_only) {
                    (MixinKind::Prepend, false) => &mut prepends,
                    (MixinKind::Include, false) | (MixinKind::Extend, true) => &mut includes,
                    _ => continue,
                };
                target.push(self.resolve_namespace_name(mixin.module_name(), entry.nesting()));
            }
        };

        // The attached namespace's `extend`s go first, so the singleton's own includes are searched before them
        if let Some(attached) = naming::attached_name(fqn) {
            for entry in self.namespace_entries(attached) {
                collect(entry, true);
            }
        }

        for entry in self.namespace_entries(fqn) {
            collect(entry, false);
        }

        Some(Definition {
            kind: self.namespace_kind(fqn)?,
            superclass: self.superclass_of(fqn),
            prepends,
            includes,
        })
    }
}

struct Linearizer<'a> {
    index: &'a Index,
    in_progress: Vec<String>,
    cyclic: bool,
}

impl<'a> Linearizer<'a> {
    fn new(index: &'a Index) -> Self {
        Self {
            index,
            in_progress: Vec::new(),
            cyclic: false,
        }
    }

    fn linearize(&mut self, fqn: &str) -> Vec<String> {
        if self.in_progress.iter().any(|name| name == fqn) {
            self.cyclic = true;
            return Vec::new();
        }

        if !self.in_progress.is_empty()
            && let Some(cached) = self.index.cached_ancestors(&DeclarationId::from(fqn))
        {
            self.cyclic |= cached.is_cyclic();
            return cached.into_names();
        }

        let Some(definition) = self.index.definition_of(fqn) else {
            // Anything we know nothing about is an opaque link that ends its branch
            return if self.in_progress.is_empty() {
                Vec::new()
            } else {
                vec![fqn.to_string()]
            };
        };

        self.in_progress.push(fqn.to_string());
        let outer_cyclic = std::mem::take(&mut self.cyclic);

        let mut chain: Vec<String> = Vec::new();

        for prepend in definition.prepends.iter().rev() {
            chain.extend(self.linearize(prepend));
        }

        chain.push(fqn.to_string());

        for include in definition.includes.iter().rev() {
            chain.extend(self.linearize(include));
        }

        if definition.kind != NamespaceKind::Module
            && let Some(superclass) = &definition.superclass
        {
            chain.extend(self.linearize(superclass));
        }

        let mut seen_ids: IdentityHashSet<DeclarationId> = IdentityHashSet::default();
        chain.retain(|name| seen_ids.insert(DeclarationId::from(name)));

        self.in_progress.pop();
        let cyclic = self.cyclic;
        self.cyclic = outer_cyclic || cyclic;

        // Chains computed halfway through a cycle are missing the part still in progress, so only the outermost
        // result of a cyclic walk is cached
        if !cyclic && !self.in_progress.is_empty() {
            self.index
                .cache_ancestors(DeclarationId::from(fqn), Ancestors::Complete(chain.clone()));
        }

        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::IndexTest;

    macro_rules! assert_ancestors_eq {
        ($context:expr, $name:expr, $expected:expr) => {
            let expected: Vec<&str> = $expected.to_vec();
            assert_eq!(
                $context.index().linearized_ancestors_of($name),
                expected,
                "Unexpected ancestors for {}",
                $name
            );
        };
    }

    #[test]
    fn prepend_self_include_superclass_order() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module P; end
            module M; end
            class Bar; end

            class Foo < Bar
              prepend P
              include M
            end
            "
        });

        assert_ancestors_eq!(context, "Foo", ["P", "Foo", "M", "Bar", "Object"]);
    }

    #[test]
    fn unindexed_mixins_around_a_module_superclass() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            class Foo < Bar; prepend P; include M; end
            module Bar; end
            "
        });

        assert_ancestors_eq!(context, "Foo", ["P", "Foo", "M", "Bar"]);
    }

    #[test]
    fn mixins_are_searched_most_recent_first() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module A; end
            module B; end
            module C; end
            module D; end

            class Foo
              include A
              include B
              include C, D
              prepend A
            end
            "
        });

        assert_ancestors_eq!(context, "Foo", ["A", "Foo", "C", "D", "B", "Object"]);
    }

    #[test]
    fn reopened_namespaces_are_merged() {
        let mut context = IndexTest::new();
        context.index_uri("file:///a.rb", {
            "
            module First; end
            class Base; end
            class Foo < Base
              include First
            end
            "
        });
        context.index_uri("file:///b.rb", {
            "
            module Second; end
            class Foo
              include Second
            end
            "
        });

        assert_ancestors_eq!(context, "Foo", ["Foo", "Second", "First", "Base", "Object"]);

        context.delete_uri("file:///a.rb");
        assert_ancestors_eq!(context, "Foo", ["Foo", "Second", "Object"]);
    }

    #[test]
    fn modules_expand_into_their_own_chains() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module Inner; end
            module Before; end
            module Outer
              include Inner
              prepend Before
            end

            class Foo
              include Outer
            end
            "
        });

        assert_ancestors_eq!(context, "Outer", ["Before", "Outer", "Inner"]);
        assert_ancestors_eq!(context, "Foo", ["Foo", "Before", "Outer", "Inner", "Object"]);
    }

    #[test]
    fn first_occurrence_wins() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module Shared; end
            class Parent
              include Shared
            end

            class Child < Parent
              include Shared
            end
            "
        });

        assert_ancestors_eq!(context, "Child", ["Child", "Shared", "Parent", "Object"]);
    }

    #[test]
    fn unresolved_names_are_terminal() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            class Foo < ActiveRecord::Base
              include ::Comparable
            end
            "
        });

        assert_ancestors_eq!(context, "Foo", ["Foo", "Comparable", "ActiveRecord::Base"]);
        assert!(context.index().linearized_ancestors_of("Unknown").is_empty());
    }

    #[test]
    fn names_resolve_against_the_lexical_scope() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module Outer
              module Helpers; end
              class Base; end

              class Foo < Base
                include Helpers
              end
            end

            class Base; end
            "
        });

        assert_ancestors_eq!(
            context,
            "Outer::Foo",
            ["Outer::Foo", "Outer::Helpers", "Outer::Base", "Object"]
        );
    }

    #[test]
    fn implicit_superclasses() {
        let mut context = IndexTest::new();
        context.index_uri("file:///core.rb", {
            "
            class BasicObject; end
            module Kernel; end
            class Object < BasicObject
              include Kernel
            end
            class Module; end
            class Class < Module; end
            class Foo; end
            "
        });

        assert_ancestors_eq!(context, "Foo", ["Foo", "Object", "Kernel", "BasicObject"]);
        assert_ancestors_eq!(context, "BasicObject", ["BasicObject"]);
        assert_ancestors_eq!(context, "Kernel", ["Kernel"]);
    }

    #[test]
    fn singleton_ancestors() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module ClassMethods; end
            module Extra; end
            class Bar; end

            class Foo < Bar
              extend ClassMethods
              include Extra

              class << self
                def build; end
              end
            end
            "
        });

        assert_ancestors_eq!(
            context,
            "Foo::<Class:Foo>",
            ["Foo::<Class:Foo>", "ClassMethods", "Bar::<Class:Bar>", "Object::<Class:Object>"]
        );
    }

    #[test]
    fn singleton_includes_come_before_extends() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module Extended; end
            module Included; end

            class Foo
              extend Extended

              class << self
                include Included
              end
            end
            "
        });

        assert_ancestors_eq!(
            context,
            "Foo::<Class:Foo>",
            ["Foo::<Class:Foo>", "Included", "Extended", "Object::<Class:Object>"]
        );
    }

    #[test]
    fn singleton_of_modules_and_basic_object() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            class BasicObject; end
            class Module; end
            class Class < Module; end
            module Util
              extend self
            end
            "
        });

        assert_ancestors_eq!(context, "Util::<Class:Util>", ["Util::<Class:Util>", "Util", "Module", "Object"]);
        assert_ancestors_eq!(
            context,
            "BasicObject::<Class:BasicObject>",
            ["BasicObject::<Class:BasicObject>", "Class", "Module", "Object"]
        );
    }

    #[test]
    fn nested_singletons() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", "class Foo; end");

        assert_ancestors_eq!(
            context,
            "Foo::<Class:Foo>::<Class:<Class:Foo>>",
            [
                "Foo::<Class:Foo>::<Class:<Class:Foo>>",
                "Object::<Class:Object>::<Class:<Class:Object>>"
            ]
        );
    }

    #[test]
    fn cyclic_mixins() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module A
              include B
            end

            module B
              include A
            end

            class C < D; end
            class D < C; end
            "
        });

        let ancestors = context.index().ancestors_of("A");
        assert!(ancestors.is_cyclic());
        assert_eq!(ancestors.names(), ["A", "B"]);
        assert_ancestors_eq!(context, "B", ["B", "A"]);
        assert_ancestors_eq!(context, "C", ["C", "D"]);
    }

    #[test]
    fn ancestors_never_contain_duplicates() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module A; end
            module B
              include A
            end
            module C
              include A
              include B
            end
            class Foo
              include A, B, C
              prepend C
            end
            "
        });

        for name in ["A", "B", "C", "Foo"] {
            let ancestors = context.index().linearized_ancestors_of(name);
            let mut unique = ancestors.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), ancestors.len(), "duplicates in {ancestors:?}");
        }
    }
}
