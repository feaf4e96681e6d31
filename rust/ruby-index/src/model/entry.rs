//! The entries contributed by a file to the index.
//!
//! Every declaration site produces one entry. A namespace reopened in several places produces several entries that
//! share one fully qualified name, for example:
//!
//! ```ruby
//! # a.rb
//! class Foo
//!   def bar; end
//! end
//!
//! # b.rb
//! class Foo
//!   def baz; end
//! end
//! ```
//!
//! Here `Foo` has two namespace entries (one per file), and the methods `Foo#bar` and `Foo#baz` have one each. Entries
//! are never merged in place, which keeps every file's contribution independently removable.

use bitflags::bitflags;
use serde::Serialize;

use crate::{
    model::{
        comment::Comment,
        ids::{EntryId, UriId},
        naming,
        visibility::Visibility,
    },
    offset::Offset,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryFlags: u8 {
        const DEPRECATED = 0b0001;
    }
}

impl EntryFlags {
    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.contains(Self::DEPRECATED)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKind {
    Class,
    Module,
    /// The singleton class of another namespace. The attached namespace is encoded in the FQN
    SingletonClass,
}

impl NamespaceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceKind::Class => "class",
            NamespaceKind::Module => "module",
            NamespaceKind::SingletonClass => "singleton_class",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MixinKind {
    Prepend,
    Include,
    Extend,
}

/// A module composed into a namespace, with the name exactly as written at the call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mixin {
    kind: MixinKind,
    module_name: String,
    offset: Offset,
}

impl Mixin {
    #[must_use]
    pub fn new(kind: MixinKind, module_name: String, offset: Offset) -> Self {
        Self {
            kind,
            module_name,
            offset,
        }
    }

    #[must_use]
    pub fn kind(&self) -> MixinKind {
        self.kind
    }

    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    #[must_use]
    pub fn offset(&self) -> &Offset {
        &self.offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    Instance,
    Singleton,
}

impl Dispatch {
    /// The dispatch of methods stored under `owner`
    #[must_use]
    pub fn for_owner(owner: &str) -> Self {
        if naming::is_singleton(owner) {
            Dispatch::Singleton
        } else {
            Dispatch::Instance
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKind {
    Required,
    Optional,
    Keyword,
    KeywordOptional,
    Rest,
    KeywordRest,
    Block,
    Forward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    kind: ParameterKind,
    offset: Offset,
}

impl Parameter {
    #[must_use]
    pub fn new(name: String, kind: ParameterKind, offset: Offset) -> Self {
        Self { name, kind, offset }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    #[must_use]
    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    /// Renders the parameter the way it would be written in a signature
    #[must_use]
    pub fn decorated(&self) -> String {
        match self.kind {
            ParameterKind::Required => self.name.clone(),
            ParameterKind::Optional => format!("{} = <default>", self.name),
            ParameterKind::Keyword => format!("{}:", self.name),
            ParameterKind::KeywordOptional => format!("{}: <default>", self.name),
            ParameterKind::Rest if self.name == "*" => self.name.clone(),
            ParameterKind::Rest => format!("*{}", self.name),
            ParameterKind::KeywordRest if self.name == "**" => self.name.clone(),
            ParameterKind::KeywordRest => format!("**{}", self.name),
            ParameterKind::Block if self.name == "&" => self.name.clone(),
            ParameterKind::Block => format!("&{}", self.name),
            ParameterKind::Forward => "...".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum Entry {
    Namespace(Box<NamespaceEntry>),
    Method(Box<MethodEntry>),
    Constant(Box<ConstantEntry>),
}

macro_rules! all_entries {
    ($value:expr, $var:ident => $expr:expr) => {
        match $value {
            Entry::Namespace($var) => $expr,
            Entry::Method($var) => $expr,
            Entry::Constant($var) => $expr,
        }
    };
}

impl Entry {
    /// The id of this entry. It is derived from the file, the position and the declared name, so the same source
    /// always produces the same ids.
    #[must_use]
    pub fn id(&self) -> EntryId {
        EntryId::from(&format!(
            "{}:{}:{}:{}",
            *self.uri_id(),
            self.offset().start(),
            self.kind_name(),
            self.declaration_name()
        ))
    }

    /// The key this entry is stored under: the FQN for namespaces and constants, `Owner#name` for methods
    #[must_use]
    pub fn declaration_name(&self) -> String {
        match self {
            Entry::Namespace(it) => it.fqn().to_string(),
            Entry::Method(it) => naming::method_key(it.owner(), it.name()),
            Entry::Constant(it) => it.fqn().to_string(),
        }
    }

    /// The unqualified name, used for search
    #[must_use]
    pub fn short_name(&self) -> &str {
        match self {
            Entry::Namespace(it) => naming::last_segment(it.fqn()),
            Entry::Method(it) => it.name(),
            Entry::Constant(it) => naming::last_segment(it.fqn()),
        }
    }

    #[must_use]
    pub fn uri_id(&self) -> &UriId {
        all_entries!(self, it => &it.uri_id)
    }

    #[must_use]
    pub fn offset(&self) -> &Offset {
        all_entries!(self, it => &it.offset)
    }

    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        all_entries!(self, it => &it.comments)
    }

    #[must_use]
    pub fn flags(&self) -> EntryFlags {
        all_entries!(self, it => it.flags)
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entry::Namespace(it) => it.kind().as_str(),
            Entry::Method(_) => "method",
            Entry::Constant(_) => "constant",
        }
    }

    /// Whether this entry declares a constant name, which superclass and mixin references may resolve to
    #[must_use]
    pub fn affects_constant_lookup(&self) -> bool {
        !matches!(self, Entry::Method(_))
    }

    #[must_use]
    pub fn as_namespace(&self) -> Option<&NamespaceEntry> {
        match self {
            Entry::Namespace(it) => Some(it),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_method(&self) -> Option<&MethodEntry> {
        match self {
            Entry::Method(it) => Some(it),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_constant(&self) -> Option<&ConstantEntry> {
        match self {
            Entry::Constant(it) => Some(it),
            _ => None,
        }
    }
}

/// A class, module or singleton class declaration
///
/// # Example
/// ```ruby
/// class Foo < Bar
///   include Baz
/// end
/// ```
#[derive(Debug)]
pub struct NamespaceEntry {
    fqn: String,
    kind: NamespaceKind,
    superclass_name: Option<String>,
    mixins: Vec<Mixin>,
    /// Lexical scope names as written, outermost first, ending with this namespace's own name
    nesting: Vec<String>,
    uri_id: UriId,
    offset: Offset,
    name_offset: Offset,
    comments: Vec<Comment>,
    flags: EntryFlags,
}

impl NamespaceEntry {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fqn: String,
        kind: NamespaceKind,
        superclass_name: Option<String>,
        nesting: Vec<String>,
        uri_id: UriId,
        offset: Offset,
        name_offset: Offset,
        comments: Vec<Comment>,
        flags: EntryFlags,
    ) -> Self {
        Self {
            fqn,
            kind,
            superclass_name,
            mixins: Vec::new(),
            nesting,
            uri_id,
            offset,
            name_offset,
            comments,
            flags,
        }
    }

    #[must_use]
    pub fn fqn(&self) -> &str {
        &self.fqn
    }

    #[must_use]
    pub fn kind(&self) -> NamespaceKind {
        self.kind
    }

    #[must_use]
    pub fn superclass_name(&self) -> Option<&str> {
        self.superclass_name.as_deref()
    }

    #[must_use]
    pub fn mixins(&self) -> &[Mixin] {
        &self.mixins
    }

    pub fn add_mixin(&mut self, mixin: Mixin) {
        self.mixins.push(mixin);
    }

    #[must_use]
    pub fn nesting(&self) -> &[String] {
        &self.nesting
    }

    /// The nesting in which the superclass expression is evaluated, which excludes the class itself
    #[must_use]
    pub fn outer_nesting(&self) -> &[String] {
        &self.nesting[..self.nesting.len().saturating_sub(1)]
    }

    #[must_use]
    pub fn uri_id(&self) -> &UriId {
        &self.uri_id
    }

    #[must_use]
    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    #[must_use]
    pub fn name_offset(&self) -> &Offset {
        &self.name_offset
    }

    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }
}

/// A method declaration, including the ones generated by `attr_*` calls
///
/// # Example
/// ```ruby
/// def foo(a, b = 1, *rest, key:, &block); end
/// ```
#[derive(Debug)]
pub struct MethodEntry {
    owner: String,
    name: String,
    visibility: Visibility,
    parameters: Vec<Parameter>,
    uri_id: UriId,
    offset: Offset,
    comments: Vec<Comment>,
    flags: EntryFlags,
}

impl MethodEntry {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: String,
        name: String,
        visibility: Visibility,
        parameters: Vec<Parameter>,
        uri_id: UriId,
        offset: Offset,
        comments: Vec<Comment>,
        flags: EntryFlags,
    ) -> Self {
        Self {
            owner,
            name,
            visibility,
            parameters,
            uri_id,
            offset,
            comments,
            flags,
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Methods owned by a singleton class dispatch on the namespace object itself
    #[must_use]
    pub fn dispatch(&self) -> Dispatch {
        Dispatch::for_owner(&self.owner)
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[must_use]
    pub fn uri_id(&self) -> &UriId {
        &self.uri_id
    }

    #[must_use]
    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// A copy of this method under another owner. Used by `module_function`, which exposes the same body both as a
    /// private instance method and a public singleton method.
    #[must_use]
    pub fn copy_to(&self, owner: String, visibility: Visibility) -> Self {
        Self {
            owner,
            name: self.name.clone(),
            visibility,
            parameters: self.parameters.clone(),
            uri_id: self.uri_id,
            offset: self.offset.clone(),
            comments: self.comments.clone(),
            flags: self.flags,
        }
    }
}

/// A constant assignment
///
/// # Example
/// ```ruby
/// FOO = 42
/// ```
#[derive(Debug)]
pub struct ConstantEntry {
    fqn: String,
    uri_id: UriId,
    offset: Offset,
    comments: Vec<Comment>,
    flags: EntryFlags,
}

impl ConstantEntry {
    #[must_use]
    pub fn new(fqn: String, uri_id: UriId, offset: Offset, comments: Vec<Comment>, flags: EntryFlags) -> Self {
        Self {
            fqn,
            uri_id,
            offset,
            comments,
            flags,
        }
    }

    #[must_use]
    pub fn fqn(&self) -> &str {
        &self.fqn
    }

    #[must_use]
    pub fn uri_id(&self) -> &UriId {
        &self.uri_id
    }

    #[must_use]
    pub fn offset(&self) -> &Offset {
        &self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(owner: &str, name: &str) -> Entry {
        Entry::Method(Box::new(MethodEntry::new(
            owner.to_string(),
            name.to_string(),
            Visibility::Public,
            Vec::new(),
            UriId::from("file:///foo.rb"),
            Offset::new(0, 10),
            Vec::new(),
            EntryFlags::empty(),
        )))
    }

    #[test]
    fn method_declaration_names_and_dispatch() {
        let instance = method("Foo", "bar");
        assert_eq!(instance.declaration_name(), "Foo#bar");
        assert_eq!(instance.short_name(), "bar");
        assert_eq!(instance.as_method().unwrap().dispatch(), Dispatch::Instance);

        let singleton = method("Foo::<Class:Foo>", "bar");
        assert_eq!(singleton.declaration_name(), "Foo::<Class:Foo>#bar");
        assert_eq!(singleton.as_method().unwrap().dispatch(), Dispatch::Singleton);
    }

    #[test]
    fn entry_ids_distinguish_owners_at_the_same_offset() {
        assert_ne!(method("Foo", "bar").id(), method("Foo::<Class:Foo>", "bar").id());
        assert_eq!(method("Foo", "bar").id(), method("Foo", "bar").id());
    }

    #[test]
    fn namespace_outer_nesting() {
        let entry = NamespaceEntry::new(
            "A::B".to_string(),
            NamespaceKind::Class,
            Some("Base".to_string()),
            vec!["A".to_string(), "B".to_string()],
            UriId::from("file:///foo.rb"),
            Offset::new(0, 10),
            Offset::new(6, 7),
            Vec::new(),
            EntryFlags::empty(),
        );

        assert_eq!(entry.outer_nesting(), ["A".to_string()]);
        assert_eq!(entry.superclass_name(), Some("Base"));
    }

    #[test]
    fn decorated_parameters() {
        let offset = Offset::new(0, 1);
        let rendered: Vec<String> = [
            Parameter::new("a".into(), ParameterKind::Required, offset.clone()),
            Parameter::new("b".into(), ParameterKind::Optional, offset.clone()),
            Parameter::new("args".into(), ParameterKind::Rest, offset.clone()),
            Parameter::new("c".into(), ParameterKind::Keyword, offset.clone()),
            Parameter::new("d".into(), ParameterKind::KeywordOptional, offset.clone()),
            Parameter::new("**".into(), ParameterKind::KeywordRest, offset.clone()),
            Parameter::new("blk".into(), ParameterKind::Block, offset.clone()),
            Parameter::new("...".into(), ParameterKind::Forward, offset),
        ]
        .iter()
        .map(Parameter::decorated)
        .collect();

        assert_eq!(
            rendered,
            ["a", "b = <default>", "*args", "c:", "d: <default>", "**", "&blk", "..."]
        );
    }
}
