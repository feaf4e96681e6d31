use crate::diagnostic::Rule;
use crate::indexing::local_index::LocalIndex;
use crate::model::comment::Comment;
use crate::model::document::Document;
use crate::model::entry::{
    ConstantEntry, Entry, EntryFlags, MethodEntry, Mixin, MixinKind, NamespaceEntry, NamespaceKind, Parameter,
    ParameterKind,
};
use crate::model::ids::UriId;
use crate::model::naming;
use crate::model::visibility::Visibility;
use crate::offset::Offset;

use ruby_prism::{ParseResult, Visit};

/// The namespace body currently being collected
struct Scope {
    fqn: String,
    /// Position of the namespace entry being built for this body in the local index
    entry_position: usize,
    offset: Offset,
    name_offset: Offset,
    /// Singleton companions already emitted while collecting this body
    singletons: Vec<String>,
}

#[derive(Clone)]
struct VisibilityModifier {
    visibility: Visibility,
    module_function: bool,
    is_inline: bool,
    offset: Offset,
}

impl VisibilityModifier {
    fn new(visibility: Visibility, module_function: bool, is_inline: bool, offset: Offset) -> Self {
        Self {
            visibility,
            module_function,
            is_inline,
            offset,
        }
    }
}

enum AttrKind {
    Accessor,
    Reader,
    Writer,
}

/// Collects the entries declared in a Ruby file.
///
/// It walks the prism AST with the `Visit` trait, keeping a stack of the enclosing namespaces and of the running
/// method visibility, and fills a [`LocalIndex`] that the store later swaps in as this file's contribution.
pub struct Collector<'a> {
    uri_id: UriId,
    local_index: LocalIndex,
    source: &'a str,
    tolerate_parse_errors: bool,
    comments: Vec<CommentGroup>,
    scopes: Vec<Scope>,
    /// Lexical scope names as written, outermost first
    nesting: Vec<String>,
    visibility_stack: Vec<VisibilityModifier>,
    /// Singleton companions emitted outside of any namespace body, e.g. for `def Foo.bar` at the top level
    top_level_singletons: Vec<String>,
    method_depth: usize,
}

impl<'a> Collector<'a> {
    #[must_use]
    pub fn new(uri: String, source: &'a str, tolerate_parse_errors: bool) -> Self {
        let uri_id = UriId::from(&uri);
        let local_index = LocalIndex::new(uri_id, Document::new(uri, source));

        Self {
            uri_id,
            local_index,
            source,
            tolerate_parse_errors,
            comments: Vec::new(),
            scopes: Vec::new(),
            nesting: Vec::new(),
            visibility_stack: vec![VisibilityModifier::new(
                Visibility::Public,
                false,
                false,
                Offset::new(0, 0),
            )],
            top_level_singletons: Vec::new(),
            method_depth: 0,
        }
    }

    #[must_use]
    pub fn local_index(self) -> LocalIndex {
        self.local_index
    }

    /// Parses the source and collects its entries. A source with syntax errors contributes no entries unless parse
    /// errors are tolerated; its diagnostics are recorded either way.
    pub fn collect(&mut self) {
        let result = ruby_prism::parse(self.source.as_bytes());
        let mut has_errors = false;

        for error in result.errors() {
            has_errors = true;
            self.local_index.add_diagnostic(
                Rule::ParseError,
                Offset::from_prism_location(&error.location()),
                error.message().to_string(),
            );
        }

        for warning in result.warnings() {
            self.local_index.add_diagnostic(
                Rule::ParseWarning,
                Offset::from_prism_location(&warning.location()),
                warning.message().to_string(),
            );
        }

        if has_errors && !self.tolerate_parse_errors {
            tracing::debug!(uri = self.local_index.document().uri(), "skipping file with syntax errors");
            return;
        }

        self.comments = self.parse_comments_into_groups(&result);
        self.visit(&result.node());
    }

    fn parse_comments_into_groups(&self, result: &ParseResult<'_>) -> Vec<CommentGroup> {
        let mut iter = result.comments().peekable();
        let mut groups = Vec::new();

        while let Some(comment) = iter.next() {
            let mut group = CommentGroup::new();
            group.add_comment(&comment);

            while let Some(next_comment) = iter.next_if(|next| group.accepts(next, self.source)) {
                group.add_comment(&next_comment);
            }

            groups.push(group);
        }

        groups
    }

    fn location_to_string(location: &ruby_prism::Location) -> String {
        String::from_utf8_lossy(location.as_slice()).to_string()
    }

    /// Returns the comment block ending right above `offset`, allowing at most one blank line in between
    fn find_comments_for(&self, offset: u32) -> (Vec<Comment>, EntryFlags) {
        let offset_usize = offset as usize;

        let idx = match self.comments.binary_search_by_key(&offset_usize, |g| g.end_offset) {
            Err(i) if i > 0 => i - 1,
            _ => return (Vec::new(), EntryFlags::empty()),
        };

        let group = &self.comments[idx];
        let Some(between) = self.source.as_bytes().get(group.end_offset..offset_usize) else {
            return (Vec::new(), EntryFlags::empty());
        };

        if !between.iter().all(u8::is_ascii_whitespace) || bytecount::count(between, b'\n') > 2 {
            return (Vec::new(), EntryFlags::empty());
        }

        (group.comments.clone(), group.flags())
    }

    /// Builds the name of a constant or constant path as written, such as `Foo`, `Foo::Bar` or `::Foo`. Returns `None`
    /// if any part of the path is dynamic (`foo::Bar`)
    fn constant_path_name(node: &ruby_prism::Node) -> Option<String> {
        match node {
            ruby_prism::Node::ConstantReadNode { .. } | ruby_prism::Node::ConstantTargetNode { .. } => {
                Some(Self::location_to_string(&node.location()))
            }
            ruby_prism::Node::ConstantPathNode { .. } => {
                let path = node.as_constant_path_node()?;
                Self::join_constant_path(path.parent(), &path.name_loc())
            }
            ruby_prism::Node::ConstantPathTargetNode { .. } => {
                let path = node.as_constant_path_target_node()?;
                Self::join_constant_path(path.parent(), &path.name_loc())
            }
            _ => None,
        }
    }

    fn join_constant_path(parent: Option<ruby_prism::Node>, name_loc: &ruby_prism::Location) -> Option<String> {
        let name = Self::location_to_string(name_loc);

        match parent {
            Some(parent) => Some(format!("{}::{name}", Self::constant_path_name(&parent)?)),
            None => Some(format!("::{name}")),
        }
    }

    /// The location of the last segment of a constant path, used as the name offset of namespaces
    fn constant_name_location<'b>(node: &ruby_prism::Node<'b>) -> ruby_prism::Location<'b> {
        match node.as_constant_path_node() {
            Some(path) => path.name_loc(),
            None => node.location(),
        }
    }

    fn current_fqn(&self) -> &str {
        self.scopes.last().map_or("", |scope| scope.fqn.as_str())
    }

    /// The owner of methods defined without a receiver. Top level methods belong to `Object`
    fn current_owner(&self) -> String {
        self.scopes
            .last()
            .map_or_else(|| naming::OBJECT.to_string(), |scope| scope.fqn.clone())
    }

    /// Qualifies a constant name as written against the current namespace
    fn qualify_constant(&self, name: &str) -> String {
        match name.strip_prefix(naming::SEPARATOR) {
            Some(absolute) => absolute.to_string(),
            None => naming::qualify(self.current_fqn(), name),
        }
    }

    /// Resolves the constant receiver of `def Foo.bar` or `class << Foo` against the enclosing namespaces, innermost
    /// first. A namespace declared in this file directly under a scope, or the scope itself when its name matches,
    /// wins. Anything else is taken as a top level name
    fn resolve_receiver_constant(&self, name: &str) -> String {
        if let Some(absolute) = name.strip_prefix(naming::SEPARATOR) {
            return absolute.to_string();
        }

        let (head, rest) = match name.split_once(naming::SEPARATOR) {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };

        for scope in self.scopes.iter().rev() {
            let nested = naming::qualify(&scope.fqn, name);
            if self.declares_namespace(&nested) {
                return nested;
            }

            if naming::last_segment(&scope.fqn) == head {
                return match rest {
                    Some(rest) => naming::qualify(&scope.fqn, rest),
                    None => scope.fqn.clone(),
                };
            }
        }

        name.to_string()
    }

    fn declares_namespace(&self, fqn: &str) -> bool {
        self.local_index
            .entries()
            .iter()
            .filter_map(Entry::as_namespace)
            .any(|namespace| namespace.fqn() == fqn)
    }

    fn current_visibility(&self) -> VisibilityModifier {
        self.visibility_stack.last().cloned().unwrap_or_else(|| {
            VisibilityModifier::new(Visibility::Public, false, false, Offset::new(0, 0))
        })
    }

    /// Whether calls are being evaluated in a namespace body (or the top level) rather than inside a method, where
    /// `include`, `private` and friends only run at runtime
    fn in_declaration_context(&self) -> bool {
        self.method_depth == 0
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_namespace(
        &mut self,
        kind: NamespaceKind,
        name: String,
        fqn: String,
        superclass_name: Option<String>,
        location: &ruby_prism::Location,
        name_offset: Offset,
        body: Option<ruby_prism::Node>,
    ) {
        let offset = Offset::from_prism_location(location);
        let (comments, flags) = self.find_comments_for(offset.start());

        self.nesting.push(name);

        let entry = NamespaceEntry::new(
            fqn.clone(),
            kind,
            superclass_name,
            self.nesting.clone(),
            self.uri_id,
            offset.clone(),
            name_offset.clone(),
            comments,
            flags,
        );
        let entry_position = self.local_index.add_entry(Entry::Namespace(Box::new(entry)));

        self.scopes.push(Scope {
            fqn,
            entry_position,
            offset: offset.clone(),
            name_offset,
            singletons: Vec::new(),
        });
        self.visibility_stack
            .push(VisibilityModifier::new(Visibility::Public, false, false, offset));
        let method_depth = std::mem::take(&mut self.method_depth);

        if let Some(body) = body {
            self.visit(&body);
        }

        self.method_depth = method_depth;
        self.visibility_stack.pop();
        self.scopes.pop();
        self.nesting.pop();
    }

    /// Emits the singleton class entry for `attached` the first time one of its singleton members is declared in the
    /// current body, so the companion is only ever contributed together with those members
    fn ensure_singleton_companion(&mut self, attached: &str, written: String, fallback_offset: &Offset) -> String {
        let singleton_fqn = naming::singleton_name(attached);

        let already_emitted = match self.scopes.last() {
            Some(scope) => scope.singletons.contains(&singleton_fqn),
            None => self.top_level_singletons.contains(&singleton_fqn),
        };

        if already_emitted {
            return singleton_fqn;
        }

        let (offset, name_offset) = match self.scopes.last() {
            Some(scope) if scope.fqn == attached => (scope.offset.clone(), scope.name_offset.clone()),
            _ => (fallback_offset.clone(), fallback_offset.clone()),
        };

        let mut nesting = self.nesting.clone();
        nesting.push(written);

        let entry = NamespaceEntry::new(
            singleton_fqn.clone(),
            NamespaceKind::SingletonClass,
            None,
            nesting,
            self.uri_id,
            offset,
            name_offset,
            Vec::new(),
            EntryFlags::empty(),
        );
        self.local_index.add_entry(Entry::Namespace(Box::new(entry)));

        match self.scopes.last_mut() {
            Some(scope) => scope.singletons.push(singleton_fqn.clone()),
            None => self.top_level_singletons.push(singleton_fqn.clone()),
        }

        singleton_fqn
    }

    fn collect_parameters(node: &ruby_prism::DefNode) -> Vec<Parameter> {
        let mut parameters: Vec<Parameter> = Vec::new();

        let Some(parameters_list) = node.parameters() else {
            return parameters;
        };

        let mut push = |location: &ruby_prism::Location, kind: ParameterKind, trim_colon: bool| {
            let mut name = Self::location_to_string(location);
            if trim_colon {
                name = name.trim_end_matches(':').to_string();
            }
            parameters.push(Parameter::new(name, kind, Offset::from_prism_location(location)));
        };

        for parameter in &parameters_list.requireds() {
            push(&parameter.location(), ParameterKind::Required, false);
        }

        for parameter in &parameters_list.optionals() {
            if let Some(optional) = parameter.as_optional_parameter_node() {
                push(&optional.name_loc(), ParameterKind::Optional, false);
            }
        }

        if let Some(rest) = parameters_list.rest()
            && let Some(rest_param) = rest.as_rest_parameter_node()
        {
            let location = rest_param.name_loc().unwrap_or_else(|| rest.location());
            push(&location, ParameterKind::Rest, false);
        }

        for post in &parameters_list.posts() {
            push(&post.location(), ParameterKind::Required, false);
        }

        for keyword in &parameters_list.keywords() {
            if let Some(required) = keyword.as_required_keyword_parameter_node() {
                push(&required.name_loc(), ParameterKind::Keyword, true);
            } else if let Some(optional) = keyword.as_optional_keyword_parameter_node() {
                push(&optional.name_loc(), ParameterKind::KeywordOptional, true);
            }
        }

        if let Some(rest) = parameters_list.keyword_rest() {
            if let Some(keyword_rest) = rest.as_keyword_rest_parameter_node() {
                let location = keyword_rest.name_loc().unwrap_or_else(|| rest.location());
                push(&location, ParameterKind::KeywordRest, false);
            } else if rest.as_forwarding_parameter_node().is_some() {
                push(&rest.location(), ParameterKind::Forward, false);
            }
        }

        if let Some(block) = parameters_list.block() {
            let location = block.name_loc().unwrap_or_else(|| block.location());
            push(&location, ParameterKind::Block, false);
        }

        parameters
    }

    #[allow(clippy::too_many_arguments)]
    fn add_method(
        &mut self,
        owner: String,
        name: String,
        visibility: Visibility,
        parameters: Vec<Parameter>,
        offset: Offset,
        comments: Vec<Comment>,
        flags: EntryFlags,
    ) -> usize {
        let method = MethodEntry::new(owner, name, visibility, parameters, self.uri_id, offset, comments, flags);
        self.local_index.add_entry(Entry::Method(Box::new(method)))
    }

    /// Adds a public singleton copy of the instance method at `position`, as `module_function` does
    fn add_module_function_copy(&mut self, position: usize, attached: &str, fallback_offset: &Offset) {
        let written = format!("<Class:{}>", naming::last_segment(attached));
        let singleton_owner = self.ensure_singleton_companion(attached, written, fallback_offset);

        let copy = match self.local_index.entry_mut(position) {
            Some(Entry::Method(method)) => method.copy_to(singleton_owner, Visibility::Public),
            _ => return,
        };

        self.local_index.add_entry(Entry::Method(Box::new(copy)));
    }

    fn handle_mixin(&mut self, node: &ruby_prism::CallNode, kind: MixinKind) {
        let Some(arguments) = node.arguments() else {
            return;
        };

        let mut mixins: Vec<(String, Offset)> = Vec::new();

        for argument in &arguments.arguments() {
            let offset = Offset::from_prism_location(&argument.location());

            if argument.as_self_node().is_some() {
                if self.scopes.is_empty() {
                    self.local_index.add_diagnostic(
                        Rule::TopLevelMixinSelf,
                        offset,
                        "Top level mixin self".to_string(),
                    );
                } else {
                    mixins.push((format!("::{}", self.current_fqn()), offset));
                }
            } else if let Some(name) = Self::constant_path_name(&argument) {
                mixins.push((name, offset));
            } else {
                self.local_index.add_diagnostic(
                    Rule::DynamicAncestor,
                    offset,
                    "Dynamic mixin argument".to_string(),
                );
                self.visit(&argument);
            }
        }

        let Some(scope) = self.scopes.last() else {
            return;
        };
        let position = scope.entry_position;

        // `include A, B` behaves like `include B` followed by `include A`, so the arguments are recorded in reverse
        for (name, offset) in mixins.into_iter().rev() {
            if let Some(Entry::Namespace(namespace)) = self.local_index.entry_mut(position) {
                namespace.add_mixin(Mixin::new(kind, name, offset));
            }
        }
    }

    fn each_string_or_symbol_arg<F>(node: &ruby_prism::CallNode, mut f: F)
    where
        F: FnMut(String, ruby_prism::Location),
    {
        let Some(arguments) = node.arguments() else {
            return;
        };

        for argument in &arguments.arguments() {
            if let Some(symbol) = argument.as_symbol_node() {
                if let Some(value_loc) = symbol.value_loc() {
                    f(Self::location_to_string(&value_loc), value_loc);
                }
            } else if let Some(string) = argument.as_string_node() {
                f(String::from_utf8_lossy(string.unescaped()).to_string(), argument.location());
            }
        }
    }

    fn index_attr(&mut self, kind: &AttrKind, node: &ruby_prism::CallNode) {
        let call_offset = Offset::from_prism_location(&node.location());
        let modifier = self.current_visibility();
        let comments_offset = if modifier.is_inline {
            modifier.offset.clone()
        } else {
            call_offset
        };
        let (comments, flags) = self.find_comments_for(comments_offset.start());

        // module_function turns attribute methods private without creating singleton copies
        let visibility = if modifier.module_function {
            Visibility::Private
        } else {
            modifier.visibility
        };
        let owner = self.current_owner();

        let mut names: Vec<(String, Offset)> = Vec::new();
        Self::each_string_or_symbol_arg(node, |name, location| {
            names.push((name, Offset::from_prism_location(&location)));
        });

        for (name, offset) in names {
            if matches!(kind, AttrKind::Reader | AttrKind::Accessor) {
                self.add_method(
                    owner.clone(),
                    name.clone(),
                    visibility,
                    Vec::new(),
                    offset.clone(),
                    comments.clone(),
                    flags,
                );
            }

            if matches!(kind, AttrKind::Writer | AttrKind::Accessor) {
                let parameter = Parameter::new("value".to_string(), ParameterKind::Required, offset.clone());
                self.add_method(
                    owner.clone(),
                    format!("{name}="),
                    visibility,
                    vec![parameter],
                    offset,
                    comments.clone(),
                    flags,
                );
            }
        }
    }

    /// Sets the visibility of methods already collected for `owner`
    fn set_visibility_of(&mut self, owner: &str, name: &str, visibility: Visibility) {
        for entry in self.local_index.entries_mut() {
            if let Entry::Method(method) = entry
                && method.owner() == owner
                && method.name() == name
            {
                method.set_visibility(visibility);
            }
        }
    }

    /// Handles `private`, `protected` and `public`
    fn handle_visibility(&mut self, node: &ruby_prism::CallNode, visibility: Visibility) {
        let offset = Offset::from_prism_location(&node.location());

        let Some(arguments) = node.arguments() else {
            // A bare `private` changes the visibility of every method defined after it in the same body
            if let Some(last) = self.visibility_stack.last_mut() {
                *last = VisibilityModifier::new(visibility, false, false, offset);
            }
            return;
        };

        let owner = self.current_owner();

        for argument in &arguments.arguments() {
            if let Some(symbol) = argument.as_symbol_node() {
                if let Some(value_loc) = symbol.value_loc() {
                    self.set_visibility_of(&owner, &Self::location_to_string(&value_loc), visibility);
                }
            } else if let Some(string) = argument.as_string_node() {
                let name = String::from_utf8_lossy(string.unescaped()).to_string();
                self.set_visibility_of(&owner, &name, visibility);
            } else if argument.as_def_node().is_some() || argument.as_call_node().is_some() {
                // `private def foo` and `private attr_reader :foo` only affect that one declaration
                self.visibility_stack
                    .push(VisibilityModifier::new(visibility, false, true, offset.clone()));
                self.visit(&argument);
                self.visibility_stack.pop();
            } else {
                self.local_index.add_diagnostic(
                    Rule::DynamicVisibilityTarget,
                    Offset::from_prism_location(&argument.location()),
                    "Dynamic visibility argument".to_string(),
                );
                self.visit(&argument);
            }
        }
    }

    fn handle_module_function(&mut self, node: &ruby_prism::CallNode) {
        let offset = Offset::from_prism_location(&node.location());

        let Some(arguments) = node.arguments() else {
            if let Some(last) = self.visibility_stack.last_mut() {
                *last = VisibilityModifier::new(Visibility::Private, true, false, offset);
            }
            return;
        };

        let Some(scope) = self.scopes.last() else {
            return;
        };
        let attached = scope.fqn.clone();

        for argument in &arguments.arguments() {
            if argument.as_def_node().is_some() {
                self.visibility_stack
                    .push(VisibilityModifier::new(Visibility::Private, true, true, offset.clone()));
                self.visit(&argument);
                self.visibility_stack.pop();
                continue;
            }

            let name = if let Some(symbol) = argument.as_symbol_node() {
                symbol.value_loc().map(|loc| Self::location_to_string(&loc))
            } else {
                argument
                    .as_string_node()
                    .map(|string| String::from_utf8_lossy(string.unescaped()).to_string())
            };

            let Some(name) = name else {
                self.local_index.add_diagnostic(
                    Rule::DynamicVisibilityTarget,
                    Offset::from_prism_location(&argument.location()),
                    "Dynamic module_function argument".to_string(),
                );
                continue;
            };

            let positions: Vec<usize> = self
                .local_index
                .entries()
                .iter()
                .enumerate()
                .filter_map(|(position, entry)| {
                    entry
                        .as_method()
                        .filter(|method| method.owner() == attached && method.name() == name)
                        .map(|_| position)
                })
                .collect();

            for position in positions {
                if let Some(Entry::Method(method)) = self.local_index.entry_mut(position) {
                    method.set_visibility(Visibility::Private);
                }
                self.add_module_function_copy(position, &attached, &offset);
            }
        }
    }

    /// Handles `private_class_method` and `public_class_method`
    fn handle_class_method_visibility(&mut self, node: &ruby_prism::CallNode, visibility: Visibility) {
        let Some(arguments) = node.arguments() else {
            return;
        };
        let Some(scope) = self.scopes.last() else {
            return;
        };
        let owner = naming::singleton_name(&scope.fqn);

        for argument in &arguments.arguments() {
            let name = if let Some(def) = argument.as_def_node() {
                self.visit(&argument);
                Some(Self::location_to_string(&def.name_loc()))
            } else if let Some(symbol) = argument.as_symbol_node() {
                symbol.value_loc().map(|loc| Self::location_to_string(&loc))
            } else {
                argument
                    .as_string_node()
                    .map(|string| String::from_utf8_lossy(string.unescaped()).to_string())
            };

            match name {
                Some(name) => self.set_visibility_of(&owner, &name, visibility),
                None => self.local_index.add_diagnostic(
                    Rule::DynamicVisibilityTarget,
                    Offset::from_prism_location(&argument.location()),
                    "Dynamic class method visibility argument".to_string(),
                ),
            }
        }
    }

    fn add_constant(&mut self, name: &str, location: &ruby_prism::Location) {
        if !self.in_declaration_context() {
            return;
        }

        let fqn = self.qualify_constant(name);
        let offset = Offset::from_prism_location(location);
        let (comments, flags) = self.find_comments_for(offset.start());

        let constant = ConstantEntry::new(fqn, self.uri_id, offset, comments, flags);
        self.local_index.add_entry(Entry::Constant(Box::new(constant)));
    }

    /// Visits every part of a call node, except for the message itself
    fn visit_call_node_parts(&mut self, node: &ruby_prism::CallNode) {
        if let Some(receiver) = node.receiver() {
            self.visit(&receiver);
        }

        if let Some(arguments) = node.arguments() {
            self.visit_arguments_node(&arguments);
        }

        if let Some(block) = node.block() {
            self.visit(&block);
        }
    }
}

struct CommentGroup {
    end_offset: usize,
    comments: Vec<Comment>,
    deprecated: bool,
}

impl CommentGroup {
    fn new() -> Self {
        Self {
            end_offset: 0,
            comments: Vec::new(),
            deprecated: false,
        }
    }

    // Comments on consecutive lines belong to the same group
    fn accepts(&self, next: &ruby_prism::Comment, source: &str) -> bool {
        let Some(between) = source
            .as_bytes()
            .get(self.end_offset..next.location().start_offset())
        else {
            return false;
        };

        between.iter().all(u8::is_ascii_whitespace) && bytecount::count(between, b'\n') <= 1
    }

    fn add_comment(&mut self, comment: &ruby_prism::Comment) {
        self.end_offset = comment.location().end_offset();
        let text = String::from_utf8_lossy(comment.location().as_slice()).trim().to_string();

        if text.starts_with("# @deprecated") {
            self.deprecated = true;
        }

        self.comments
            .push(Comment::new(Offset::from_prism_location(&comment.location()), text));
    }

    fn flags(&self) -> EntryFlags {
        if self.deprecated {
            EntryFlags::DEPRECATED
        } else {
            EntryFlags::empty()
        }
    }
}

impl Visit<'_> for Collector<'_> {
    fn visit_class_node(&mut self, node: &ruby_prism::ClassNode<'_>) {
        let constant_path = node.constant_path();

        let superclass_name = node.superclass().and_then(|superclass| {
            let name = Self::constant_path_name(&superclass);

            if name.is_none() {
                self.local_index.add_diagnostic(
                    Rule::DynamicAncestor,
                    Offset::from_prism_location(&superclass.location()),
                    "Dynamic superclass".to_string(),
                );
                self.visit(&superclass);
            }

            name
        });

        let Some(name) = Self::constant_path_name(&constant_path) else {
            self.visit(&constant_path);
            return;
        };

        let fqn = self.qualify_constant(&name);
        let name_offset = Offset::from_prism_location(&Self::constant_name_location(&constant_path));
        self.handle_namespace(
            NamespaceKind::Class,
            name,
            fqn,
            superclass_name,
            &node.location(),
            name_offset,
            node.body(),
        );
    }

    fn visit_module_node(&mut self, node: &ruby_prism::ModuleNode) {
        let constant_path = node.constant_path();

        let Some(name) = Self::constant_path_name(&constant_path) else {
            self.visit(&constant_path);
            return;
        };

        let fqn = self.qualify_constant(&name);
        let name_offset = Offset::from_prism_location(&Self::constant_name_location(&constant_path));
        self.handle_namespace(
            NamespaceKind::Module,
            name,
            fqn,
            None,
            &node.location(),
            name_offset,
            node.body(),
        );
    }

    fn visit_singleton_class_node(&mut self, node: &ruby_prism::SingletonClassNode) {
        let expression = node.expression();
        let name_offset = Offset::from_prism_location(&expression.location());

        let target = if expression.as_self_node().is_some() {
            // `class << self`
            self.scopes.last().map(|scope| {
                let attached = scope.fqn.clone();
                (format!("<Class:{}>", naming::last_segment(&attached)), attached)
            })
        } else {
            // `class << Foo` or `class << Foo::Bar`
            Self::constant_path_name(&expression).map(|written| {
                let attached = self.resolve_receiver_constant(&written);
                (format!("{}{}", naming::SEPARATOR, naming::singleton_name(&attached)), attached)
            })
        };

        let Some((written, attached)) = target else {
            self.local_index.add_diagnostic(
                Rule::DynamicSingletonDefinition,
                Offset::from_prism_location(&node.location()),
                "Dynamic singleton class definition".to_string(),
            );
            self.visit(&expression);
            return;
        };

        let fqn = naming::singleton_name(&attached);
        if let Some(scope) = self.scopes.last_mut()
            && !scope.singletons.contains(&fqn)
        {
            scope.singletons.push(fqn.clone());
        }

        self.handle_namespace(
            NamespaceKind::SingletonClass,
            written,
            fqn,
            None,
            &node.location(),
            name_offset,
            node.body(),
        );
    }

    fn visit_def_node(&mut self, node: &ruby_prism::DefNode) {
        let name = Self::location_to_string(&node.name_loc());
        let offset = Offset::from_prism_location(&node.location());
        let parameters = Self::collect_parameters(node);
        let modifier = self.current_visibility();

        let owner = match node.receiver() {
            None => Some(self.current_owner()),
            // `def self.foo`
            Some(receiver) if receiver.as_self_node().is_some() => {
                self.scopes.last().map(|scope| scope.fqn.clone()).map(|attached| {
                    let written = format!("<Class:{}>", naming::last_segment(&attached));
                    self.ensure_singleton_companion(&attached, written, &offset)
                })
            }
            // `def Foo.bar`
            Some(receiver) => Self::constant_path_name(&receiver).map(|written| {
                let attached = self.resolve_receiver_constant(&written);
                let written = format!("{}{}", naming::SEPARATOR, naming::singleton_name(&attached));
                self.ensure_singleton_companion(&attached, written, &offset)
            }),
        };

        let Some(owner) = owner else {
            self.local_index.add_diagnostic(
                Rule::DynamicSingletonDefinition,
                offset,
                "Dynamic receiver for singleton method definition".to_string(),
            );

            if let Some(receiver) = node.receiver() {
                self.visit(&receiver);
            }
            return;
        };

        let has_receiver = node.receiver().is_some();
        let (visibility, comments_offset) = if has_receiver {
            (Visibility::Public, offset.clone())
        } else if modifier.is_inline {
            // Comments for `private def foo` sit above the visibility call
            (modifier.visibility, modifier.offset.clone())
        } else {
            (modifier.visibility, offset.clone())
        };
        let (comments, flags) = self.find_comments_for(comments_offset.start());

        let position = self.add_method(
            owner.clone(),
            name,
            visibility,
            parameters,
            offset.clone(),
            comments,
            flags,
        );

        if !has_receiver && modifier.module_function && self.in_declaration_context() && !self.scopes.is_empty() {
            self.add_module_function_copy(position, &owner, &offset);
        }

        if let Some(body) = node.body() {
            self.method_depth += 1;
            self.visit(&body);
            self.method_depth -= 1;
        }
    }

    fn visit_call_node(&mut self, node: &ruby_prism::CallNode) {
        let receiver = node.receiver();
        let self_receiver = receiver.is_none() || receiver.as_ref().is_some_and(|r| r.as_self_node().is_some());

        if !self_receiver || !self.in_declaration_context() || node.message_loc().is_none() {
            self.visit_call_node_parts(node);
            return;
        }

        let message = String::from_utf8_lossy(node.name().as_slice()).to_string();

        match message.as_str() {
            "attr_accessor" => self.index_attr(&AttrKind::Accessor, node),
            "attr_reader" => self.index_attr(&AttrKind::Reader, node),
            "attr_writer" => self.index_attr(&AttrKind::Writer, node),
            "attr" => {
                // `attr :foo, true` defines both reader and writer, every other form only readers
                let create_writer = node.arguments().is_some_and(|arguments| {
                    let args: Vec<_> = arguments.arguments().iter().collect();
                    matches!(args.as_slice(), [_, ruby_prism::Node::TrueNode { .. }])
                });

                if create_writer {
                    self.index_attr(&AttrKind::Accessor, node);
                } else {
                    self.index_attr(&AttrKind::Reader, node);
                }
            }
            "include" => self.handle_mixin(node, MixinKind::Include),
            "prepend" => self.handle_mixin(node, MixinKind::Prepend),
            "extend" => self.handle_mixin(node, MixinKind::Extend),
            "private" | "protected" | "public" => {
                if let Some(visibility) = Visibility::from_method_name(&message) {
                    self.handle_visibility(node, visibility);
                }
            }
            "private_class_method" | "public_class_method" => {
                if let Some(visibility) = Visibility::from_method_name(&message) {
                    self.handle_class_method_visibility(node, visibility);
                }
            }
            "module_function" => self.handle_module_function(node),
            _ => self.visit_call_node_parts(node),
        }
    }

    fn visit_constant_write_node(&mut self, node: &ruby_prism::ConstantWriteNode) {
        let name_loc = node.name_loc();
        self.add_constant(&Self::location_to_string(&name_loc), &name_loc);
        self.visit(&node.value());
    }

    fn visit_constant_or_write_node(&mut self, node: &ruby_prism::ConstantOrWriteNode) {
        let name_loc = node.name_loc();
        self.add_constant(&Self::location_to_string(&name_loc), &name_loc);
        self.visit(&node.value());
    }

    fn visit_constant_path_write_node(&mut self, node: &ruby_prism::ConstantPathWriteNode) {
        let target = node.target();
        if let Some(name) = Self::constant_path_name(&target.as_node()) {
            self.add_constant(&name, &target.location());
        }
        self.visit(&node.value());
    }

    fn visit_constant_path_or_write_node(&mut self, node: &ruby_prism::ConstantPathOrWriteNode) {
        let target = node.target();
        if let Some(name) = Self::constant_path_name(&target.as_node()) {
            self.add_constant(&name, &target.location());
        }
        self.visit(&node.value());
    }

    fn visit_multi_write_node(&mut self, node: &ruby_prism::MultiWriteNode) {
        for left in &node.lefts() {
            if let Some(name) = Self::constant_path_name(&left) {
                self.add_constant(&name, &left.location());
            }
        }

        self.visit(&node.value());
    }
}
