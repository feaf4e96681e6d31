//! The lexical context around a position in a Ruby source, used to guess the type of a call's receiver.
//!
//! [`NodeContext::locate`] parses the source and finds the innermost call, `super` call or instance variable read that
//! covers the given byte offset. Along the way it keeps track of the enclosing namespaces and method, and of every
//! simple assignment and namespace declaration seen before the target in the bodies that enclose it.

use ruby_prism::Visit;

use crate::model::entry::Dispatch;
use crate::model::naming;
use crate::offset::Offset;

/// The syntactic shape of the receiver at the target position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverShape {
    /// `self.foo`, or `foo` called without a receiver
    SelfReference,
    /// The target is an instance variable read, such as `@foo`. Its owner is `self`
    InstanceVariable,
    /// `Foo.bar` or `Foo::Bar.baz`, with the constant as written
    Constant(String),
    /// `Foo.new.bar`, with the instantiated constant as written
    NewInstance(String),
    /// A literal, with the name of its built-in class
    Literal(&'static str),
    /// A local variable, an instance variable or the message of another call, such as `user` in `user.name`
    Identifier(String),
    /// `super` or `super(...)`
    Super,
    /// Anything else, such as a parenthesized expression
    Unknown,
}

/// What a binding found before the target assigns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingValue {
    /// A `class` or `module` declaration, with its fully qualified name
    Declaration(String),
    /// `x = Foo`
    Constant(String),
    /// `x = Foo.new`
    NewInstance(String),
    /// `x = "string"`
    Literal(&'static str),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The assigned variable (`user`, `@user`) or the last segment of the declared namespace
    name: String,
    value: BindingValue,
}

impl Binding {
    #[must_use]
    pub fn new(name: String, value: BindingValue) -> Self {
        Self { name, value }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &BindingValue {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurroundingMethod {
    name: String,
    dispatch: Dispatch,
}

impl SurroundingMethod {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
    /// Lexical scope names as written, outermost first. Singleton class bodies and singleton methods add a
    /// `<Class:Name>` scope
    nesting: Vec<String>,
    surrounding_method: Option<SurroundingMethod>,
    receiver: ReceiverShape,
    /// Bindings that precede the target, outermost body first and in source order
    bindings: Vec<Binding>,
    offset: Offset,
}

impl NodeContext {
    #[must_use]
    pub fn new(
        nesting: Vec<String>,
        surrounding_method: Option<SurroundingMethod>,
        receiver: ReceiverShape,
        bindings: Vec<Binding>,
    ) -> Self {
        Self {
            nesting,
            surrounding_method,
            receiver,
            bindings,
            offset: Offset::new(0, 0),
        }
    }

    /// Builds the context of the innermost call, `super` or instance variable read covering `offset` in `source`.
    /// Returns `None` if there is no such node
    #[must_use]
    pub fn locate(source: &str, offset: u32) -> Option<Self> {
        let result = ruby_prism::parse(source.as_bytes());
        let mut locator = Locator::new(offset);
        locator.visit(&result.node());
        locator.found
    }

    #[must_use]
    pub fn nesting(&self) -> &[String] {
        &self.nesting
    }

    /// The fully qualified name of the innermost namespace, if any
    #[must_use]
    pub fn namespace_fqn(&self) -> Option<String> {
        naming::nesting_levels(&self.nesting).into_iter().next()
    }

    #[must_use]
    pub fn surrounding_method(&self) -> Option<&SurroundingMethod> {
        self.surrounding_method.as_ref()
    }

    #[must_use]
    pub fn receiver(&self) -> &ReceiverShape {
        &self.receiver
    }

    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// The location of the target node
    #[must_use]
    pub fn offset(&self) -> &Offset {
        &self.offset
    }
}

fn location_to_string(location: &ruby_prism::Location) -> String {
    String::from_utf8_lossy(location.as_slice()).to_string()
}

fn constant_name(node: &ruby_prism::Node) -> Option<String> {
    match node {
        ruby_prism::Node::ConstantReadNode { .. } | ruby_prism::Node::ConstantPathNode { .. } => {
            Some(location_to_string(&node.location()))
        }
        _ => None,
    }
}

/// The built-in class of a literal node
fn literal_class(node: &ruby_prism::Node) -> Option<&'static str> {
    let class = match node {
        ruby_prism::Node::StringNode { .. }
        | ruby_prism::Node::InterpolatedStringNode { .. }
        | ruby_prism::Node::XStringNode { .. }
        | ruby_prism::Node::InterpolatedXStringNode { .. } => "String",
        ruby_prism::Node::SymbolNode { .. } | ruby_prism::Node::InterpolatedSymbolNode { .. } => "Symbol",
        ruby_prism::Node::IntegerNode { .. } => "Integer",
        ruby_prism::Node::FloatNode { .. } => "Float",
        ruby_prism::Node::RationalNode { .. } => "Rational",
        ruby_prism::Node::ImaginaryNode { .. } => "Complex",
        ruby_prism::Node::ArrayNode { .. } => "Array",
        ruby_prism::Node::HashNode { .. } => "Hash",
        ruby_prism::Node::TrueNode { .. } => "TrueClass",
        ruby_prism::Node::FalseNode { .. } => "FalseClass",
        ruby_prism::Node::NilNode { .. } => "NilClass",
        ruby_prism::Node::RegularExpressionNode { .. } | ruby_prism::Node::InterpolatedRegularExpressionNode { .. } => {
            "Regexp"
        }
        ruby_prism::Node::RangeNode { .. } => "Range",
        ruby_prism::Node::LambdaNode { .. } => "Proc",
        _ => return None,
    };

    Some(class)
}

/// The constant instantiated by `Foo.new`
fn instantiated_constant(node: &ruby_prism::Node) -> Option<String> {
    let call = node.as_call_node()?;

    if call.name().as_slice() != b"new" {
        return None;
    }

    constant_name(&call.receiver()?)
}

/// Parentheses around a single statement, as in `(1..2).to_a`, stand for that statement
fn unwrap_parentheses<'pr>(node: ruby_prism::Node<'pr>) -> ruby_prism::Node<'pr> {
    let mut node = node;

    while let Some(parentheses) = node.as_parentheses_node() {
        let Some(body) = parentheses.body() else {
            break;
        };

        node = match body.as_statements_node() {
            Some(statements) => {
                let mut statements: Vec<_> = statements.body().iter().collect();
                match (statements.pop(), statements.is_empty()) {
                    (Some(statement), true) => statement,
                    _ => break,
                }
            }
            None => body,
        };
    }

    node
}

fn receiver_shape(receiver: Option<ruby_prism::Node>) -> ReceiverShape {
    let Some(receiver) = receiver.map(unwrap_parentheses) else {
        return ReceiverShape::SelfReference;
    };

    if receiver.as_self_node().is_some() {
        return ReceiverShape::SelfReference;
    }

    if let Some(name) = constant_name(&receiver) {
        return ReceiverShape::Constant(name);
    }

    if let Some(class) = literal_class(&receiver) {
        return ReceiverShape::Literal(class);
    }

    if let Some(name) = instantiated_constant(&receiver) {
        return ReceiverShape::NewInstance(name);
    }

    match &receiver {
        ruby_prism::Node::LocalVariableReadNode { .. } | ruby_prism::Node::InstanceVariableReadNode { .. } => {
            ReceiverShape::Identifier(location_to_string(&receiver.location()))
        }
        ruby_prism::Node::CallNode { .. } => receiver
            .as_call_node()
            .map(|call| ReceiverShape::Identifier(String::from_utf8_lossy(call.name().as_slice()).to_string()))
            .unwrap_or(ReceiverShape::Unknown),
        _ => ReceiverShape::Unknown,
    }
}

fn binding_value(value: &ruby_prism::Node) -> BindingValue {
    if let Some(name) = constant_name(value) {
        BindingValue::Constant(name)
    } else if let Some(name) = instantiated_constant(value) {
        BindingValue::NewInstance(name)
    } else if let Some(class) = literal_class(value) {
        BindingValue::Literal(class)
    } else {
        BindingValue::Unknown
    }
}

struct Locator {
    offset: u32,
    nesting: Vec<String>,
    methods: Vec<SurroundingMethod>,
    /// Bindings of each enclosing body, outermost first
    frames: Vec<Vec<Binding>>,
    found: Option<NodeContext>,
}

impl Locator {
    fn new(offset: u32) -> Self {
        Self {
            offset,
            nesting: Vec::new(),
            methods: Vec::new(),
            frames: vec![Vec::new()],
            found: None,
        }
    }

    fn covers(&self, location: &ruby_prism::Location) -> bool {
        Offset::from_prism_location(location).contains(self.offset)
    }

    fn innermost_fqn(&self) -> Option<String> {
        naming::nesting_levels(&self.nesting).into_iter().next()
    }

    /// The absolute scope of the singleton class of the constant `name`, matched against the enclosing namespaces
    fn singleton_scope(&self, name: &str) -> String {
        let attached = match name.strip_prefix(naming::SEPARATOR) {
            Some(absolute) => absolute.to_string(),
            None => {
                let (head, rest) = match name.split_once(naming::SEPARATOR) {
                    Some((head, rest)) => (head, Some(rest)),
                    None => (name, None),
                };

                naming::nesting_levels(&self.nesting)
                    .into_iter()
                    .find(|level| naming::last_segment(level) == head)
                    .map_or_else(
                        || name.to_string(),
                        |level| rest.map_or_else(|| level.clone(), |rest| naming::qualify(&level, rest)),
                    )
            }
        };

        format!("{}{}", naming::SEPARATOR, naming::singleton_name(&attached))
    }

    fn add_binding(&mut self, binding: Binding) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(binding);
        }
    }

    fn record(&mut self, location: &ruby_prism::Location, receiver: ReceiverShape) {
        self.found = Some(NodeContext {
            nesting: self.nesting.clone(),
            surrounding_method: self.methods.last().cloned(),
            receiver,
            bindings: self.frames.iter().flatten().cloned().collect(),
            offset: Offset::from_prism_location(location),
        });
    }

    /// Declares a namespace in the enclosing body, then visits its own body with fresh bindings
    fn with_namespace<F>(&mut self, written: String, declared: bool, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.nesting.push(written);

        if declared && let Some(fqn) = self.innermost_fqn() {
            let name = naming::last_segment(&fqn).to_string();
            if let Some(frame) = self.frames.iter_mut().rev().nth(1) {
                frame.push(Binding::new(name, BindingValue::Declaration(fqn)));
            }
        }

        let methods = std::mem::take(&mut self.methods);
        f(self);
        self.methods = methods;

        self.nesting.pop();
    }
}

impl Visit<'_> for Locator {
    fn visit_class_node(&mut self, node: &ruby_prism::ClassNode<'_>) {
        if let Some(superclass) = node.superclass() {
            self.visit(&superclass);
        }

        let written = location_to_string(&node.constant_path().location());
        self.frames.push(Vec::new());
        self.with_namespace(written, true, |locator| {
            if let Some(body) = node.body() {
                locator.visit(&body);
            }
        });
        self.frames.pop();
    }

    fn visit_module_node(&mut self, node: &ruby_prism::ModuleNode<'_>) {
        let written = location_to_string(&node.constant_path().location());
        self.frames.push(Vec::new());
        self.with_namespace(written, true, |locator| {
            if let Some(body) = node.body() {
                locator.visit(&body);
            }
        });
        self.frames.pop();
    }

    fn visit_singleton_class_node(&mut self, node: &ruby_prism::SingletonClassNode<'_>) {
        let expression = node.expression();

        let written = if expression.as_self_node().is_some() {
            self.innermost_fqn()
                .map_or_else(|| naming::OBJECT.to_string(), |fqn| format!("<Class:{}>", naming::last_segment(&fqn)))
        } else if let Some(name) = constant_name(&expression) {
            self.singleton_scope(&name)
        } else {
            self.visit(&expression);
            return;
        };

        self.frames.push(Vec::new());
        self.with_namespace(written, false, |locator| {
            if let Some(body) = node.body() {
                locator.visit(&body);
            }
        });
        self.frames.pop();
    }

    fn visit_def_node(&mut self, node: &ruby_prism::DefNode<'_>) {
        let singleton_scope = match node.receiver() {
            None => None,
            Some(receiver) if receiver.as_self_node().is_some() => Some(
                self.innermost_fqn()
                    .map_or_else(|| naming::OBJECT.to_string(), |fqn| format!("<Class:{}>", naming::last_segment(&fqn))),
            ),
            Some(receiver) => constant_name(&receiver).map(|name| self.singleton_scope(&name)),
        };

        let pushed = singleton_scope.is_some();
        if let Some(scope) = singleton_scope {
            self.nesting.push(scope);
        }

        let dispatch = self
            .innermost_fqn()
            .map_or(Dispatch::Instance, |fqn| Dispatch::for_owner(&fqn));
        self.methods.push(SurroundingMethod {
            name: location_to_string(&node.name_loc()),
            dispatch,
        });
        self.frames.push(Vec::new());

        if let Some(parameters) = node.parameters() {
            self.visit_parameters_node(&parameters);
        }

        if let Some(body) = node.body() {
            self.visit(&body);
        }

        self.frames.pop();
        self.methods.pop();

        if pushed {
            self.nesting.pop();
        }
    }

    fn visit_call_node(&mut self, node: &ruby_prism::CallNode<'_>) {
        let location = node.location();

        if self.covers(&location) {
            self.record(&location, receiver_shape(node.receiver()));
        }

        ruby_prism::visit_call_node(self, node);
    }

    fn visit_super_node(&mut self, node: &ruby_prism::SuperNode<'_>) {
        let location = node.location();

        if self.covers(&location) {
            self.record(&location, ReceiverShape::Super);
        }

        ruby_prism::visit_super_node(self, node);
    }

    fn visit_forwarding_super_node(&mut self, node: &ruby_prism::ForwardingSuperNode<'_>) {
        let location = node.location();

        if self.covers(&location) {
            self.record(&location, ReceiverShape::Super);
        }

        ruby_prism::visit_forwarding_super_node(self, node);
    }

    fn visit_instance_variable_read_node(&mut self, node: &ruby_prism::InstanceVariableReadNode<'_>) {
        let location = node.location();

        if self.covers(&location) {
            self.record(&location, ReceiverShape::InstanceVariable);
        }
    }

    fn visit_local_variable_write_node(&mut self, node: &ruby_prism::LocalVariableWriteNode<'_>) {
        let value = node.value();
        self.visit(&value);
        self.add_binding(Binding::new(location_to_string(&node.name_loc()), binding_value(&value)));
    }

    fn visit_instance_variable_write_node(&mut self, node: &ruby_prism::InstanceVariableWriteNode<'_>) {
        let value = node.value();
        self.visit(&value);
        self.add_binding(Binding::new(location_to_string(&node.name_loc()), binding_value(&value)));
    }
}
