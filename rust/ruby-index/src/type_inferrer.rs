//! Best-effort guessing of the type of a call's receiver.
//!
//! This is a heuristic, not a type checker. Only `self`, constants, literals and `super` have a known type; anything
//! else is guessed from nearby assignments and declarations, and the guess is flagged as such.

use crate::model::index::Index;
use crate::model::naming;
use crate::node_context::{BindingValue, NodeContext, ReceiverShape};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredType {
    name: String,
    guessed: bool,
}

impl InferredType {
    fn known(name: String) -> Self {
        Self { name, guessed: false }
    }

    fn guessed(name: String) -> Self {
        Self { name, guessed: true }
    }

    /// The fully qualified name of the type. Singleton classes stand for the namespace object itself
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the type was guessed from names alone
    #[must_use]
    pub fn guessed(&self) -> bool {
        self.guessed
    }
}

/// Infers the type of the receiver described by `context`. Returns `None` only when the receiver is a constant that
/// can't be resolved
#[must_use]
pub fn infer_receiver_type(index: &Index, context: &NodeContext) -> Option<InferredType> {
    match context.receiver() {
        ReceiverShape::SelfReference => Some(InferredType::known(self_type(context))),
        ReceiverShape::InstanceVariable => Some(InferredType::known(self_type(context))),
        ReceiverShape::Constant(name) => index
            .resolve_constant_name(name, context.nesting())
            .map(|fqn| InferredType::known(naming::singleton_name(&fqn))),
        ReceiverShape::NewInstance(name) => index
            .resolve_constant_name(name, context.nesting())
            .map(InferredType::known),
        ReceiverShape::Literal(class) => Some(InferredType::known((*class).to_string())),
        // `super` keeps `self`, so calls are made on the current namespace rather than its superclass
        ReceiverShape::Super => Some(InferredType::known(
            context
                .namespace_fqn()
                .unwrap_or_else(|| naming::OBJECT.to_string()),
        )),
        ReceiverShape::Identifier(name) => Some(InferredType::guessed(guess_from_name(index, context, name))),
        ReceiverShape::Unknown => Some(InferredType::guessed(fallback_type(context))),
    }
}

/// The type of `self`. Inside a method it's the enclosing namespace (already a singleton class for singleton methods).
/// Directly in a namespace body it's the namespace object, so its singleton class. At the top level it's `Object`
fn self_type(context: &NodeContext) -> String {
    let Some(fqn) = context.namespace_fqn() else {
        return naming::OBJECT.to_string();
    };

    if context.surrounding_method().is_some() {
        fqn
    } else {
        naming::singleton_name(&fqn)
    }
}

fn fallback_type(context: &NodeContext) -> String {
    context
        .namespace_fqn()
        .unwrap_or_else(|| naming::OBJECT.to_string())
}

/// `@current_user` and `current_user` both become `CurrentUser`
fn camelize(name: &str) -> String {
    name.trim_start_matches('@')
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn guess_from_name(index: &Index, context: &NodeContext, name: &str) -> String {
    let camelized = camelize(name);

    for binding in context.bindings().iter().rev() {
        if !camelize(binding.name()).eq_ignore_ascii_case(&camelized) {
            continue;
        }

        let guess = match binding.value() {
            BindingValue::Declaration(fqn) => Some(fqn.clone()),
            BindingValue::Constant(constant) => index
                .resolve_constant_name(constant, context.nesting())
                .map(|fqn| naming::singleton_name(&fqn)),
            BindingValue::NewInstance(constant) => index.resolve_constant_name(constant, context.nesting()),
            BindingValue::Literal(class) => Some((*class).to_string()),
            // Assigned something we can't tell, keep looking further up
            BindingValue::Unknown => None,
        };

        if let Some(guess) = guess {
            return guess;
        }
    }

    if let Some(fqn) = index.resolve_constant_name(&camelized, context.nesting())
        && index.is_namespace(&fqn)
    {
        return fqn;
    }

    fallback_type(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{IndexTest, normalize_indentation};

    fn infer(index: &Index, source: &str) -> Option<InferredType> {
        let source = normalize_indentation(source);
        let offset = source.find('|').expect("missing cursor marker");
        let source = source.replacen('|', "", 1);
        let context = NodeContext::locate(&source, u32::try_from(offset).unwrap()).expect("no node at cursor");

        infer_receiver_type(index, &context)
    }

    fn infer_name(index: &Index, source: &str) -> String {
        infer(index, source).map(|inferred| inferred.name().to_string()).unwrap()
    }

    #[test]
    fn self_receivers() {
        let context = IndexTest::new();
        let index = context.index();

        assert_eq!(infer_name(index, "|foo"), "Object");
        assert_eq!(infer_name(index, "def top; self.|foo; end"), "Object");
        assert_eq!(infer_name(index, "class Foo; def bar; self.|baz; end; end"), "Foo");
        assert_eq!(infer_name(index, "class Foo; |attr_reader :x; end"), "Foo::<Class:Foo>");
        assert_eq!(infer_name(index, "class Foo; def self.bar; |baz; end; end"), "Foo::<Class:Foo>");
        assert_eq!(
            infer_name(index, "class Foo; class << self; def bar; |baz; end; end; end"),
            "Foo::<Class:Foo>"
        );
        assert_eq!(
            infer_name(index, "class Foo; class << self; |baz; end; end"),
            "Foo::<Class:Foo>::<Class:<Class:Foo>>"
        );
        assert_eq!(infer_name(index, "module Foo; |@bar; end"), "Foo::<Class:Foo>");
        assert_eq!(infer_name(index, "module Foo; def x; |@bar; end; end"), "Foo");
    }

    #[test]
    fn constant_receivers() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            module Foo
              class Bar; end
            end
            "
        });

        assert_eq!(infer_name(context.index(), "Foo::Bar.|new"), "Foo::Bar::<Class:Bar>");
        assert_eq!(infer_name(context.index(), "module Foo; Bar.|new; end"), "Foo::Bar::<Class:Bar>");
        assert_eq!(infer_name(context.index(), "Foo::Bar.new.|baz"), "Foo::Bar");
        assert_eq!(infer(context.index(), "Missing.|new"), None);
    }

    #[test]
    fn literal_receivers() {
        let context = IndexTest::new();
        let index = context.index();

        for (source, expected) in [
            ("'a'.|upcase", "String"),
            ("\"a#{1}\".|upcase", "String"),
            (":a.|to_s", "Symbol"),
            ("1.|to_s", "Integer"),
            ("1.5.|to_s", "Float"),
            ("1r.|to_s", "Rational"),
            ("1i.|to_s", "Complex"),
            ("[].|map", "Array"),
            ("{}.|keys", "Hash"),
            ("true.|to_s", "TrueClass"),
            ("false.|to_s", "FalseClass"),
            ("nil.|to_a", "NilClass"),
            ("/a/.|match", "Regexp"),
            ("(1..2).|to_a", "Range"),
            ("->(x) { x }.|call", "Proc"),
        ] {
            let inferred = infer(index, source).unwrap();
            assert_eq!(inferred.name(), expected, "for {source}");
            assert!(!inferred.guessed());
        }
    }

    #[test]
    fn guessing_from_prior_declarations() {
        let mut context = IndexTest::new();
        context.index_uri("file:///user.rb", "class User; end");

        let inferred = infer(context.index(), {
            "
            class User; end
            user = something
            user.|name
            "
        })
        .unwrap();

        assert_eq!(inferred.name(), "User");
        assert!(inferred.guessed());
    }

    #[test]
    fn guessing_from_assignments() {
        let mut context = IndexTest::new();
        context.index_uri("file:///models.rb", "class Admin; end\nclass Account; end");

        assert_eq!(infer_name(context.index(), "person = Admin.new\nperson.|name"), "Admin");
        assert_eq!(infer_name(context.index(), "klass = Admin\nklass.|find"), "Admin::<Class:Admin>");
        assert_eq!(infer_name(context.index(), "@title = 'x'\n@title.|upcase"), "String");
        assert_eq!(infer_name(context.index(), "account = load\naccount.|name"), "Account");
    }

    #[test]
    fn guessing_falls_back_to_the_enclosing_namespace() {
        let context = IndexTest::new();

        assert_eq!(infer_name(context.index(), "thing.|name"), "Object");
        assert_eq!(infer_name(context.index(), "class Foo; def bar; thing.|name; end; end"), "Foo");
        assert!(infer(context.index(), "thing.|name").unwrap().guessed());
    }

    #[test]
    fn super_keeps_the_current_namespace() {
        let context = IndexTest::new();

        assert_eq!(
            infer_name(context.index(), "class Foo < Bar; def initialize; |super; end; end"),
            "Foo"
        );
        assert_eq!(
            infer_name(context.index(), "class Foo < Bar; def initialize(a); |super(a); end; end"),
            "Foo"
        );
    }

    #[test]
    fn camelizing() {
        assert_eq!(camelize("current_user"), "CurrentUser");
        assert_eq!(camelize("@user"), "User");
        assert_eq!(camelize("__private"), "Private");
    }
}
