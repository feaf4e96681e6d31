//! Naming scheme for fully qualified names.
//!
//! Namespaces and constants use `::` separated paths (`Foo::Bar`). The singleton class of a namespace is a synthetic
//! child named after the last segment of its attached object: `Foo::Bar::<Class:Bar>`. Singletons nest, so the
//! singleton of `Foo::<Class:Foo>` is `Foo::<Class:Foo>::<Class:<Class:Foo>>`. Methods are keyed by their owner and
//! name joined with `#`, like `Foo#bar` or `Foo::<Class:Foo>#bar`.

pub const SEPARATOR: &str = "::";
pub const OBJECT: &str = "Object";
pub const BASIC_OBJECT: &str = "BasicObject";
pub const MODULE: &str = "Module";
pub const CLASS: &str = "Class";

/// Returns the last `::` segment of a name.
#[must_use]
pub fn last_segment(fqn: &str) -> &str {
    fqn.rsplit(SEPARATOR).next().unwrap_or(fqn)
}

/// Returns the FQN of the singleton class for `fqn`
#[must_use]
pub fn singleton_name(fqn: &str) -> String {
    format!("{fqn}{SEPARATOR}<Class:{}>", last_segment(fqn))
}

/// Returns the attached object's FQN if `fqn` names a singleton class.
#[must_use]
pub fn attached_name(fqn: &str) -> Option<&str> {
    let (attached, last) = fqn.rsplit_once(SEPARATOR)?;
    let inner = last.strip_prefix("<Class:")?.strip_suffix('>')?;

    (inner == last_segment(attached)).then_some(attached)
}

#[must_use]
pub fn is_singleton(fqn: &str) -> bool {
    attached_name(fqn).is_some()
}

#[must_use]
pub fn method_key(owner: &str, name: &str) -> String {
    format!("{owner}#{name}")
}

/// Joins a scope and a name. An empty scope is the top level.
#[must_use]
pub fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}{SEPARATOR}{name}")
    }
}

/// Turns a lexical nesting (scope names as written, outermost first) into the FQNs of every level, innermost first.
///
/// `["Foo", "Bar::Baz"]` produces `["Foo::Bar::Baz", "Foo"]`. A scope written with a leading `::` restarts at the top
/// level.
#[must_use]
pub fn nesting_levels(nesting: &[String]) -> Vec<String> {
    let mut levels: Vec<String> = Vec::with_capacity(nesting.len());

    for scope in nesting {
        let level = if let Some(absolute) = scope.strip_prefix(SEPARATOR) {
            absolute.to_string()
        } else {
            qualify(levels.last().map_or("", String::as_str), scope)
        };
        levels.push(level);
    }

    levels.reverse();
    levels
}
