//! Read-only queries for structured tooling. Every result serializes to JSON with `serde`.
//!
//! None of the queries fail: unknown names and unresolvable methods produce empty (or `"unknown"`) results. When the
//! initial indexing is still running, results carry `"indexing": true` and reflect whatever has been indexed so far.

use serde::Serialize;

use crate::model::comment::join_comments;
use crate::model::entry::{Entry, MethodEntry, NamespaceEntry, ParameterKind};
use crate::model::index::Index;
use crate::model::naming;
use crate::query;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceListing {
    pub namespaces: Vec<NamespaceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub indexing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterDetails {
    pub name: String,
    pub kind: ParameterKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodEntryDetails {
    pub uri: String,
    pub visibility: String,
    pub comments: String,
    pub parameters: Vec<ParameterDetails>,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDetails {
    pub receiver: String,
    pub method: String,
    pub entries: Vec<MethodEntryDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDetailsResponse {
    pub methods: Vec<MethodDetails>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub indexing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceDetails {
    pub name: String,
    pub nestings: Vec<String>,
    pub kind: &'static str,
    pub ancestors: Vec<String>,
    pub methods: Vec<String>,
    pub uris: Vec<String>,
    pub documentation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceDetailsResponse {
    pub namespaces: Vec<NamespaceDetails>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub indexing: bool,
}

/// Lists classes and modules, optionally filtered with a fuzzy `query`, capped at `limit`. Without a query they come
/// in declaration order, otherwise ranked like `fuzzy_search`. Singleton classes are never listed
#[must_use]
pub fn list_namespaces(index: &Index, query: Option<&str>, limit: usize, indexing: bool) -> NamespaceListing {
    let names: Vec<String> = match query.filter(|query| !query.is_empty()) {
        Some(query) => query::fuzzy_search(index, query, usize::MAX, usize::MAX)
            .into_iter()
            .filter(|entry| entry.as_namespace().is_some())
            .map(Entry::declaration_name)
            .collect(),
        None => index
            .namespaces()
            .into_iter()
            .map(|declaration| declaration.name())
            .filter(|name| !naming::is_singleton(name))
            .map(ToString::to_string)
            .collect(),
    };

    let total = names.len();
    let namespaces = names
        .into_iter()
        .take(limit)
        .map(|name| NamespaceSummary {
            kind: index.namespace_kind(&name).map_or("unknown", |kind| kind.as_str()),
            name,
        })
        .collect();

    let truncated = (total > limit).then(|| {
        format!("Showing {limit} of {total} classes and modules. Use a more specific query to narrow the results.")
    });

    NamespaceListing {
        namespaces,
        truncated,
        indexing,
    }
}

/// Splits `Owner#method` (instance method) or `Owner.method` (singleton method) into the receiver as written, the
/// method name and the FQN to resolve the method on
fn parse_signature(signature: &str) -> Option<(&str, &str, String)> {
    if let Some((receiver, method)) = signature.rsplit_once('#') {
        let receiver_fqn = receiver.trim_start_matches(naming::SEPARATOR).to_string();
        return Some((receiver, method, receiver_fqn));
    }

    // Method names can't contain `.`, but the receiver can't contain one either, so the first one splits them
    let (receiver, method) = signature.split_once('.')?;
    let receiver_fqn = naming::singleton_name(receiver.trim_start_matches(naming::SEPARATOR));
    Some((receiver, method, receiver_fqn))
}

fn method_entry_details(index: &Index, method: &MethodEntry) -> MethodEntryDetails {
    MethodEntryDetails {
        uri: index
            .documents()
            .get(method.uri_id())
            .map(|document| document.uri().to_string())
            .unwrap_or_default(),
        visibility: method.visibility().to_string(),
        comments: join_comments(method.comments()),
        parameters: method
            .parameters()
            .iter()
            .map(|parameter| ParameterDetails {
                name: parameter.name().to_string(),
                kind: parameter.kind(),
            })
            .collect(),
        owner: method.owner().to_string(),
    }
}

/// Resolves each `Owner#method` or `Owner.method` signature, following ancestors like a call would
#[must_use]
pub fn method_details(index: &Index, signatures: &[String], indexing: bool) -> MethodDetailsResponse {
    let methods = signatures
        .iter()
        .map(|signature| match parse_signature(signature) {
            Some((receiver, method, receiver_fqn)) => MethodDetails {
                receiver: receiver.to_string(),
                method: method.to_string(),
                entries: index
                    .resolve_method(method, &receiver_fqn)
                    .into_iter()
                    .map(|entry| method_entry_details(index, entry))
                    .collect(),
            },
            None => MethodDetails {
                receiver: String::new(),
                method: signature.clone(),
                entries: Vec::new(),
            },
        })
        .collect();

    MethodDetailsResponse { methods, indexing }
}

fn documentation(index: &Index, fqn: &str, entries: &[&NamespaceEntry]) -> String {
    let mut documentation = format!("**{fqn}**\n\nDefinitions:\n");

    for entry in entries {
        let Some(document) = index.documents().get(entry.uri_id()) else {
            continue;
        };

        let location = entry.offset().to_location(document).to_presentation();
        documentation.push_str(&format!("- {}:{}\n", document.uri(), location.start_line()));
    }

    for entry in entries {
        if !entry.comments().is_empty() {
            documentation.push('\n');
            documentation.push_str(&join_comments(entry.comments()));
            documentation.push('\n');
        }
    }

    documentation
}

fn unknown_namespace(name: String) -> NamespaceDetails {
    NamespaceDetails {
        name,
        nestings: Vec::new(),
        kind: "unknown",
        ancestors: Vec::new(),
        methods: Vec::new(),
        uris: Vec::new(),
        documentation: String::new(),
    }
}

/// Describes each namespace named in `names` (fully qualified)
#[must_use]
pub fn namespace_details(index: &Index, names: &[String], indexing: bool) -> NamespaceDetailsResponse {
    let namespaces = names
        .iter()
        .map(|name| {
            let fqn = name.trim_start_matches(naming::SEPARATOR);
            let entries = index.namespace_entries(fqn);

            let Some(kind) = index.namespace_kind(fqn).filter(|_| !entries.is_empty()) else {
                return unknown_namespace(fqn.to_string());
            };

            let singleton = naming::singleton_name(fqn);
            let methods = index
                .method_names(fqn)
                .into_iter()
                .map(ToString::to_string)
                .chain(
                    index
                        .method_names(&singleton)
                        .into_iter()
                        .map(|method| format!("self.{method}")),
                )
                .collect();

            let mut uris: Vec<String> = Vec::new();
            for entry in &entries {
                if let Some(document) = index.documents().get(entry.uri_id())
                    && !uris.iter().any(|uri| uri == document.uri())
                {
                    uris.push(document.uri().to_string());
                }
            }

            NamespaceDetails {
                name: fqn.to_string(),
                nestings: entries.first().map(|entry| entry.nesting().to_vec()).unwrap_or_default(),
                kind: kind.as_str(),
                ancestors: index.linearized_ancestors_of(fqn),
                methods,
                uris,
                documentation: documentation(index, fqn, &entries),
            }
        })
        .collect();

    NamespaceDetailsResponse { namespaces, indexing }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::IndexTest;
    use serde_json::json;

    #[test]
    fn listing_namespaces_in_declaration_order() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", "class Foo; end\nmodule Bar; end");

        let listing = list_namespaces(context.index(), None, 100, false);

        assert_eq!(
            serde_json::to_value(&listing).unwrap(),
            json!({
                "namespaces": [
                    {"name": "Foo", "type": "class"},
                    {"name": "Bar", "type": "module"},
                ]
            })
        );
    }

    #[test]
    fn listing_skips_singletons_and_truncates() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            class A
              class << self; end
            end
            class B; end
            class C; end
            "
        });

        let listing = list_namespaces(context.index(), None, 2, true);
        let names: Vec<&str> = listing.namespaces.iter().map(|ns| ns.name.as_str()).collect();

        assert_eq!(names, ["A", "B"]);
        assert_eq!(
            listing.truncated.as_deref(),
            Some("Showing 2 of 3 classes and modules. Use a more specific query to narrow the results.")
        );

        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["indexing"], json!(true));
    }

    #[test]
    fn listing_with_a_query() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            class FooClass
              def foo_method; end
            end
            module FooModule; end
            class AnotherClass; end
            FOO_CONST = 1
            "
        });

        let listing = list_namespaces(context.index(), Some("Foo"), 100, false);
        let names: Vec<&str> = listing.namespaces.iter().map(|ns| ns.name.as_str()).collect();

        assert_eq!(names, ["FooClass", "FooModule"]);
        assert!(listing.truncated.is_none());
    }

    #[test]
    fn method_details_for_instance_and_singleton_methods() {
        let mut context = IndexTest::new();
        context.index_uri("file:///foo.rb", {
            "
            class Base
              # Saves the record
              def save(validate = true, *rest, key:, &block); end
            end

            class Foo < Base
              private def helper; end
              def self.build(**options); end
            end
            "
        });

        let response = method_details(
            context.index(),
            &[
                "Foo#save".to_string(),
                "Foo#helper".to_string(),
                "Foo.build".to_string(),
                "Foo#missing".to_string(),
            ],
            false,
        );

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "methods": [
                    {
                        "receiver": "Foo",
                        "method": "save",
                        "entries": [{
                            "uri": "file:///foo.rb",
                            "visibility": "public",
                            "comments": "Saves the record",
                            "parameters": [
                                {"name": "validate", "kind": "optional"},
                                {"name": "rest", "kind": "rest"},
                                {"name": "key", "kind": "keyword"},
                                {"name": "block", "kind": "block"},
                            ],
                            "owner": "Base",
                        }],
                    },
                    {
                        "receiver": "Foo",
                        "method": "helper",
                        "entries": [{
                            "uri": "file:///foo.rb",
                            "visibility": "private",
                            "comments": "",
                            "parameters": [],
                            "owner": "Foo",
                        }],
                    },
                    {
                        "receiver": "Foo",
                        "method": "build",
                        "entries": [{
                            "uri": "file:///foo.rb",
                            "visibility": "public",
                            "comments": "",
                            "parameters": [{"name": "options", "kind": "keyword-rest"}],
                            "owner": "Foo::<Class:Foo>",
                        }],
                    },
                    {
                        "receiver": "Foo",
                        "method": "missing",
                        "entries": [],
                    },
                ]
            })
        );
    }

    #[test]
    fn parsing_signatures() {
        assert_eq!(
            parse_signature("Foo::Bar#baz"),
            Some(("Foo::Bar", "baz", "Foo::Bar".to_string()))
        );
        assert_eq!(
            parse_signature("Foo::Bar.baz"),
            Some(("Foo::Bar", "baz", "Foo::Bar::<Class:Bar>".to_string()))
        );
        assert_eq!(parse_signature("::Foo#==").map(|(_, _, fqn)| fqn), Some("Foo".to_string()));
        assert_eq!(parse_signature("baz"), None);
    }

    #[test]
    fn namespace_details_for_known_namespaces() {
        let mut context = IndexTest::new();
        context.index_uri("file:///a.rb", {
            "
            module Outer
              # A widget
              class Widget
                include Comparable

                def size; end
                def self.create; end
              end
            end
            "
        });
        context.index_uri("file:///b.rb", {
            "
            class Outer::Widget
              def color; end
            end
            "
        });

        let response = namespace_details(context.index(), &["Outer::Widget".to_string()], false);
        let details = &response.namespaces[0];

        assert_eq!(details.name, "Outer::Widget");
        assert_eq!(details.kind, "class");
        assert_eq!(details.nestings, ["Outer", "Widget"]);
        assert_eq!(details.ancestors, ["Outer::Widget", "Comparable", "Object"]);
        assert_eq!(details.methods, ["size", "color", "self.create"]);
        assert_eq!(details.uris, ["file:///a.rb", "file:///b.rb"]);
        assert_eq!(
            details.documentation,
            "**Outer::Widget**\n\nDefinitions:\n- file:///a.rb:3\n- file:///b.rb:1\n\nA widget\n"
        );
    }

    #[test]
    fn namespace_details_for_unknown_namespaces() {
        let context = IndexTest::new();
        let response = namespace_details(context.index(), &["Nope".to_string()], false);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "namespaces": [{
                    "name": "Nope",
                    "nestings": [],
                    "kind": "unknown",
                    "ancestors": [],
                    "methods": [],
                    "uris": [],
                    "documentation": "",
                }]
            })
        );
    }
}
