use crate::model::document::Document;
use crate::{model::ids::UriId, offset::Offset};

#[derive(Debug, Clone)]
pub struct Diagnostic {
    rule: Rule,
    uri_id: UriId,
    offset: Offset,
    message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(rule: Rule, uri_id: UriId, offset: Offset, message: String) -> Self {
        Self {
            rule,
            uri_id,
            offset,
            message,
        }
    }

    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
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
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Formats the diagnostic as `rule: message (1:1-1:5)`
    #[must_use]
    pub fn formatted(&self, document: &Document) -> String {
        format!(
            "{}: {} ({})",
            self.rule(),
            self.message(),
            self.offset().to_display_range(document)
        )
    }
}

fn camel_to_kebab(s: &str) -> String {
    let mut kebab = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i != 0 {
                kebab.push('-');
            }
            kebab.extend(ch.to_lowercase());
        } else {
            kebab.push(ch);
        }
    }
    kebab
}

macro_rules! rules {
    (
        $( $variant:ident );* $(;)?
    ) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        pub enum Rule {
            $(
                $variant,
            )*
        }

        impl std::fmt::Display for Rule {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", match self {
                    $(
                        Rule::$variant => camel_to_kebab(stringify!($variant)),
                    )*
                })
            }
        }
    }
}

rules! {
    // Parsing
    ParseError;
    ParseWarning;

    // Collection
    DynamicSingletonDefinition;
    DynamicAncestor;
    TopLevelMixinSelf;
    DynamicVisibilityTarget;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_display_in_kebab_case() {
        assert_eq!(Rule::ParseError.to_string(), "parse-error");
        assert_eq!(Rule::DynamicSingletonDefinition.to_string(), "dynamic-singleton-definition");
    }

    #[test]
    fn formatting_with_positions() {
        let uri = "file:///foo.rb".to_string();
        let document = Document::new(uri.clone(), "class Foo\n  include bar\nend\n");
        let diagnostic = Diagnostic::new(
            Rule::DynamicAncestor,
            UriId::from(&uri),
            Offset::new(20, 23),
            "Dynamic mixin argument".to_string(),
        );

        assert_eq!(
            diagnostic.formatted(&document),
            "dynamic-ancestor: Dynamic mixin argument (2:11-2:14)"
        );
    }
}
