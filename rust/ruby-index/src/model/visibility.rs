use core::fmt;
use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// Parses the name of a visibility-changing method. Returns `None` for anything else.
    #[must_use]
    pub fn from_method_name(name: &str) -> Option<Self> {
        match name {
            "public" | "public_class_method" => Some(Self::Public),
            "protected" => Some(Self::Protected),
            "private" | "private_class_method" => Some(Self::Private),
            _ => None,
        }
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Protected => write!(f, "protected"),
            Self::Private => write!(f, "private"),
        }
    }
}
