//! Byte ranges within a file and their line/column presentation.

use serde::Serialize;

use crate::model::document::Document;

/// A byte range within a file. `start` is inclusive and `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Offset {
    start: u32,
    end: u32,
}

impl Offset {
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Sources larger than 4GiB are clamped to the end of the addressable range.
    #[must_use]
    pub fn from_prism_location(location: &ruby_prism::Location) -> Self {
        Self::new(
            u32::try_from(location.start_offset()).unwrap_or(u32::MAX),
            u32::try_from(location.end_offset()).unwrap_or(u32::MAX),
        )
    }

    #[must_use]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Whether `byte` falls within this range. The end is included so that a cursor placed right after a token still
    /// counts as being on it.
    #[must_use]
    pub fn contains(&self, byte: u32) -> bool {
        self.start <= byte && byte <= self.end
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts an offset to a display range like `1:1-1:5`
    #[must_use]
    pub fn to_display_range(&self, document: &Document) -> String {
        let loc = self.to_location(document).to_presentation();
        format!(
            "{}:{}-{}:{}",
            loc.start_line(),
            loc.start_col(),
            loc.end_line(),
            loc.end_col()
        )
    }

    /// Converts this offset to a 0-indexed [`Location`]
    #[must_use]
    pub fn to_location(&self, document: &Document) -> Location {
        let line_index = document.line_index();
        let start = line_index.line_col(self.start().into());
        let end = line_index.line_col(self.end().into());
        Location {
            start_line: start.line,
            start_col: start.col,
            end_line: end.line,
            end_col: end.col,
        }
    }
}

/// Start and end line/column positions within a file. Values are 0-indexed unless produced by
/// [`to_presentation`](Location::to_presentation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    start_line: u32,
    start_col: u32,
    end_line: u32,
    end_col: u32,
}

impl Location {
    #[must_use]
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    #[must_use]
    pub fn start_col(&self) -> u32 {
        self.start_col
    }

    #[must_use]
    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    #[must_use]
    pub fn end_col(&self) -> u32 {
        self.end_col
    }

    /// Returns a 1-indexed copy for display
    #[must_use]
    pub fn to_presentation(&self) -> Self {
        Self {
            start_line: self.start_line + 1,
            start_col: self.start_col + 1,
            end_line: self.end_line + 1,
            end_col: self.end_col + 1,
        }
    }
}
