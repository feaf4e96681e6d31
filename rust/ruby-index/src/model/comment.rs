use crate::offset::Offset;

/// A single comment line attached to an entry, with its `#` marker still in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    offset: Offset,
    text: String,
}

impl Comment {
    #[must_use]
    pub fn new(offset: Offset, text: String) -> Self {
        Self { offset, text }
    }

    #[must_use]
    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The comment text without the leading `#` and the single space that usually follows it
    #[must_use]
    pub fn content(&self) -> &str {
        let stripped = self.text.strip_prefix('#').unwrap_or(&self.text);
        stripped.strip_prefix(' ').unwrap_or(stripped)
    }
}

/// Joins the contents of a comment block into a single string, one line per comment
#[must_use]
pub fn join_comments(comments: &[Comment]) -> String {
    comments.iter().map(Comment::content).collect::<Vec<_>>().join("\n")
}
