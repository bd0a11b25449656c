//! Comment body validation

use super::validation::required;
use super::ValidationError;

const MAX_COMMENT_LEN: usize = 5000;

/// Trimmed, non-empty comment text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentText(String);

impl CommentText {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        required("comment", s, MAX_COMMENT_LEN).map(Self)
    }

    /// Optional comment: blank input becomes `None`.
    pub fn optional(s: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match s.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => Self::new(text).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_bounds() {
        assert_eq!(CommentText::new("  fix this ").unwrap().as_str(), "fix this");
        assert!(CommentText::new("").is_err());
        assert!(CommentText::new(&"x".repeat(5001)).is_err());
    }

    #[test]
    fn optional_blank() {
        assert_eq!(CommentText::optional(Some("   ")).unwrap(), None);
        assert_eq!(CommentText::optional(None).unwrap(), None);
        assert!(CommentText::optional(Some("ok")).unwrap().is_some());
    }
}
