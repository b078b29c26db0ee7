//! Canonical post aggregate.
//!
//! A post is immutable once created: the author, body, and timestamp never
//! change after the canonical write succeeds. Denormalised copies in author
//! feeds and follower timelines are derived from this record and share its
//! identifier and timestamp.

use chrono::{DateTime, Utc};
use pagination::TimeCursored;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of a post body, in characters.
pub const MAX_CONTENT_LEN: usize = 280;

/// Validation failures raised when constructing a [`Post`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostValidationError {
    /// The author identifier was absent or nil.
    #[error("author id is required")]
    MissingAuthor,
    /// The body was empty after trimming whitespace.
    #[error("post content must not be empty")]
    EmptyContent,
    /// The body exceeded [`MAX_CONTENT_LEN`] characters.
    #[error("post content must not exceed {MAX_CONTENT_LEN} characters")]
    ContentTooLong,
}

/// A published post: the authoritative record behind every timeline copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Unique post identifier.
    pub id: Uuid,
    /// Author of the post.
    pub author_id: Uuid,
    /// Post body, at most [`MAX_CONTENT_LEN`] characters.
    pub content: String,
    /// Publication instant; shared by every denormalised copy.
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Validate and construct a post.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::Post;
    /// use chrono::Utc;
    /// use uuid::Uuid;
    ///
    /// let post = Post::new(Uuid::new_v4(), "hello", Utc::now()).expect("valid post");
    /// assert_eq!(post.content, "hello");
    /// ```
    pub fn new(
        author_id: Uuid,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, PostValidationError> {
        let content = content.into();
        validate_content(author_id, &content)?;
        Ok(Self {
            id: Uuid::new_v4(),
            author_id,
            content,
            created_at,
        })
    }
}

impl TimeCursored for Post {
    fn cursor_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Shared validation for post creation requests.
pub fn validate_content(author_id: Uuid, content: &str) -> Result<(), PostValidationError> {
    if author_id.is_nil() {
        return Err(PostValidationError::MissingAuthor);
    }
    if content.trim().is_empty() {
        return Err(PostValidationError::EmptyContent);
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(PostValidationError::ContentTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn accepts_content_at_the_bound() {
        let content = "x".repeat(MAX_CONTENT_LEN);
        let post = Post::new(Uuid::new_v4(), content.clone(), Utc::now()).expect("valid post");
        assert_eq!(post.content, content);
    }

    #[rstest]
    fn rejects_over_length_content() {
        let content = "x".repeat(MAX_CONTENT_LEN + 1);
        let err = Post::new(Uuid::new_v4(), content, Utc::now()).expect_err("rejected");
        assert_eq!(err, PostValidationError::ContentTooLong);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn rejects_blank_content(#[case] content: &str) {
        let err = Post::new(Uuid::new_v4(), content, Utc::now()).expect_err("rejected");
        assert_eq!(err, PostValidationError::EmptyContent);
    }

    #[rstest]
    fn rejects_nil_author() {
        let err = Post::new(Uuid::nil(), "hello", Utc::now()).expect_err("rejected");
        assert_eq!(err, PostValidationError::MissingAuthor);
    }

    #[rstest]
    fn generated_ids_are_unique() {
        let now = Utc::now();
        let author = Uuid::new_v4();
        let a = Post::new(author, "hello", now).expect("valid post");
        let b = Post::new(author, "hello", now).expect("valid post");
        assert_ne!(a.id, b.id);
    }
}
