use crate::model::{Id, text::validated_text};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub const COMMENT_TEXT_MAX_LEN: usize = 500;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

validated_text!(
    CommentText,
    InvalidCommentTextError,
    max_len = COMMENT_TEXT_MAX_LEN,
    missing = "Comment text is required",
    too_long = "Comment cannot exceed 500 characters",
);

/// A comment. Only ever exists inside its post's comment list.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub text: CommentText,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreateComment {
    pub text: CommentText,
}

/// Timestamp for a comment appended to a post last touched at `updated_at`.
///
/// At least a microsecond after `updated_at`, so ordering comments by
/// timestamp matches append order even when the clock steps back.
#[must_use]
pub fn comment_time_after(updated_at: OffsetDateTime, now: OffsetDateTime) -> OffsetDateTime {
    now.max(updated_at + Duration::microseconds(1))
}

#[cfg(test)]
mod tests {
    use crate::model::comment::{COMMENT_TEXT_MAX_LEN, CommentText, InvalidCommentTextError};

    #[test]
    fn comment_text_limits() {
        assert_eq!(CommentText::new("   "), Err(InvalidCommentTextError::Missing));
        assert!(CommentText::new(&"x".repeat(COMMENT_TEXT_MAX_LEN)).is_ok());
        assert_eq!(
            CommentText::new(&"x".repeat(COMMENT_TEXT_MAX_LEN + 1)),
            Err(InvalidCommentTextError::TooLong)
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            InvalidCommentTextError::Missing.to_string(),
            "Comment text is required"
        );
        assert_eq!(
            InvalidCommentTextError::TooLong.to_string(),
            "Comment cannot exceed 500 characters"
        );
    }
}
