use crate::model::{
    Id,
    comment::{Comment, comment_time_after},
    text::validated_text,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const CAPTION_MAX_LEN: usize = 2000;
pub const IMAGE_KEY_MAX_LEN: usize = 255;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

validated_text!(
    /// Key of a stored image, usually its file name in the upload store.
    ImageKey,
    InvalidImageKeyError,
    max_len = IMAGE_KEY_MAX_LEN,
    missing = "Image filename is required",
    too_long = "Image filename is too long",
);

validated_text!(
    Caption,
    InvalidCaptionError,
    max_len = CAPTION_MAX_LEN,
    missing = "Caption is required",
    too_long = "Caption cannot exceed 2000 characters",
);

/// A post together with its whole comment thread.
///
/// `comments` is append-only and kept in insertion order.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub image: ImageKey,
    pub caption: Caption,
    pub comments: Vec<Comment>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreatePost {
    pub image: ImageKey,
    pub caption: Caption,
}

impl Post {
    #[must_use]
    pub fn new(id: Id<PostMarker>, post: CreatePost, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            image: post.image,
            caption: post.caption,
            comments: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Timestamp for the next comment on this post, given the current time.
    #[must_use]
    pub fn next_comment_time(&self, now: OffsetDateTime) -> OffsetDateTime {
        comment_time_after(self.updated_at, now)
    }

    /// Appends `comment`. `updated_at` never moves backwards.
    pub fn push_comment(&mut self, comment: Comment) {
        self.updated_at = self.updated_at.max(comment.timestamp);
        self.comments.push(comment);
    }
}
