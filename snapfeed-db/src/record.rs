use snapfeed_common::model::{
    ModelValidationError,
    comment::{Comment, CommentText},
    post::{Caption, ImageKey, Post},
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub image: String,
    pub caption: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
}

impl PostRecord {
    pub fn into_post(self, comments: Vec<Comment>) -> Result<Post, ModelValidationError> {
        Ok(Post {
            id: self.post_snowflake.cast_unsigned().into(),
            image: ImageKey::try_from(self.image)?,
            caption: Caption::try_from(self.caption)?,
            comments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_snowflake.cast_unsigned().into(),
            text: CommentText::try_from(value.text)?,
            timestamp: value.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{CommentRecord, PostRecord};
    use snapfeed_common::model::{ModelValidationError, comment::Comment};
    use time::macros::datetime;

    #[test]
    fn negative_snowflakes_map_to_high_ids() {
        let record = CommentRecord {
            comment_snowflake: -1,
            post_snowflake: 1,
            text: "hi".to_owned(),
            created_at: datetime!(2025-06-01 00:00 UTC),
        };
        let comment = Comment::try_from(record).unwrap();
        assert_eq!(u64::from(comment.id), u64::MAX);
    }

    #[test]
    fn invalid_rows_are_reported() {
        let record = PostRecord {
            post_snowflake: 1,
            image: "a.png".to_owned(),
            caption: "  ".to_owned(),
            created_at: datetime!(2025-06-01 00:00 UTC),
            updated_at: datetime!(2025-06-01 00:00 UTC),
        };
        assert!(matches!(
            record.into_post(Vec::new()),
            Err(ModelValidationError::Caption(_))
        ));
    }
}
