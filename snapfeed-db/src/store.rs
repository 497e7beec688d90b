use crate::client::Result;
use async_trait::async_trait;
use snapfeed_common::model::{
    Id,
    comment::CreateComment,
    post::{CreatePost, Post, PostMarker},
};

/// Persistence for posts and their embedded comment threads.
///
/// Implementations assign ids and timestamps. A post is only ever written as a
/// whole unit together with its comments, so callers never see a comment
/// without its post.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Stores a new post without comments.
    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    /// All posts, newest `created_at` first. Posts created at the same instant
    /// are ordered newest insertion first.
    async fn fetch_posts(&self) -> Result<Vec<Post>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Appends a comment and returns the updated post, or `None` if no post
    /// with `post_id` exists.
    async fn append_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &CreateComment,
    ) -> Result<Option<Post>>;
}
