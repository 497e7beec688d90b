use crate::{client::Result, store::PostStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use snapfeed_common::{
    model::{
        Id, SnapfeedSnowflakeGenerator,
        comment::{Comment, CreateComment},
        post::{CreatePost, Post, PostMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use time::OffsetDateTime;

/// [`PostStore`] that keeps everything in process memory.
///
/// Each instance is independent. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    // Insertion order.
    posts: Vec<Post>,
    snowflake_generator: SnapfeedSnowflakeGenerator,
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                posts: Vec::new(),
                snowflake_generator: SnapfeedSnowflakeGenerator::new(worker_id, process_id),
            }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().posts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let created_at = OffsetDateTime::now_utc();
        let mut state = self.state.lock();

        let id = state.snowflake_generator.generate_at(created_at).into();
        let post = Post::new(id, post.clone(), created_at);
        state.posts.push(post.clone());

        Ok(post)
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.state.lock().posts.iter().rev().cloned().collect();
        // Stable, so equal timestamps keep newest insertion first.
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(posts)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let state = self.state.lock();
        Ok(state.posts.iter().find(|post| post.id == post_id).cloned())
    }

    async fn append_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &CreateComment,
    ) -> Result<Option<Post>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(post) = state.posts.iter_mut().find(|post| post.id == post_id) else {
            return Ok(None);
        };
        let timestamp = post.next_comment_time(OffsetDateTime::now_utc());
        let id = state.snowflake_generator.generate_at(timestamp).into();

        post.push_comment(Comment {
            id,
            text: comment.text.clone(),
            timestamp,
        });

        Ok(Some(post.clone()))
    }
}
