use crate::{
    record::{CommentRecord, PostRecord},
    store::PostStore,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use snapfeed_common::model::{
    Id, ModelValidationError, SnapfeedSnowflakeGenerator,
    comment::{Comment, CreateComment, comment_time_after},
    post::{CreatePost, Post, PostMarker},
};
use snapfeed_common::snowflake::{ProcessId, WorkerId};
use sqlx::{
    PgConnection, PgPool, migrate::MigrateError, postgres::PgPoolOptions, query, query_as,
    query_scalar,
};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use time::OffsetDateTime;

pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running database migrations failed: {0}")]
    Migrate(#[from] MigrateError),
}

/// [`PostStore`] backed by PostgreSQL.
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<SnapfeedSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator = Mutex::new(SnapfeedSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    /// Connects to `database_url`, failing if the server cannot be reached
    /// within [`ACQUIRE_TIMEOUT`].
    pub async fn connect(
        database_url: &str,
        worker_id: WorkerId,
        process_id: ProcessId,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool, worker_id, process_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_comments(
        conn: &mut PgConnection,
        post_snowflakes: &[i64],
    ) -> Result<HashMap<i64, Vec<Comment>>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.text,
                comments.created_at
            FROM
                posts.comments
            WHERE
                comments.post_snowflake = ANY($1)
            ORDER BY
                comments.created_at, comments.comment_snowflake
            ",
        )
        .bind(post_snowflakes)
        .fetch_all(&mut *conn)
        .await?;

        let mut comments: HashMap<i64, Vec<Comment>> = HashMap::new();
        for record in records {
            comments
                .entry(record.post_snowflake)
                .or_default()
                .push(Comment::try_from(record)?);
        }

        Ok(comments)
    }

    async fn load_post(conn: &mut PgConnection, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let post_snowflake = post_id.snowflake().get().cast_signed();

        let record = query_as::<_, PostRecord>(
            "
            SELECT
                posts.post_snowflake,
                posts.image,
                posts.caption,
                posts.created_at,
                posts.updated_at
            FROM
                posts.posts
            WHERE
                posts.post_snowflake = $1
            ",
        )
        .bind(post_snowflake)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let comments = Self::fetch_comments(conn, &[post_snowflake])
            .await?
            .remove(&post_snowflake)
            .unwrap_or_default();

        Ok(Some(record.into_post(comments)?))
    }
}

#[async_trait]
impl PostStore for DbClient {
    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let created_at = OffsetDateTime::now_utc();
        let post_snowflake = self.snowflake_generator.lock().generate_at(created_at);

        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts.posts (post_snowflake, image, caption, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING post_snowflake, image, caption, created_at, updated_at
            ",
        )
        .bind(post_snowflake.get().cast_signed())
        .bind(post.image.get())
        .bind(post.caption.get())
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into_post(Vec::new())?)
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let mut conn = self.pool.acquire().await?;

        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.post_snowflake,
                posts.image,
                posts.caption,
                posts.created_at,
                posts.updated_at
            FROM
                posts.posts
            ORDER BY
                posts.created_at DESC, posts.post_snowflake DESC
            ",
        )
        .fetch_all(&mut *conn)
        .await?;

        let post_snowflakes: Vec<i64> = records.iter().map(|record| record.post_snowflake).collect();
        let mut comments = Self::fetch_comments(&mut *conn, &post_snowflakes).await?;

        let posts = records
            .into_iter()
            .map(|record| {
                let post_comments = comments.remove(&record.post_snowflake).unwrap_or_default();
                record.into_post(post_comments)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_post(&mut *conn, post_id).await
    }

    async fn append_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &CreateComment,
    ) -> Result<Option<Post>> {
        let post_snowflake = post_id.snowflake().get().cast_signed();

        let mut tx = self.pool.begin().await?;

        // Held until commit, so appends to one post run one at a time.
        let updated_at: Option<OffsetDateTime> = query_scalar(
            "
            SELECT updated_at
            FROM posts.posts
            WHERE post_snowflake = $1
            FOR UPDATE
            ",
        )
        .bind(post_snowflake)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated_at) = updated_at else {
            return Ok(None);
        };

        let created_at = comment_time_after(updated_at, OffsetDateTime::now_utc());
        let comment_snowflake = self.snowflake_generator.lock().generate_at(created_at);

        query(
            "
            UPDATE posts.posts
            SET updated_at = $2
            WHERE post_snowflake = $1
            ",
        )
        .bind(post_snowflake)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        query(
            "
            INSERT INTO posts.comments (comment_snowflake, post_snowflake, text, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(comment_snowflake.get().cast_signed())
        .bind(post_snowflake)
        .bind(comment.text.get())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let post = Self::load_post(&mut *tx, post_id).await?;
        tx.commit().await?;

        Ok(post)
    }
}
