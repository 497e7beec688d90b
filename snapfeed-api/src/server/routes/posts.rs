use crate::server::{
    Result, ServerError, ServerRouter,
    base_url::{BaseUrl, PostView},
    json::{Created, Json},
    uploads::{ImageStore, StoredImage, UploadError},
};
use axum::{
    Router,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use snapfeed_common::model::{
    Id, ModelValidationError,
    comment::{CommentText, CreateComment},
    post::{Caption, CreatePost, Post, PostMarker},
};
use snapfeed_db::store::PostStore;
use std::sync::Arc;
use tracing::info;

const IMAGE_FIELD: &str = "image";
const CAPTION_FIELD: &str = "caption";

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_post(add_comment)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct PostResponse {
    message: &'static str,
    post: PostView,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct PostListResponse {
    message: &'static str,
    posts: Vec<PostView>,
    total: usize,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn PostStore>>,
    base_url: BaseUrl,
) -> Result<Json<PostListResponse>> {
    let posts: Vec<PostView> = store
        .fetch_posts()
        .await?
        .into_iter()
        .map(|post| base_url.view(post))
        .collect();

    Ok(Json(PostListResponse {
        message: "Posts retrieved successfully",
        total: posts.len(),
        posts,
    }))
}

#[derive(Debug, Default)]
struct PostForm {
    image: Option<StoredImage>,
    caption: Option<String>,
}

async fn read_post_form(
    images: &ImageStore,
    multipart: &mut Multipart,
    form: &mut PostForm,
) -> Result<(), UploadError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(IMAGE_FIELD) => {
                if form.image.is_some() {
                    return Err(UploadError::MultipleImages);
                }
                form.image = images.store(field).await?;
            }
            Some(CAPTION_FIELD) => form.caption = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(())
}

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn PostStore>>,
    State(images): State<Arc<ImageStore>>,
    base_url: BaseUrl,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Created<PostResponse>> {
    let mut multipart = multipart?;

    let mut form = PostForm::default();
    if let Err(err) = read_post_form(&images, &mut multipart, &mut form).await {
        if let Some(image) = form.image {
            images.discard(image).await;
        }
        return Err(err.into());
    }

    let image = form.image.ok_or(UploadError::MissingImage)?;
    let caption = form.caption.unwrap_or_default();

    let created = async {
        let caption = Caption::new(&caption).map_err(ModelValidationError::from)?;
        let post = CreatePost {
            image: image.key().clone(),
            caption,
        };
        Ok::<Post, ServerError>(store.create_post(&post).await?)
    }
    .await;

    let post = match created {
        Ok(post) => post,
        Err(err) => {
            images.discard(image).await;
            return Err(err);
        }
    };

    info!(post_id = %post.id, image = %post.image, "Created post");

    Ok(Created(PostResponse {
        message: "Post created successfully",
        post: base_url.view(post),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct AddCommentBody {
    #[serde(default)]
    comment: Option<String>,
}

async fn add_comment(
    CommentsPath { id }: CommentsPath,
    State(store): State<Arc<dyn PostStore>>,
    base_url: BaseUrl,
    Json(body): Json<AddCommentBody>,
) -> Result<Created<PostResponse>> {
    let post_id: Id<PostMarker> = id.parse().map_err(ServerError::InvalidPostId)?;
    let text = CommentText::new(body.comment.as_deref().unwrap_or_default())
        .map_err(ModelValidationError::from)?;

    let post = store
        .append_comment(post_id, &CreateComment { text })
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    info!(%post_id, comments = post.comments.len(), "Added comment");

    Ok(Created(PostResponse {
        message: "Comment added successfully",
        post: base_url.view(post),
    }))
}
