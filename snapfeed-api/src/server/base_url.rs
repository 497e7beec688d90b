use crate::server::uploads::UPLOADS_PATH;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use headers::{HeaderMapExt, Host};
use serde::Serialize;
use snapfeed_common::model::post::{ImageKey, Post};
use std::{convert::Infallible, sync::Arc};
use time::OffsetDateTime;

/// Externally configured base URL, overriding the request's `Host`.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PublicUrl(Option<Arc<str>>);

impl PublicUrl {
    #[must_use]
    pub fn new(url: Option<&str>) -> Self {
        Self(url.map(|url| url.trim_end_matches('/').into()))
    }
}

/// Scheme and authority that clients used to reach this server.
///
/// Resolved per request and never stored alongside a post. Empty when the
/// request names no host, which makes image URLs relative.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct BaseUrl(String);

/// A post as sent to clients, with the absolute URL of its image.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub image_url: String,
    /// Same instant as `createdAt`.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl BaseUrl {
    #[must_use]
    pub fn image_url(&self, image: &ImageKey) -> String {
        format!("{}{UPLOADS_PATH}/{image}", self.0)
    }

    #[must_use]
    pub fn view(&self, post: Post) -> PostView {
        PostView {
            image_url: self.image_url(&post.image),
            timestamp: post.created_at,
            post,
        }
    }
}

impl<S> FromRequestParts<S> for BaseUrl
where
    PublicUrl: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let PublicUrl(Some(url)) = PublicUrl::from_ref(state) {
            return Ok(Self(url.to_string()));
        }

        if let Some(host) = parts.headers.typed_get::<Host>() {
            let base = match host.port() {
                Some(port) => format!("http://{}:{port}", host.hostname()),
                None => format!("http://{}", host.hostname()),
            };
            return Ok(Self(base));
        }

        // HTTP/2 requests carry the authority in the URI instead.
        let base = parts
            .uri
            .authority()
            .map(|authority| format!("http://{authority}"))
            .unwrap_or_default();
        Ok(Self(base))
    }
}
