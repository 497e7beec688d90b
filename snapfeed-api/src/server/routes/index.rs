use crate::server::{ServerError, ServerRouter, json::Json};
use axum::Router;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    Router::new().typed_get(describe_service)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct IndexPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDescriptor {
    message: &'static str,
    version: &'static str,
    endpoints: Endpoints,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct Endpoints {
    create_post: &'static str,
    get_posts: &'static str,
    add_comment: &'static str,
}

async fn describe_service(IndexPath(): IndexPath) -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        message: "Snapfeed API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            create_post: "POST /api/posts",
            get_posts: "GET /api/posts",
            add_comment: "POST /api/posts/{id}/comments",
        },
    })
}
