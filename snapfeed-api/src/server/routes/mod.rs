use crate::server::ServerRouter;
use axum::Router;

mod index;
mod posts;

pub fn routes() -> ServerRouter {
    Router::new().merge(index::routes()).merge(posts::routes())
}
