use crate::server::{ServerState, base_url::PublicUrl, router, uploads::ImageStore};
use axum::{
    Router,
    body::{Body, Bytes},
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, HOST},
    },
};
use http_body_util::BodyExt;
use serde_json::Value;
use snapfeed_db::{memory::MemoryStore, store::PostStore};
use std::{path::PathBuf, sync::Arc};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "snapfeed-test-boundary";
pub const TEST_HOST: &str = "localhost:5000";

pub enum Part<'a> {
    Text {
        name: &'a str,
        value: &'a str,
    },
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Bytes that start like a PNG file.
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.resize(len, 0xAB);
    data
}

pub struct TestServer {
    pub router: Router,
    pub memory: Option<Arc<MemoryStore>>,
    pub upload_dir: PathBuf,
    _upload_root: TempDir,
}

impl TestServer {
    pub async fn new() -> Self {
        let memory = Arc::new(MemoryStore::default());
        let mut server = Self::with_store(memory.clone()).await;
        server.memory = Some(memory);
        server
    }

    pub async fn with_store(store: Arc<dyn PostStore>) -> Self {
        let upload_root = tempfile::tempdir().unwrap();
        let upload_dir = upload_root.path().join("uploads");
        let images = Arc::new(ImageStore::open(&upload_dir).await.unwrap());

        let state = ServerState {
            store,
            images,
            public_url: PublicUrl::default(),
        };

        Self {
            router: router(state),
            memory: None,
            upload_dir,
            _upload_root: upload_root,
        }
    }

    pub fn stored_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.upload_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    pub async fn get_raw(&self, uri: &str) -> (StatusCode, Bytes) {
        let request = Request::get(uri)
            .header(HOST, TEST_HOST)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri)
            .header(HOST, TEST_HOST)
            .body(Body::empty())
            .unwrap();
        self.send_json(request).await
    }

    pub async fn post_multipart(&self, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let request = Request::post("/api/posts")
            .header(HOST, TEST_HOST)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send_json(request).await
    }

    pub async fn create_post(&self, caption: &str) -> Value {
        let image = png_bytes(10 * 1024);
        let (status, body) = self
            .post_multipart(&[
                Part::File {
                    name: "image",
                    file_name: "photo.png",
                    content_type: "image/png",
                    data: &image,
                },
                Part::Text {
                    name: "caption",
                    value: caption,
                },
            ])
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["post"].clone()
    }

    pub async fn post_comment(&self, post_id: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::post(format!("/api/posts/{post_id}/comments"))
            .header(HOST, TEST_HOST)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send_json(request).await
    }
}
