use serde::Deserialize;
use server::{ServerState, base_url::PublicUrl, uploads::ImageStore};
use snapfeed_common::snowflake::{ProcessId, SnowflakePartOutOfRangeError, WorkerId};
use snapfeed_db::{
    client::{DbClient, DbError},
    memory::MemoryStore,
    store::PostStore,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid snowflake worker or process id: {0}")]
    SnowflakePart(#[from] SnowflakePartOutOfRangeError),
    #[error("DATABASE_URL must be set when using the postgres storage backend")]
    MissingDatabaseUrl,
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error creating the upload directory: {0}")]
    UploadDir(std::io::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StorageBackend {
    #[default]
    Postgres,
    /// Keeps posts in process memory. Everything is lost on restart.
    Memory,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    #[serde(default = "default_server_address")]
    server_address: IpAddr,
    #[serde(default = "default_server_port")]
    server_port: u16,
    database_url: Option<String>,
    #[serde(default)]
    storage_backend: StorageBackend,
    #[serde(default = "default_upload_dir")]
    upload_dir: PathBuf,
    public_url: Option<String>,
    #[serde(default)]
    snowflake_worker_id: u8,
    #[serde(default)]
    snowflake_process_id: u8,
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_server_port() -> u16 {
    5000
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "snapfeed_api=debug,\
                snapfeed_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn open_store(env: &Env) -> Result<Arc<dyn PostStore>, InitError> {
    let worker_id = WorkerId::try_from(env.snowflake_worker_id)?;
    let process_id = ProcessId::try_from(env.snowflake_process_id)?;

    match env.storage_backend {
        StorageBackend::Postgres => {
            let database_url = env
                .database_url
                .as_deref()
                .ok_or(InitError::MissingDatabaseUrl)?;

            let client = DbClient::connect(database_url, worker_id, process_id).await?;
            client.migrate().await?;
            info!("Connected to PostgreSQL and applied migrations");

            Ok(Arc::new(client))
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store, posts will be lost on restart");
            Ok(Arc::new(MemoryStore::new(worker_id, process_id)))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => error!(error = %err, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let images = ImageStore::open(&env.upload_dir)
        .await
        .map_err(InitError::UploadDir)?;
    info!(upload_dir = %images.dir().display(), "Serving uploads");

    let store = open_store(&env).await?;

    let state = ServerState {
        store,
        images: Arc::new(images),
        public_url: PublicUrl::new(env.public_url.as_deref()),
    };
    let app = server::router(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
