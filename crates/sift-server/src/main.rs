use std::sync::Arc;

use sift_http::CollectionHttp;
use sift_pipeline::Collection;
use sift_pipeline::memory::MemoryDatabase;
use sift_server::config::{Config, ConfigError, Store};
use sift_server::mongo::{self, MongoError};
use sift_server::seed::{self, SeedError};
use sift_server::server::{self, SHUTDOWN_GRACE};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("seed error: {0}")]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Mongo(#[from] MongoError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("SIFT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let name = config.collection.name.clone();

    match config.store.clone() {
        Store::Memory { seed } => {
            let db = MemoryDatabase::new();
            if let Some(path) = &seed {
                let inserted = seed::load_file(&db, &name, path)?;
                info!(path = %path.display(), inserted, "seeded database");
            }
            let collection = db.collection(name.as_str());
            info!(collection = %name, documents = collection.count(), "serving in-memory collection");
            listen(config, collection).await
        }
        Store::Mongo { uri, database } => {
            let collection = mongo::connect(&uri, database.as_deref(), &name).await?;
            info!(collection = %name, "serving mongodb collection");
            listen(config, collection).await
        }
    }
}

async fn listen<C>(config: Config, collection: C) -> Result<(), StartupError>
where
    C: Collection + 'static,
{
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.addr,
            source,
        })?;
    info!(addr = %config.addr, "listening");

    let handler = Arc::new(CollectionHttp::new(config.collection, collection));
    server::serve(listener, handler, server::shutdown_signal(), SHUTDOWN_GRACE).await;
    Ok(())
}
