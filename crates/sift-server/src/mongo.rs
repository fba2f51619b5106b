use bson::{Document, doc};
use mongodb::Client;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum MongoError {
    #[error("mongodb: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("no database in SIFT_MONGODB_URI and SIFT_MONGODB_DATABASE is unset")]
    NoDatabase,
}

/// Connect to `uri` and return a handle to `collection`.
///
/// The server is pinged once so a bad URI or an unreachable deployment
/// fails at startup instead of on the first request.
pub async fn connect(
    uri: &str,
    database: Option<&str>,
    collection: &str,
) -> Result<mongodb::Collection<Document>, MongoError> {
    let client = Client::with_uri_str(uri).await?;
    let db = match database {
        Some(name) => client.database(name),
        None => client.default_database().ok_or(MongoError::NoDatabase)?,
    };
    db.run_command(doc! { "ping": 1 }).await?;
    info!(database = %db.name(), collection, "connected to mongodb");
    Ok(db.collection::<Document>(collection))
}
