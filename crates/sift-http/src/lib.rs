mod config;
mod error;
mod http;
mod response;

pub use config::{CollectionConfig, Relation};
pub use error::CollectionHttpError;
pub use http::CollectionHttp;
pub use response::{ApiResponse, Meta, to_json};
