use std::fmt;

use sift_pipeline::PipelineError;

#[derive(Debug)]
pub enum CollectionHttpError<E> {
    Store(E),
    Decode(bson::error::Error),
    InvalidQuery(String),
    InvalidId(String),
    NotFound(String),
}

impl<E: fmt::Display> fmt::Display for CollectionHttpError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionHttpError::Store(e) => write!(f, "store error: {e}"),
            CollectionHttpError::Decode(e) => write!(f, "decode error: {e}"),
            CollectionHttpError::InvalidQuery(msg) => write!(f, "invalid query string: {msg}"),
            CollectionHttpError::InvalidId(id) => write!(f, "invalid id: {id}"),
            CollectionHttpError::NotFound(what) => write!(f, "{what} not found"),
        }
    }
}

impl<E> std::error::Error for CollectionHttpError<E> where E: std::error::Error + 'static {}

impl<E> CollectionHttpError<E> {
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            CollectionHttpError::Store(_) | CollectionHttpError::Decode(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
            CollectionHttpError::InvalidQuery(_) | CollectionHttpError::InvalidId(_) => {
                http::StatusCode::BAD_REQUEST
            }
            CollectionHttpError::NotFound(_) => http::StatusCode::NOT_FOUND,
        }
    }
}

impl<E> From<PipelineError<E>> for CollectionHttpError<E> {
    fn from(e: PipelineError<E>) -> Self {
        match e {
            PipelineError::Store(e) => CollectionHttpError::Store(e),
            PipelineError::Decode(e) => CollectionHttpError::Decode(e),
        }
    }
}

impl<E> From<sift_query::ParamsError> for CollectionHttpError<E> {
    fn from(e: sift_query::ParamsError) -> Self {
        CollectionHttpError::InvalidQuery(e.0)
    }
}
