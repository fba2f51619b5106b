use std::fmt;

/// Failure of [`PipelineBuilder::execute`](crate::PipelineBuilder::execute).
///
/// Store errors are passed through untouched; this layer never retries or
/// reinterprets them.
#[derive(Debug)]
pub enum PipelineError<E> {
    Store(E),
    Decode(bson::error::Error),
}

impl<E: fmt::Display> fmt::Display for PipelineError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Store(e) => write!(f, "store error: {e}"),
            PipelineError::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl<E> std::error::Error for PipelineError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Store(e) => Some(e),
            PipelineError::Decode(e) => Some(e),
        }
    }
}

impl<E> From<bson::error::Error> for PipelineError<E> {
    fn from(e: bson::error::Error) -> Self {
        PipelineError::Decode(e)
    }
}
