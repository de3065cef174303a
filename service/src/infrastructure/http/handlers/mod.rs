use axum::http::StatusCode;
use serde::Serialize;

pub mod articles;
pub mod assignments;
pub mod drafts;
pub mod schedule;

// health check handler
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Envelope for list responses.
#[derive(Debug, Clone, Serialize)]
pub struct ManyResponse<T: Serialize> {
    data: Vec<T>,
    meta: MetadataResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataResponse {
    total: usize,
}

impl<T: Serialize> ManyResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        let total = data.len();
        Self {
            data,
            meta: MetadataResponse { total },
        }
    }
}

impl<T: Serialize, U: Into<T>> FromIterator<U> for ManyResponse<T> {
    fn from_iter<I: IntoIterator<Item = U>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}
