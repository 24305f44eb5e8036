use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::archive::ArchiveError;
use crate::features::FeatureState;

use super::commands::{ingest, IngestPricesCommand, IngestPricesError};
use super::queries::{
    aggregates::{self, GetAggregatesError, GetAggregatesQuery},
    export::{self, ExportPricesError, ExportPricesQuery},
};

/// Multipart form field carrying the uploaded archive.
const UPLOAD_FIELD: &str = "file";

pub fn prices_routes() -> Router<FeatureState> {
    // The method router answers 405 for anything besides POST/GET on /prices
    Router::new()
        .route("/prices", post(upload_prices).get(download_prices))
        .route("/prices/stats", get(price_stats))
}

#[tracing::instrument(skip(state, multipart))]
async fn upload_prices(
    State(state): State<FeatureState>,
    mut multipart: Multipart,
) -> Result<Response, PricesApiError> {
    let mut archive: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PricesApiError::Multipart(e.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == UPLOAD_FIELD {
            let data = field
                .bytes()
                .await
                .map_err(|e| PricesApiError::Multipart(e.to_string()))?;
            archive = Some(data.to_vec());
        }
    }

    let archive = archive.ok_or(PricesApiError::MissingFile)?;

    let command = IngestPricesCommand {
        archive,
        strict: state.ingest.strict,
    };

    let summary = ingest::handle(state.db.clone(), command).await?;

    tracing::info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        total_items = summary.totals.total_items,
        "Prices uploaded via API"
    );

    // Wire contract: the upload response body is the bare totals object.
    Ok((StatusCode::OK, Json(summary.totals)).into_response())
}

#[tracing::instrument(skip(state))]
async fn download_prices(State(state): State<FeatureState>) -> Result<Response, PricesApiError> {
    let archive = export::handle(state.db.clone(), ExportPricesQuery).await?;

    tracing::debug!(
        filename = archive.filename,
        bytes = archive.bytes.len(),
        "Prices exported via API"
    );

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", archive.filename),
        ),
    ];

    Ok((StatusCode::OK, headers, archive.bytes).into_response())
}

#[tracing::instrument(skip(state))]
async fn price_stats(State(state): State<FeatureState>) -> Result<Response, PricesApiError> {
    let totals = aggregates::handle(state.db.clone(), GetAggregatesQuery).await?;
    Ok(ApiResponse::success(totals).into_response())
}

#[derive(Debug)]
enum PricesApiError {
    Multipart(String),
    MissingFile,
    Ingest(IngestPricesError),
    Export(ExportPricesError),
    Stats(GetAggregatesError),
}

impl From<IngestPricesError> for PricesApiError {
    fn from(err: IngestPricesError) -> Self {
        Self::Ingest(err)
    }
}

impl From<ExportPricesError> for PricesApiError {
    fn from(err: ExportPricesError) -> Self {
        Self::Export(err)
    }
}

impl From<GetAggregatesError> for PricesApiError {
    fn from(err: GetAggregatesError) -> Self {
        Self::Stats(err)
    }
}

impl IntoResponse for PricesApiError {
    fn into_response(self) -> Response {
        match self {
            PricesApiError::Multipart(_) | PricesApiError::MissingFile => {
                let error = ErrorResponse::new("UPLOAD_ERROR", self.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },

            // Malformed uploads are the client's problem
            PricesApiError::Ingest(IngestPricesError::EmptyUpload)
            | PricesApiError::Ingest(IngestPricesError::NoCsvEntries)
            | PricesApiError::Ingest(IngestPricesError::Archive(ArchiveError::Unreadable(_)))
            | PricesApiError::Ingest(IngestPricesError::Archive(
                ArchiveError::EntryUnreadable { .. },
            )) => {
                let error = ErrorResponse::new("UPLOAD_ERROR", self.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            PricesApiError::Ingest(IngestPricesError::RowRejected { .. }) => {
                let error = ErrorResponse::new("VALIDATION_ERROR", self.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            PricesApiError::Ingest(_) => {
                tracing::error!("Storage error during price upload: {}", self);
                let error = ErrorResponse::new("STORAGE_ERROR", "A storage error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },

            PricesApiError::Export(_) => {
                tracing::error!("Export error: {}", self);
                let error = ErrorResponse::new("EXPORT_ERROR", "Failed to export price records");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },

            PricesApiError::Stats(_) => {
                tracing::error!("Aggregate query error: {}", self);
                let error = ErrorResponse::new("STORAGE_ERROR", "A storage error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
        }
    }
}

impl std::fmt::Display for PricesApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Multipart(message) => write!(f, "Failed to read multipart upload: {}", message),
            Self::MissingFile => write!(f, "No '{}' field found in multipart data", UPLOAD_FIELD),
            Self::Ingest(e) => write!(f, "{}", e),
            Self::Export(e) => write!(f, "{}", e),
            Self::Stats(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_400() {
        let response = PricesApiError::MissingFile.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_aggregate_failure_maps_to_500() {
        let err = PricesApiError::Ingest(IngestPricesError::Aggregate(sqlx::Error::PoolClosed));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unreadable_archive_maps_to_400() {
        let err = PricesApiError::Ingest(IngestPricesError::Archive(ArchiveError::Unreadable(
            zip::result::ZipError::InvalidArchive("bad magic".into()),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
