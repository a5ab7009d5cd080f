//! Mashup submission endpoint

use super::requests_logging::log_requests;
use super::workspace::RequestWorkspace;
use crate::analysis::Analyzer;
use crate::config::ServerSettings;
use crate::discovery;
use crate::error::{MuprepError, Result};
use crate::export;
use crate::mashup::NamingScheme;
use crate::pipeline::MashupPipeline;
use crate::types::OutputMode;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MashupPipeline>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// An uploaded file held in memory until it reaches the workspace
struct Upload {
    file_name: String,
    content: axum::body::Bytes,
}

pub fn make_app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/generate-midi-mashups/", post(generate_midi_mashups))
        .route("/generate-midi-mashups", post(generate_midi_mashups))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

pub async fn run_server(settings: ServerSettings, analyzer: Arc<dyn Analyzer>) -> Result<()> {
    settings.validate().map_err(MuprepError::ConfigError)?;

    let pipeline = MashupPipeline::new(analyzer, settings.policy, NamingScheme::new(&settings.extension));
    let app = make_app(
        AppState {
            pipeline: Arc::new(pipeline),
        },
        settings.max_upload_bytes,
    );

    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn generate_midi_mashups(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut uploads: Vec<Upload> = Vec::new();
    let mut output_mode = OutputMode::Archive;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read multipart body: {}", e);
                return e.into_response();
            }
        };

        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "files" => {
                // Parts without a file name are plain form values, not uploads
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    debug!("Ignoring 'files' part without a file name");
                    continue;
                };
                match field.bytes().await {
                    Ok(content) => uploads.push(Upload { file_name, content }),
                    Err(e) => {
                        warn!("Failed to read upload {}: {}", file_name, e);
                        return e.into_response();
                    }
                }
            }
            "output_format" => {
                if let Ok(value) = field.text().await {
                    output_mode = OutputMode::from_request_field(&value);
                }
            }
            _ => {}
        }
    }

    if uploads.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No files uploaded");
    }

    info!("Received {} files ({:?} output)", uploads.len(), output_mode);

    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || process_uploads(&pipeline, uploads, output_mode)).await;

    match result {
        Ok(Ok(bytes)) => package_response(bytes, output_mode),
        Ok(Err(e)) => batch_error_response(e),
        Err(e) => {
            error!("Processing task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Spool uploads, run the batch, and package it; runs on a blocking thread
fn process_uploads(pipeline: &MashupPipeline, uploads: Vec<Upload>, mode: OutputMode) -> Result<Vec<u8>> {
    let submitted = uploads.len();
    let mut workspace = RequestWorkspace::new()?;
    for upload in &uploads {
        workspace.store(&upload.file_name, &upload.content)?;
    }
    drop(uploads);

    let inputs = discovery::read_inputs(&workspace.midi_files()?);
    if inputs.is_empty() {
        return Err(MuprepError::NoAnalyzableTracks { submitted });
    }

    let batch = pipeline.run(inputs)?;
    export::package(&batch.artifacts, &batch.summary, mode)
}

fn package_response(bytes: Vec<u8>, mode: OutputMode) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", export::package_file_name(mode));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, export::package_content_type(mode).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

fn batch_error_response(e: MuprepError) -> Response {
    match e {
        MuprepError::NoSubmittedTracks => error_response(StatusCode::BAD_REQUEST, "No files uploaded"),
        MuprepError::NoAnalyzableTracks { submitted } => {
            info!("None of {} uploaded files could be analyzed", submitted);
            error_response(StatusCode::BAD_REQUEST, "No valid MIDI files found")
        }
        other => {
            error!("Processing failed: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_errors_map_to_client_errors() {
        let resp = batch_error_response(MuprepError::NoAnalyzableTracks { submitted: 2 });
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = batch_error_response(MuprepError::NoSubmittedTracks);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unexpected_errors_are_opaque() {
        let resp = batch_error_response(MuprepError::ArchiveError {
            reason: "disk on fire".to_string(),
        });
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_package_headers() {
        let resp = package_response(b"a,b\r\n".to_vec(), OutputMode::Tabular);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"mashups.csv\""
        );
    }
}
