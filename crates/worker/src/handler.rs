//! Job orchestration: validate, normalize input, compose, run, select.

use wanvid_comfyui::collector::Outputs;
use wanvid_comfyui::executor;
use wanvid_core::job::{self, ImageSource, JobRequest, JobResponse};
use wanvid_core::workflow;

use crate::error::AppResult;
use crate::input;
use crate::state::AppState;

/// Process one job start-to-finish.
///
/// Validation and input failures are recovered into structured
/// [`JobResponse::Error`] values; template and engine failures
/// propagate as [`crate::error::AppError`] and surface to the hosting
/// runtime as a failed job.
pub async fn handle(state: &AppState, request: JobRequest) -> AppResult<JobResponse> {
    let task_id = job::new_task_id();
    tracing::info!(task_id, "Received job");

    // Validate the image-source invariant before any side effects.
    let source = match request.image_source() {
        Ok(source) => source,
        Err(e) => return Ok(JobResponse::error(e.to_string())),
    };

    let image_filename = match normalize_input(state, source, &task_id).await {
        Ok(filename) => {
            tracing::info!(task_id, filename, "Processed input image");
            filename
        }
        Err(e) => {
            return Ok(JobResponse::error(format!("Failed to process image: {e}")));
        }
    };

    let graph = workflow::compose(&request, &image_filename)?;

    let outputs = executor::submit_and_collect(
        &state.api,
        &state.client,
        &state.client_id,
        &graph,
    )
    .await?;

    Ok(select_video(outputs))
}

/// Materialize the job's image source into the engine input directory.
async fn normalize_input(
    state: &AppState,
    source: ImageSource<'_>,
    task_id: &str,
) -> Result<String, input::InputError> {
    let input_dir = &state.config.input_dir;
    match source {
        ImageSource::Path(path) => input::process_image_path(path, task_id, input_dir).await,
        ImageSource::Base64(payload) => {
            input::process_image_base64(payload, task_id, input_dir).await
        }
    }
}

/// Pick the job's video from the collected outputs.
///
/// Scans the result map in iteration order and returns the first
/// element of the first non-empty output list; when every list is
/// empty, the job recovers into a structured error.
pub fn select_video(outputs: Outputs) -> JobResponse {
    for (node_id, mut videos) in outputs {
        if !videos.is_empty() {
            tracing::info!(node_id, "Returning first produced video");
            return JobResponse::Video {
                video: videos.remove(0),
            };
        }
    }
    JobResponse::error("No videos found.")
}
