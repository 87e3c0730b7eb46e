//! Input image normalization.
//!
//! Materializes a job's image source (remote URL, local path, or
//! inline base64 payload) into the engine's input directory under a
//! task-scoped filename, and returns the bare filename -- the engine
//! resolves inputs relative to its own input directory.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Fallback extension when the source carries none.
const DEFAULT_EXT: &str = ".jpg";

/// Errors materializing an input image. All variants are recoverable
/// into a structured job-error response by the handler.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Failed to download image from URL: {0}")]
    Download(String),

    #[error("Image file not found: {0}")]
    NotFound(String),

    #[error("Failed to decode base64 image: {0}")]
    Decode(String),

    #[error("Failed to store input image: {0}")]
    Io(#[from] std::io::Error),
}

/// Materialize a URL or local-path image source.
///
/// Writes `{task_id}_input{ext}` into `input_dir` (created if absent),
/// where `ext` comes from the source path and falls back to `.jpg`.
pub async fn process_image_path(
    source: &str,
    task_id: &str,
    input_dir: &Path,
) -> Result<String, InputError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return download_image(source, task_id, input_dir).await;
    }

    tracing::info!(source, "Processing local file path");

    if tokio::fs::metadata(source).await.is_err() {
        return Err(InputError::NotFound(source.to_string()));
    }

    let filename = format!("{task_id}_input{}", extension_of(source));
    let target = input_dir.join(&filename);

    tokio::fs::create_dir_all(input_dir).await?;
    tokio::fs::copy(source, &target).await?;
    tracing::info!(target = %target.display(), "Copied local file");

    Ok(filename)
}

/// Materialize an inline base64 payload, optionally `data:` prefixed.
///
/// Decoding is strict: canonical alphabet and padding only.
pub async fn process_image_base64(
    payload: &str,
    task_id: &str,
    input_dir: &Path,
) -> Result<String, InputError> {
    let encoded = if payload.starts_with("data:") {
        payload
            .split_once(',')
            .map(|(_, rest)| rest)
            .ok_or_else(|| {
                InputError::Decode("data URI has no ',' separator".to_string())
            })?
    } else {
        payload
    };

    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| InputError::Decode(e.to_string()))?;

    let filename = format!("{task_id}_input{DEFAULT_EXT}");
    let target = input_dir.join(&filename);

    tokio::fs::create_dir_all(input_dir).await?;
    tokio::fs::write(&target, bytes).await?;
    tracing::info!(target = %target.display(), "Saved base64 image");

    Ok(filename)
}

/// Fetch a remote image and write it into the input directory.
async fn download_image(
    url: &str,
    task_id: &str,
    input_dir: &Path,
) -> Result<String, InputError> {
    tracing::info!(url, "Downloading image");

    let ext = reqwest::Url::parse(url)
        .map(|u| extension_of(u.path()))
        .map_err(|e| InputError::Download(e.to_string()))?;
    let filename = format!("{task_id}_input{ext}");
    let target = input_dir.join(&filename);

    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| InputError::Download(e.to_string()))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| InputError::Download(e.to_string()))?;

    tokio::fs::create_dir_all(input_dir).await?;
    tokio::fs::write(&target, &bytes).await?;
    tracing::info!(target = %target.display(), bytes = bytes.len(), "Downloaded image");

    Ok(filename)
}

/// Dot-prefixed extension of a path, or `.jpg` when there is none.
fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| DEFAULT_EXT.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[test]
    fn extension_falls_back_to_jpg() {
        assert_eq!(extension_of("/images/photo.png"), ".png");
        assert_eq!(extension_of("/images/photo"), ".jpg");
    }

    #[tokio::test]
    async fn copies_local_file_with_task_scoped_name() {
        let src_dir = tempfile::tempdir().unwrap();
        let input_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("cat.webp");
        tokio::fs::write(&src, b"not really webp").await.unwrap();

        let filename =
            process_image_path(src.to_str().unwrap(), "task_1", input_dir.path())
                .await
                .unwrap();

        assert_eq!(filename, "task_1_input.webp");
        let written = tokio::fs::read(input_dir.path().join(&filename))
            .await
            .unwrap();
        assert_eq!(written, b"not really webp");
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let input_dir = tempfile::tempdir().unwrap();
        let err = process_image_path("/no/such/file.png", "task_1", input_dir.path())
            .await
            .unwrap_err();
        assert_matches!(err, InputError::NotFound(_));
    }

    #[tokio::test]
    async fn decodes_data_uri_payload() {
        let input_dir = tempfile::tempdir().unwrap();
        let payload = format!("data:image/jpeg;base64,{}", BASE64.encode(b"jpeg bytes"));

        let filename = process_image_base64(&payload, "task_2", input_dir.path())
            .await
            .unwrap();

        assert_eq!(filename, "task_2_input.jpg");
        let written = tokio::fs::read(input_dir.path().join(&filename))
            .await
            .unwrap();
        assert_eq!(written, b"jpeg bytes");
    }

    #[tokio::test]
    async fn decodes_bare_payload() {
        let input_dir = tempfile::tempdir().unwrap();
        let filename =
            process_image_base64(&BASE64.encode(b"x"), "task_3", input_dir.path())
                .await
                .unwrap();
        assert_eq!(filename, "task_3_input.jpg");
    }

    #[tokio::test]
    async fn malformed_base64_is_a_decode_error() {
        let input_dir = tempfile::tempdir().unwrap();
        let err = process_image_base64("!!!not-base64!!!", "task_4", input_dir.path())
            .await
            .unwrap_err();
        assert_matches!(err, InputError::Decode(_));
        // No file is created on failure.
        assert!(std::fs::read_dir(input_dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn data_uri_without_separator_is_a_decode_error() {
        let input_dir = tempfile::tempdir().unwrap();
        let err = process_image_base64("data:image/jpeg;base64", "task_5", input_dir.path())
            .await
            .unwrap_err();
        assert_matches!(err, InputError::Decode(_));
    }

    /// One-shot HTTP fixture returning `body` for any request.
    async fn serve_once(
        status_line: &'static str,
        body: &'static [u8],
    ) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let header = format!(
                "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes()).await;
            let _ = stream.write_all(body).await;
        });
        addr
    }

    #[tokio::test]
    async fn downloads_url_with_extension_from_path() {
        let addr = serve_once("HTTP/1.1 200 OK", b"png bytes").await;
        let input_dir = tempfile::tempdir().unwrap();

        let filename = process_image_path(
            &format!("http://{addr}/images/photo.png"),
            "task_6",
            input_dir.path(),
        )
        .await
        .unwrap();

        assert_eq!(filename, "task_6_input.png");
        let written = tokio::fs::read(input_dir.path().join(&filename))
            .await
            .unwrap();
        assert_eq!(written, b"png bytes");
    }

    #[tokio::test]
    async fn http_error_status_is_a_download_error() {
        let addr = serve_once("HTTP/1.1 404 Not Found", b"").await;
        let input_dir = tempfile::tempdir().unwrap();

        let err = process_image_path(
            &format!("http://{addr}/missing.jpg"),
            "task_7",
            input_dir.path(),
        )
        .await
        .unwrap_err();

        assert_matches!(err, InputError::Download(_));
    }
}
