use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT, IF_MODIFIED_SINCE, LAST_MODIFIED, USER_AGENT};
use reqwest::{Client, StatusCode};
use rootstrap_common::error::{Result, RootstrapError};
use tokio::fs::{self, File as TokioFile};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "rootstrap (Rust; +https://github.com/rootstrap/rootstrap)";

/// Whether a cached fetch moved any bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded,
    NotModified,
}

pub fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, reqwest::header::HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, reqwest::header::HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| RootstrapError::Config(format!("Failed to build HTTP client: {e}")))
}

fn fetch_error(url: &str, reason: impl ToString) -> RootstrapError {
    RootstrapError::Fetch {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// GETs `url` and returns the body as text. Any non-success status is an error.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    debug!("Fetching {}", url);
    let response = client.get(url).send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        fetch_error(url, e)
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(url, format!("HTTP status {status}")));
    }
    response
        .text()
        .await
        .map_err(|e| fetch_error(url, format!("Failed to read response body: {e}")))
}

/// Downloads `url` to `cache_path`. When a cached copy exists the request is
/// conditional on the copy's modification time and a `304` keeps it as is.
pub async fn fetch_file(client: &Client, url: &str, cache_path: &Path) -> Result<FetchOutcome> {
    let mut request = client.get(url);
    if let Some(modified) = cached_mtime(cache_path).await {
        let since = format_http_date(modified);
        debug!(
            "Cached copy exists at {}, requesting only if modified since {}",
            cache_path.display(),
            since
        );
        request = request.header(IF_MODIFIED_SINCE, since);
    }

    let response = request.send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        fetch_error(url, e)
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if status == StatusCode::NOT_MODIFIED {
        debug!("Cached copy is current: {}", cache_path.display());
        return Ok(FetchOutcome::NotModified);
    }
    if !status.is_success() {
        return Err(match status {
            StatusCode::NOT_FOUND => fetch_error(url, "Resource not found (404)"),
            StatusCode::FORBIDDEN => fetch_error(url, "Access forbidden (403)"),
            _ => fetch_error(url, format!("HTTP status {status}")),
        });
    }

    let last_modified = response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);

    let temp_path = temp_path_for(cache_path);
    if fs::try_exists(&temp_path).await.unwrap_or(false) {
        debug!("Removing stale temporary file {}", temp_path.display());
        fs::remove_file(&temp_path)
            .await
            .map_err(|e| RootstrapError::io_at("remove", &temp_path, e))?;
    }

    if let Err(e) = write_body(response, &temp_path, last_modified).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    fs::rename(&temp_path, cache_path).await.map_err(|e| {
        RootstrapError::IoError(format!(
            "Failed to move temp file {} to {}: {}",
            temp_path.display(),
            cache_path.display(),
            e
        ))
    })?;
    debug!("Downloaded {} to {}", url, cache_path.display());
    Ok(FetchOutcome::Downloaded)
}

async fn write_body(
    response: reqwest::Response,
    temp_path: &Path,
    last_modified: Option<SystemTime>,
) -> Result<()> {
    let url = response.url().to_string();
    let mut temp_file = TokioFile::create(temp_path)
        .await
        .map_err(|e| RootstrapError::io_at("create temp file", temp_path, e))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| fetch_error(&url, format!("Failed to read body: {e}")))?;
        temp_file
            .write_all(&chunk)
            .await
            .map_err(|e| RootstrapError::io_at("write", temp_path, e))?;
    }
    temp_file
        .flush()
        .await
        .map_err(|e| RootstrapError::io_at("flush", temp_path, e))?;

    let std_file = temp_file.into_std().await;
    if let Some(modified) = last_modified {
        std_file
            .set_modified(modified)
            .map_err(|e| RootstrapError::io_at("set modification time of", temp_path, e))?;
    }
    std_file
        .sync_all()
        .map_err(|e| RootstrapError::io_at("sync", temp_path, e))?;
    Ok(())
}

fn temp_path_for(final_path: &Path) -> PathBuf {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    final_path.with_file_name(temp_filename)
}

async fn cached_mtime(path: &Path) -> Option<SystemTime> {
    let metadata = fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    metadata.modified().ok()
}

/// IMF-fixdate, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`.
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| SystemTime::from(dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    const LAST_MODIFIED_DATE: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

    #[test]
    fn http_dates_round_trip() {
        let time = parse_http_date(LAST_MODIFIED_DATE).unwrap();
        assert_eq!(format_http_date(time), LAST_MODIFIED_DATE);
        assert!(parse_http_date("yesterday").is_none());
    }

    #[tokio::test]
    async fn second_fetch_of_unchanged_file_transfers_nothing() {
        let mut server = Server::new_async().await;
        let full = server
            .mock("GET", "/core/os/x86_64/zlib-1.3-1-x86_64.pkg.tar.zst")
            .match_header("if-modified-since", Matcher::Missing)
            .with_status(200)
            .with_header("last-modified", LAST_MODIFIED_DATE)
            .with_body("package bytes")
            .expect(1)
            .create_async()
            .await;
        let conditional = server
            .mock("GET", "/core/os/x86_64/zlib-1.3-1-x86_64.pkg.tar.zst")
            .match_header("if-modified-since", LAST_MODIFIED_DATE)
            .with_status(304)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("zlib-1.3-1-x86_64.pkg.tar.zst");
        let url = format!("{}/core/os/x86_64/zlib-1.3-1-x86_64.pkg.tar.zst", server.url());
        let client = build_http_client().unwrap();

        let first = fetch_file(&client, &url, &cache_path).await.unwrap();
        let second = fetch_file(&client, &url, &cache_path).await.unwrap();

        assert_eq!(first, FetchOutcome::Downloaded);
        assert_eq!(second, FetchOutcome::NotModified);
        assert_eq!(std::fs::read_to_string(&cache_path).unwrap(), "package bytes");
        full.assert_async().await;
        conditional.assert_async().await;
    }

    #[tokio::test]
    async fn newer_remote_replaces_cached_copy() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/pkg.tar.zst")
            .with_status(200)
            .with_body("new bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("pkg.tar.zst");
        std::fs::write(&cache_path, "old bytes").unwrap();
        std::fs::write(dir.path().join(".pkg.tar.zst.download"), "partial").unwrap();

        let client = build_http_client().unwrap();
        let url = format!("{}/pkg.tar.zst", server.url());
        let outcome = fetch_file(&client, &url, &cache_path).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded);
        assert_eq!(std::fs::read_to_string(&cache_path).unwrap(), "new bytes");
        assert!(!dir.path().join(".pkg.tar.zst.download").exists());
    }

    #[tokio::test]
    async fn missing_remote_is_a_fetch_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.pkg.tar.zst")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("missing.pkg.tar.zst");
        let client = build_http_client().unwrap();
        let url = format!("{}/missing.pkg.tar.zst", server.url());

        let err = fetch_file(&client, &url, &cache_path).await.unwrap_err();
        assert!(matches!(err, RootstrapError::Fetch { .. }));
        assert!(!cache_path.exists());
        assert!(!dir.path().join(".missing.pkg.tar.zst.download").exists());
    }
}
