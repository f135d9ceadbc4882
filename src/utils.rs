use crate::error::ApiError;
use axum::body::Bytes;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// 1x1 fully transparent grayscale+alpha PNG.
const PIXEL_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub async fn with_timeout<F: Future>(
    duration_in_mills: u64,
    task: F,
) -> Result<<F as Future>::Output, ApiError> {
    Ok(tokio::time::timeout(Duration::from_millis(duration_in_mills), task).await?)
}

/// 128 random bits rendered as 32 lowercase hex digits.
pub fn generate_id() -> String {
    format!("{:032x}", rand::thread_rng().gen::<u128>())
}

pub fn to_link(base_url: &Url, path: &str, id: &str) -> Result<String, url::ParseError> {
    Ok(base_url.join(&format!("{path}/{id}"))?.to_string())
}

pub fn pixel() -> Result<Bytes, base64::DecodeError> {
    BASE64_STANDARD.decode(PIXEL_PNG_BASE64).map(Bytes::from)
}
