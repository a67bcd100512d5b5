//! HTTP response handlers.

use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::{Read, Seek, SeekFrom},
    path::Path,
};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::utils::mime::types::PLAIN;

/// Respond with the compiled artifact, or 404 when it doesn't exist yet.
pub fn respond_artifact(request: Request, path: &Path) -> Result<()> {
    if !path.is_file() {
        return respond_not_found(request);
    }
    let content_type = crate::utils::mime::from_path(path);

    if is_head_request(&request) {
        let len = fs::metadata(path)?.len();
        return send_head(request, 200, content_type, len);
    }

    // PDF viewers fetch large documents in ranges
    let range = header_value(&request, "Range");
    if let Some(spec) = range.as_deref().and_then(byte_range_spec) {
        return respond_range(request, path, content_type, spec);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

/// Handle a byte Range request.
fn respond_range(
    request: Request,
    path: &Path,
    content_type: &'static str,
    range: &str,
) -> Result<()> {
    let file_size = fs::metadata(path)?.len();

    let Some((start, end)) = parse_range(range, file_size) else {
        let response = Response::empty(StatusCode(416))
            .with_header(make_header("Content-Range", &format!("bytes */{file_size}"))?);
        request.respond(response)?;
        return Ok(());
    };
    let length = end - start + 1;

    // Stream the requested range - no memory allocation for large ranges
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let reader = file.take(length);

    let content_range = format!("bytes {start}-{end}/{file_size}");
    let response = Response::new(
        StatusCode(206),
        vec![
            make_header("Content-Type", content_type)?,
            make_header("Content-Range", &content_range)?,
            make_header("Accept-Ranges", "bytes")?,
            make_header("Cache-Control", "no-store")?,
        ],
        reader,
        Some(length as usize),
        None,
    );

    request.respond(response)?;
    Ok(())
}

/// The range set of a `Range: bytes=...` header.
///
/// Other units are not understood and yield `None`, so the full body is sent.
pub fn byte_range_spec(header: &str) -> Option<&str> {
    let (unit, spec) = header.trim().split_once('=')?;
    unit.trim().eq_ignore_ascii_case("bytes").then_some(spec)
}

/// Parse a single "start-end" range into inclusive bounds.
///
/// Returns `None` when the range cannot be satisfied.
pub fn parse_range(range: &str, file_size: u64) -> Option<(u64, u64)> {
    if file_size == 0 {
        return None;
    }
    let last = file_size - 1;
    // Only the first range of a multi-range request is honored
    let range = range.split(',').next()?.trim();
    let (s, e) = range.split_once('-')?;
    let (s, e) = (s.trim(), e.trim());

    let (start, end) = match (s.is_empty(), e.is_empty()) {
        // "0-499" - specific range
        (false, false) => (s.parse().ok()?, e.parse::<u64>().ok()?.min(last)),
        // "500-" - from start to end
        (false, true) => (s.parse().ok()?, last),
        // "-500" - last 500 bytes
        (true, false) => {
            let suffix: u64 = e.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            (file_size.saturating_sub(suffix), last)
        }
        (true, true) => return None,
    };

    (start <= end).then_some((start, end))
}

/// Respond with 404.
pub fn respond_not_found(request: Request) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 404, PLAIN, 0);
    }
    send_body(request, 404, PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 400 and a short reason.
pub fn respond_bad_request(request: Request, reason: &str) -> Result<()> {
    send_body(request, 400, PLAIN, reason.as_bytes().to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

/// Case-insensitive request header lookup.
pub fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.to_string())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str, len: u64) -> Result<()> {
    let response = Response::empty(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Content-Length", &len.to_string())?)
        .with_header(make_header("Accept-Ranges", "bytes")?)
        .with_header(make_header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Accept-Ranges", "bytes")?)
        .with_header(make_header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

pub(super) fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header `{key}: {value}`"))
}
