//! HTTP Request Logger
//!
//! Appends every upload request/response pair to a file when enabled.
//! Set `UPLOAD_HTTP_LOG=1` or `UPLOAD_HTTP_LOG=true` to enable, and
//! `UPLOAD_HTTP_LOG_FILE` to choose the file (default `upload_http.log`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use tracing::warn;

use crate::transport::ResponseSnapshot;

/// Environment variable to control HTTP logging
const ENV_HTTP_LOG: &str = "UPLOAD_HTTP_LOG";

/// Environment variable for the log file path
const ENV_HTTP_LOG_FILE: &str = "UPLOAD_HTTP_LOG_FILE";

/// Default log file name
const LOG_FILE_NAME: &str = "upload_http.log";

/// Maximum response body size to log (10KB)
const MAX_BODY_SIZE: usize = 10000;

/// Sensitive headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "set-cookie",
    "cookie",
    "x-api-key",
    "x-auth-token",
    "proxy-authorization",
];

/// Global mutex for thread-safe log writing
static LOG_MUTEX: Mutex<()> = Mutex::new(());

/// Parse an on/off flag the way the environment switches are read
pub fn parse_flag(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "1" || v == "true" || v == "yes" || v == "on"
}

/// Check if HTTP logging is enabled
pub fn is_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(ENV_HTTP_LOG)
            .map(|v| parse_flag(&v))
            .unwrap_or(false)
    })
}

fn log_file_path() -> PathBuf {
    std::env::var(ENV_HTTP_LOG_FILE)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(LOG_FILE_NAME))
}

/// Outgoing upload request
pub struct HttpRequestLog {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Upload bodies are not logged, only their size
    pub body_size: u64,
}

/// Server response
pub struct HttpResponseLog {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpResponseLog {
    pub fn from_snapshot(snapshot: &ResponseSnapshot) -> Self {
        let headers = snapshot
            .raw_headers
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self {
            status: snapshot.status,
            headers,
            body: Some(String::from_utf8_lossy(&snapshot.body).into_owned()),
        }
    }
}

/// Build a request entry, or None when logging is disabled
pub fn build_request_log_if_enabled(
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body_size: u64,
) -> Option<HttpRequestLog> {
    if !is_enabled() {
        return None;
    }

    Some(HttpRequestLog {
        method: method.to_string(),
        url: url.to_string(),
        headers: headers.to_vec(),
        body_size,
    })
}

/// Log an HTTP request and response
pub fn log_request(
    request: &HttpRequestLog,
    response: Option<&HttpResponseLog>,
    duration_ms: u64,
    error: Option<&str>,
) {
    if !is_enabled() {
        return;
    }

    let content = format_entry(request, response, duration_ms, error);
    if let Err(e) = write_log(&log_file_path(), &content) {
        warn!("Failed to write HTTP log: {}", e);
    }
}

/// Render one log entry
pub fn format_entry(
    request: &HttpRequestLog,
    response: Option<&HttpResponseLog>,
    duration_ms: u64,
    error: Option<&str>,
) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let separator = "=".repeat(80);

    let mut log_content = format!(
        "\n{}\n[{}] {} {}\n{}\n",
        separator, timestamp, request.method, request.url, separator
    );

    log_content.push_str("\n--- Request Headers ---\n");
    for (name, value) in &request.headers {
        log_content.push_str(&format!("{}: {}\n", name, mask_sensitive_header(name, value)));
    }
    log_content.push_str(&format!("\n--- Request Body ---\n{} bytes\n", request.body_size));

    if let Some(resp) = response {
        log_content.push_str(&format!("\n--- Response ({}ms) ---\n", duration_ms));
        log_content.push_str(&format!("Status: {}\n", resp.status));

        log_content.push_str("\n--- Response Headers ---\n");
        for (name, value) in &resp.headers {
            log_content.push_str(&format!("{}: {}\n", name, mask_sensitive_header(name, value)));
        }

        if let Some(body) = &resp.body {
            log_content.push_str("\n--- Response Body ---\n");
            log_content.push_str(&truncate_utf8_safe(body, MAX_BODY_SIZE));
            log_content.push('\n');
        }
    }

    if let Some(err) = error {
        log_content.push_str(&format!("\n--- Error ({}ms) ---\n{}\n", duration_ms, err));
    }

    log_content.push_str(&format!("\n{}\n", separator));
    log_content
}

fn write_log(path: &PathBuf, content: &str) -> std::io::Result<()> {
    // Concurrent uploads must not interleave entries
    let _guard = LOG_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Check if a header is sensitive and should be masked
pub fn is_sensitive_header(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    SENSITIVE_HEADERS.iter().any(|h| name_lower == *h)
}

fn mask_sensitive_header(name: &str, value: &str) -> String {
    if is_sensitive_header(name) {
        mask_token(value)
    } else {
        value.to_string()
    }
}

/// Keep the first and last four characters of long secrets
pub fn mask_token(value: &str) -> String {
    let (scheme, secret) = match value.split_once(' ') {
        Some((scheme, secret)) => (Some(scheme), secret),
        None => (None, value),
    };

    let chars: Vec<char> = secret.chars().collect();
    let masked = if chars.len() > 8 {
        let prefix: String = chars[..4].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "****".to_string()
    };

    match scheme {
        Some(scheme) => format!("{} {}", scheme, masked),
        None => masked,
    }
}

/// Truncate string at UTF-8 character boundary (safe for multi-byte chars)
pub fn truncate_utf8_safe(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...\n[truncated, total {} bytes]", &s[..end], s.len())
}

/// Response headers as name/value pairs, one pair per value
pub fn response_headers(response: &reqwest::Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_format_entry_masks_and_reports_size() {
        let request = HttpRequestLog {
            method: "PUT".to_string(),
            url: "http://localhost/put".to_string(),
            headers: vec![
                ("Authorization".to_string(), "Bearer abcdefghijklmnop".to_string()),
                ("Content-Type".to_string(), "text/plain".to_string()),
            ],
            body_size: 42,
        };
        let entry = format_entry(&request, None, 3, Some("connection refused"));

        assert!(entry.contains("PUT http://localhost/put"));
        assert!(entry.contains("Authorization: Bearer abcd...mnop"));
        assert!(entry.contains("Content-Type: text/plain"));
        assert!(entry.contains("42 bytes"));
        assert!(entry.contains("--- Error (3ms) ---\nconnection refused"));
    }

    #[test]
    fn test_response_log_from_snapshot() {
        let snapshot = ResponseSnapshot {
            status: 201,
            raw_headers: "content-type: text/plain\r\nx-id: 7\r\n".to_string(),
            body: Bytes::from_static(b"ok"),
        };
        let log = HttpResponseLog::from_snapshot(&snapshot);
        assert_eq!(log.status, 201);
        assert_eq!(log.headers.len(), 2);
        assert_eq!(log.body.as_deref(), Some("ok"));
    }
}
