//! Minimal HTTP/1.1 request builders for the stream and telemetry sockets

use crate::protocol::PATH_LEN;
use crate::{MonitorError, Result};

/// Largest POST request the telemetry task will send.
pub const MAX_POST_SIZE: usize = 256;

/// Largest GET request the stream task will send.
pub const MAX_GET_SIZE: usize = 128;

/// Default `User-Agent` product token.
pub const DEFAULT_USER_AGENT: &str = "Somnox-ESP32/0.0";

/// Build a keep-alive `GET /{path}` request.
pub fn get_request(path: &str) -> Result<Vec<u8>> {
    if path.len() > PATH_LEN {
        return Err(MonitorError::config(
            "HTTP GET",
            format!("path is {} bytes, limit is {}", path.len(), PATH_LEN),
        ));
    }
    let request =
        format!("GET /{path} HTTP/1.1\r\nConnection: keep-alive\r\nAccept: */*\r\n\r\n");
    check_size("HTTP GET", request.into_bytes(), MAX_GET_SIZE)
}

/// Build a form-encoded `POST /telemetry` request carrying `args`.
pub fn post_request(user_agent: &str, args: &str) -> Result<Vec<u8>> {
    let request = format!(
        "POST /telemetry HTTP/1.1\r\n\
         User-Agent: {user_agent}\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {args}\r\n\r\n",
        args.len()
    );
    check_size("HTTP POST", request.into_bytes(), MAX_POST_SIZE)
}

fn check_size(context: &str, request: Vec<u8>, limit: usize) -> Result<Vec<u8>> {
    if request.len() >= limit {
        return Err(MonitorError::config(
            context,
            format!("request is {} bytes, limit is {}", request.len(), limit),
        ));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_request_format() {
        let request = get_request("ekg/live").unwrap();
        assert_eq!(
            std::str::from_utf8(&request).unwrap(),
            "GET /ekg/live HTTP/1.1\r\nConnection: keep-alive\r\nAccept: */*\r\n\r\n"
        );
    }

    #[test]
    fn get_request_rejects_long_paths() {
        let path = "p".repeat(PATH_LEN + 1);
        assert!(matches!(get_request(&path), Err(MonitorError::Config { .. })));
        assert!(get_request(&"p".repeat(PATH_LEN)).is_ok());
    }

    #[test]
    fn post_request_carries_length_and_body() {
        let request = post_request(DEFAULT_USER_AGENT, "counter=12").unwrap();
        let text = std::str::from_utf8(&request).unwrap();
        assert!(text.starts_with("POST /telemetry HTTP/1.1\r\n"));
        assert!(text.contains("User-Agent: Somnox-ESP32/0.0\r\n"));
        assert!(text.contains("Content-Length: 10\r\n"));
        assert!(text.ends_with("\r\n\r\ncounter=12\r\n\r\n"));
    }

    #[test]
    fn post_request_over_limit_is_rejected() {
        let args = "x".repeat(MAX_POST_SIZE);
        let err = post_request(DEFAULT_USER_AGENT, &args).unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
