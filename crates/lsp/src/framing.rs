//! LSP-style `Content-Length: N\r\n\r\n<json>` framing over a byte stream.
//!
//! The JVM and its plugins occasionally print plain text to stdout, so complete lines that are not
//! part of a header block are treated as noise: logged under the `backend` target and dropped.

use serde_json::Value;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

const MAX_BUFFER_BYTES: usize = if cfg!(test) { 4096 } else { 64 * 1024 * 1024 };
const MAX_MESSAGE_BYTES: usize = if cfg!(test) { 1024 } else { 32 * 1024 * 1024 };

const CONTENT_LENGTH: &[u8] = b"content-length:";
const CONTENT_TYPE: &[u8] = b"content-type:";

const fn is_ascii_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn starts_with_ignore_case(buf: &[u8], prefix: &[u8]) -> bool {
    buf.len() >= prefix.len() && buf[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn starts_with_header(buf: &[u8]) -> bool {
    starts_with_ignore_case(buf, CONTENT_LENGTH) || starts_with_ignore_case(buf, CONTENT_TYPE)
}

fn strip_leading_whitespace(buf: &mut Vec<u8>) {
    match buf.iter().position(|b| !is_ascii_whitespace(*b)) {
        None => buf.clear(),
        Some(0) => {}
        Some(n) => {
            buf.drain(..n);
        }
    }
}

fn find_double_newline(buf: &[u8]) -> Option<usize> {
    // Prefer CRLFCRLF, fall back to LFLF. Returns the index just past the header block.
    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some(pos + 4);
    }
    buf.windows(2).position(|w| w == b"\n\n").map(|pos| pos + 2)
}

fn parse_content_length(headers: &str) -> Option<usize> {
    headers.lines().find_map(|raw_line| {
        let line = raw_line.trim_end_matches('\r').trim();
        if !starts_with_ignore_case(line.as_bytes(), CONTENT_LENGTH) {
            return None;
        }
        line[CONTENT_LENGTH.len()..].trim().parse::<usize>().ok()
    })
}

/// Encodes one JSON-RPC message with a `Content-Length` header.
pub fn encode_frame(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    let mut out = Vec::with_capacity(json.len() + 32);
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", json.len()).as_bytes());
    out.extend_from_slice(&json);
    Ok(out)
}

pub struct FrameReader<R> {
    read: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(read: R) -> Self {
        Self {
            read,
            buf: Vec::new(),
        }
    }

    /// Reads the next message body. `Ok(None)` means the stream ended cleanly.
    pub async fn next_message(&mut self) -> io::Result<Option<Value>> {
        loop {
            if let Some(value) = self.try_decode()? {
                return Ok(Some(value));
            }

            let mut tmp = [0u8; 8192];
            let n = self.read.read(&mut tmp).await?;
            if n == 0 {
                // EOF: a final frame may already be fully buffered.
                return self.try_decode();
            }
            self.buf.extend_from_slice(&tmp[..n]);
            if self.buf.len() > MAX_BUFFER_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "input buffer exceeded maximum size ({} > {MAX_BUFFER_BYTES})",
                        self.buf.len()
                    ),
                ));
            }
        }
    }

    fn try_decode(&mut self) -> io::Result<Option<Value>> {
        loop {
            strip_leading_whitespace(&mut self.buf);
            if self.buf.is_empty() {
                return Ok(None);
            }

            if !starts_with_header(&self.buf) {
                let Some(nl) = self.buf.iter().position(|b| *b == b'\n') else {
                    return Ok(None);
                };
                let line = self.buf.drain(..=nl).collect::<Vec<u8>>();
                log::debug!(target: "backend", "{}", String::from_utf8_lossy(&line).trim_end());
                continue;
            }

            let Some(header_end) = find_double_newline(&self.buf) else {
                return Ok(None);
            };
            let headers = std::str::from_utf8(&self.buf[..header_end])
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let Some(len) = parse_content_length(headers) else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "missing Content-Length header",
                ));
            };
            if len > MAX_MESSAGE_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Content-Length {len} exceeds maximum supported message size {MAX_MESSAGE_BYTES}"
                    ),
                ));
            }
            if self.buf.len() < header_end + len {
                return Ok(None);
            }

            let body = self.buf[header_end..header_end + len].to_vec();
            self.buf.drain(..header_end + len);
            match serde_json::from_slice::<Value>(&body) {
                Ok(value) => return Ok(Some(value)),
                Err(err) => {
                    // Framing is still intact; drop the frame instead of the whole session.
                    log::warn!("Dropping undecodable message body ({len} bytes): {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    async fn read_all(input: &[u8]) -> (Vec<Value>, io::Result<Option<Value>>) {
        let (mut client, server) = tokio::io::duplex(16_384);
        client.write_all(input).await.expect("write");
        drop(client);
        let mut reader = FrameReader::new(server);
        let mut out = Vec::new();
        loop {
            match reader.next_message().await {
                Ok(Some(value)) => out.push(value),
                other => return (out, other),
            }
        }
    }

    #[tokio::test]
    async fn decodes_consecutive_frames() {
        let mut input = encode_frame(&json!({"jsonrpc": "2.0", "id": 1, "result": null}))
            .expect("encode");
        input.extend(encode_frame(&json!({"jsonrpc": "2.0", "method": "x"})).expect("encode"));
        let (messages, tail) = read_all(&input).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["method"], "x");
        assert!(matches!(tail, Ok(None)));
    }

    #[tokio::test]
    async fn skips_noise_lines_and_extra_headers() {
        let body = br#"{"jsonrpc":"2.0","method":"window/logMessage"}"#;
        let mut input = b"Picked up JAVA_TOOL_OPTIONS: -Xss4m\n".to_vec();
        input.extend_from_slice(
            format!(
                "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n",
                body.len()
            )
            .as_bytes(),
        );
        input.extend_from_slice(body);
        let (messages, _) = read_all(&input).await;
        assert_eq!(messages, vec![json!({"jsonrpc": "2.0", "method": "window/logMessage"})]);
    }

    #[tokio::test]
    async fn drops_bad_body_but_keeps_reading() {
        let mut input = b"Content-Length: 5\r\n\r\n{oops".to_vec();
        input.extend(encode_frame(&json!({"ok": true})).expect("encode"));
        let (messages, _) = read_all(&input).await;
        assert_eq!(messages, vec![json!({"ok": true})]);
    }

    #[tokio::test]
    async fn rejects_excessive_content_length() {
        let (messages, tail) = read_all(b"Content-Length: 999999\r\n\r\n").await;
        assert!(messages.is_empty());
        assert!(tail.is_err());
    }

    #[tokio::test]
    async fn rejects_header_block_without_length() {
        let (_, tail) = read_all(b"Content-Type: text/plain\r\n\r\n{}").await;
        assert!(tail.is_err());
    }
}
