use std::path::Path;

/// Builds a `file://` URI for an absolute path.
///
/// Backslashes are normalized to `/` and a drive-letter path gets the extra leading slash
/// (`file:///C:/...`). Bytes outside the RFC 3986 unreserved set (plus `/` and `:`) are
/// percent-encoded.
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut out = String::with_capacity(raw.len() + 8);
    out.push_str("file://");
    if !raw.starts_with('/') {
        out.push('/');
    }
    for byte in raw.bytes() {
        let keep = byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/' | b':');
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
