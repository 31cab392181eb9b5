use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes plus the LSP-reserved ones we can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
    ServerNotInitialized = -32002,
    RequestCancelled = -32800,
}

impl ErrorCode {
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A response to a request. `id` is `None` only for errors the peer could not attribute to a
/// request (e.g. parse errors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    // `"result": null` is a valid success payload, so a present null must stay `Some(Null)`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn from_error(id: RequestId, error: ResponseError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }

    /// Collapses the response into the usual `Result` shape. A response that carries neither a
    /// result nor an error is treated as a `null` result.
    pub fn into_result(self) -> Result<Value, ResponseError> {
        match (self.error, self.result) {
            (Some(err), _) => Err(err),
            (None, Some(value)) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// Classifies a decoded JSON value by the JSON-RPC shape rules: `method` + `id` is a request,
    /// `method` alone is a notification, anything else with `result`/`error` is a response.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let has_method = value.get("method").is_some_and(Value::is_string);
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        if has_method && has_id {
            serde_json::from_value(value).map(Message::Request)
        } else if has_method {
            serde_json::from_value(value).map(Message::Notification)
        } else {
            serde_json::from_value(value).map(Message::Response)
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Message::Request(req) => serde_json::to_value(req),
            Message::Response(resp) => serde_json::to_value(resp),
            Message::Notification(note) => serde_json::to_value(note),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_messages_by_shape() {
        let req = Message::from_value(json!({
            "jsonrpc": "2.0", "id": 3, "method": "workspace/configuration", "params": {"items": []}
        }))
        .expect("request");
        assert!(matches!(req, Message::Request(ref r) if r.id == RequestId::Number(3)));

        let note = Message::from_value(json!({
            "jsonrpc": "2.0", "method": "window/logMessage", "params": {"type": 3, "message": "hi"}
        }))
        .expect("notification");
        assert!(matches!(note, Message::Notification(ref n) if n.method == "window/logMessage"));

        let resp = Message::from_value(json!({"jsonrpc": "2.0", "id": "abc", "result": [1]}))
            .expect("response");
        assert!(
            matches!(resp, Message::Response(ref r) if r.id == Some(RequestId::String("abc".into())))
        );
    }

    #[test]
    fn null_result_is_kept_as_success() {
        let resp: Response =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null}))
                .expect("decode");
        assert_eq!(resp.result, Some(Value::Null));
        assert_eq!(resp.into_result().expect("ok"), Value::Null);

        let encoded = serde_json::to_value(Response::ok(RequestId::Number(9), Value::Null))
            .expect("encode");
        assert_eq!(encoded, json!({"jsonrpc": "2.0", "id": 9, "result": null}));
    }

    #[test]
    fn error_response_wins_over_result() {
        let resp: Response = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "nope"}
        }))
        .expect("decode");
        let err = resp.into_result().expect_err("error");
        assert_eq!(err.code, ErrorCode::MethodNotFound.as_i64());
        assert_eq!(err.message, "nope");
    }
}
