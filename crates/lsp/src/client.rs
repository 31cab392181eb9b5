use migrator_protocol::{ErrorCode, ResponseError};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct MessageParams {
    #[serde(rename = "type", default)]
    kind: u8,
    #[serde(default)]
    message: String,
}

fn message_type_label(kind: u8) -> &'static str {
    match kind {
        1 => "Error",
        2 => "Warning",
        3 => "Info",
        4 => "Log",
        _ => "Debug",
    }
}

fn decode_message(params: Option<&Value>) -> MessageParams {
    params
        .and_then(|p| MessageParams::deserialize(p).ok())
        .unwrap_or(MessageParams {
            kind: 0,
            message: String::new(),
        })
}

/// Client side of the language-server conversation: what we do with traffic the server starts.
///
/// None of these callbacks influence search results. The defaults log notifications and give every
/// server request an answer, so the server is never left waiting on us.
pub trait LanguageClient: Send + Sync {
    fn log_message(&self, params: Option<&Value>) {
        let msg = decode_message(params);
        log::debug!(
            "Log from server: [{}] {}",
            message_type_label(msg.kind),
            msg.message
        );
    }

    fn show_message(&self, params: Option<&Value>) {
        let msg = decode_message(params);
        log::info!(
            "Message from server: [{}] {}",
            message_type_label(msg.kind),
            msg.message
        );
    }

    fn telemetry_event(&self, params: Option<&Value>) {
        log::debug!("telemetryEvent: {}", params.unwrap_or(&Value::Null));
    }

    fn publish_diagnostics(&self, params: Option<&Value>) {
        let uri = params
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .unwrap_or("?");
        let count = params
            .and_then(|p| p.get("diagnostics"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        log::debug!("publishDiagnostics: {count} diagnostic(s) for {uri}");
    }

    fn on_notification(&self, method: &str, params: Option<&Value>) {
        match method {
            "window/logMessage" => self.log_message(params),
            "window/showMessage" => self.show_message(params),
            "telemetry/event" => self.telemetry_event(params),
            "textDocument/publishDiagnostics" => self.publish_diagnostics(params),
            other => log::trace!("Ignoring server notification `{other}`"),
        }
    }

    fn on_request(&self, method: &str, params: Option<&Value>) -> Result<Value, ResponseError> {
        match method {
            "window/showMessageRequest" => {
                log::info!("showMessageRequest: {}", params.unwrap_or(&Value::Null));
                Ok(Value::Null)
            }
            "workspace/configuration" => {
                let items = params
                    .and_then(|p| p.get("items"))
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Ok(Value::Array(vec![Value::Null; items]))
            }
            "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create" => Ok(Value::Null),
            other => Err(ResponseError {
                code: ErrorCode::MethodNotFound.as_i64(),
                message: format!("Unhandled method {other}"),
                data: None,
            }),
        }
    }
}

/// The default client: every callback is an inert log sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingClient;

impl LanguageClient for LoggingClient {}
