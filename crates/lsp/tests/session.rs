use migrator_lsp::framing::{encode_frame, FrameReader};
use migrator_lsp::{Connection, LoggingClient, SessionError};
use migrator_protocol::{ClientInfo, InitializeParams};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

/// Scripted server end of an in-memory pipe. Every message the client sends is forwarded to
/// `seen`; `reply` decides what, if anything, goes back.
fn spawn_fake_server<F>(server: DuplexStream, mut reply: F) -> mpsc::UnboundedReceiver<Value>
where
    F: FnMut(&Value) -> Vec<Value> + Send + 'static,
{
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let (read, mut write): (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>) =
        tokio::io::split(server);
    tokio::spawn(async move {
        let mut frames = FrameReader::new(read);
        while let Ok(Some(msg)) = frames.next_message().await {
            for out in reply(&msg) {
                let bytes = encode_frame(&out).expect("encode");
                if write.write_all(&bytes).await.is_err() {
                    return;
                }
            }
            let _ = seen_tx.send(msg);
        }
    });
    seen_rx
}

fn connect(client_end: DuplexStream) -> Connection {
    let (read, write) = tokio::io::split(client_end);
    Connection::new(read, write, Arc::new(LoggingClient))
}

fn init_params() -> InitializeParams {
    InitializeParams {
        process_id: Some(42),
        root_uri: Some("file:///tmp/app".to_string()),
        capabilities: json!({}),
        initialization_options: Some(json!({"bundles": ["/jdtls/bundle.jar"]})),
        client_info: Some(ClientInfo {
            name: "migrator".to_string(),
            version: None,
        }),
    }
}

fn standard_server(msg: &Value) -> Vec<Value> {
    let id = msg.get("id").cloned().unwrap_or(Value::Null);
    match msg.get("method").and_then(Value::as_str) {
        Some("initialize") => vec![json!({
            "jsonrpc": "2.0", "id": id,
            "result": {"capabilities": {}, "serverInfo": {"name": "fake-jdtls", "version": "1.0"}}
        })],
        Some("workspace/executeCommand") => {
            let args = &msg["params"]["arguments"];
            vec![json!({
                "jsonrpc": "2.0", "id": id,
                "result": [{
                    "name": args[0]["query"],
                    "kind": 5,
                    "location": {
                        "uri": "file:///tmp/app/src/main/java/App.java",
                        "range": {"start": {"line": 3, "character": 0}, "end": {"line": 3, "character": 22}}
                    }
                }]
            })]
        }
        Some("shutdown") => vec![json!({"jsonrpc": "2.0", "id": id, "result": null})],
        _ => Vec::new(),
    }
}

#[tokio::test]
async fn handshake_then_execute_command() {
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let mut seen = spawn_fake_server(server_end, standard_server);

    let session = connect(client_end)
        .initialize(init_params(), Duration::from_secs(5))
        .await
        .expect("initialize");
    assert_eq!(
        session
            .initialize_result()
            .server_info
            .as_ref()
            .map(|s| s.name.as_str()),
        Some("fake-jdtls")
    );

    let result = session
        .execute_command(
            "io.konveyor.tackle.ruleEntry",
            vec![json!({"project": "java", "location": "4", "query": "org.acme.Service", "analysisMode": "source-only"})],
        )
        .await
        .expect("execute");
    assert_eq!(result[0]["name"], "org.acme.Service");

    let first = seen.recv().await.expect("initialize seen");
    assert_eq!(first["method"], "initialize");
    assert_eq!(first["params"]["rootUri"], "file:///tmp/app");
    assert_eq!(first["params"]["processId"], 42);
    let second = seen.recv().await.expect("initialized seen");
    assert_eq!(second["method"], "initialized");
    let third = seen.recv().await.expect("execute seen");
    assert_eq!(third["method"], "workspace/executeCommand");
    assert_eq!(third["params"]["command"], "io.konveyor.tackle.ruleEntry");

    session.shutdown(Duration::from_secs(1)).await;
    let shutdown = seen.recv().await.expect("shutdown seen");
    assert_eq!(shutdown["method"], "shutdown");
    let exit = seen.recv().await.expect("exit seen");
    assert_eq!(exit["method"], "exit");
}

#[tokio::test]
async fn silent_server_times_out_initialize() {
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let _seen = spawn_fake_server(server_end, |_| Vec::new());

    let err = connect(client_end)
        .initialize(init_params(), Duration::from_millis(100))
        .await
        .err()
        .expect("timeout");
    assert!(matches!(err, SessionError::InitializeTimeout(_)));
}

#[tokio::test]
async fn command_errors_surface_as_rpc_errors() {
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let _seen = spawn_fake_server(server_end, |msg| {
        let id = msg.get("id").cloned().unwrap_or(Value::Null);
        match msg.get("method").and_then(Value::as_str) {
            Some("initialize") => vec![json!({"jsonrpc": "2.0", "id": id, "result": {"capabilities": {}}})],
            Some("workspace/executeCommand") => vec![json!({
                "jsonrpc": "2.0", "id": id,
                "error": {"code": -32603, "message": "No delegateCommandHandler"}
            })],
            _ => Vec::new(),
        }
    });

    let session = connect(client_end)
        .initialize(init_params(), Duration::from_secs(5))
        .await
        .expect("initialize");
    let err = session
        .execute_command("unknown.command", Vec::new())
        .await
        .expect_err("rpc error");
    match err {
        SessionError::Rpc { method, error } => {
            assert_eq!(method, "workspace/executeCommand");
            assert_eq!(error.code, -32603);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn server_requests_are_answered() {
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let mut seen = spawn_fake_server(server_end, |msg| {
        let id = msg.get("id").cloned().unwrap_or(Value::Null);
        match msg.get("method").and_then(Value::as_str) {
            // Ask the client something before answering `initialize`.
            Some("initialize") => vec![
                json!({"jsonrpc": "2.0", "id": "cfg-1", "method": "workspace/configuration",
                       "params": {"items": [{"section": "java"}]}}),
                json!({"jsonrpc": "2.0", "id": "edit-1", "method": "workspace/applyEdit", "params": {}}),
                json!({"jsonrpc": "2.0", "method": "window/logMessage",
                       "params": {"type": 3, "message": "starting"}}),
                json!({"jsonrpc": "2.0", "id": id, "result": {"capabilities": {}}}),
            ],
            _ => Vec::new(),
        }
    });

    let _session = connect(client_end)
        .initialize(init_params(), Duration::from_secs(5))
        .await
        .expect("initialize");

    let mut answers = Vec::new();
    while answers.len() < 2 {
        let msg = seen.recv().await.expect("message");
        if msg.get("method").is_none() {
            answers.push(msg);
        }
    }
    answers.sort_by_key(|m| m["id"].as_str().unwrap_or_default().to_string());
    assert_eq!(answers[0]["id"], "cfg-1");
    assert_eq!(answers[0]["result"], json!([null]));
    assert_eq!(answers[1]["id"], "edit-1");
    assert_eq!(answers[1]["error"]["code"], -32601);
}

#[tokio::test]
async fn closed_stream_fails_the_handshake() {
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let conn = connect(client_end);

    // Server dies before answering.
    drop(server_end);
    let err = conn
        .initialize(init_params(), Duration::from_secs(5))
        .await
        .err()
        .expect("closed");
    assert!(matches!(err, SessionError::Closed | SessionError::IoError(_)));
}
