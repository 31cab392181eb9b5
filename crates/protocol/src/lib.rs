//! Wire types shared between the language-server session and the search engine.
//!
//! Only the slice of JSON-RPC 2.0 / LSP that the migrator actually speaks is modelled here.
//! Payloads the backend owns (server capabilities, command results) stay as `serde_json::Value`.

pub mod jsonrpc;
pub mod lsp;
pub mod uri;

pub use jsonrpc::{
    ErrorCode, Message, Notification, Request, RequestId, Response, ResponseError, JSONRPC_VERSION,
};
pub use lsp::{
    ClientInfo, ExecuteCommandParams, InitializeParams, InitializeResult, Location, Position,
    Range, ServerInfo, SymbolKind, SymbolMatch,
};
pub use uri::file_uri;
