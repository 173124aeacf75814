//! HTTP/WebSocket command API for the HB100 editor.
//!
//! Clients submit commands as JSON, either via an HTTP POST or a WebSocket
//! text frame:
//!
//! ```json
//! { "request": "change-preset", "arguments": ["42"] }
//! ```
//!
//! The request is translated straight into an engine task with the client
//! attached as completion context; the completion document comes back as
//! `{ "code": <int>, "payload": <any> }`. Validation failures answer code
//! 400 with a distinct reason string per failure shape. A WebSocket client
//! additionally receives a "Command queued" acknowledgement before the real
//! completion, mirroring the vendor editor's behaviour.
//!
//! The server runs on one background thread; each HTTP request and each
//! WebSocket connection is serviced on its own worker so a slow command
//! never blocks the accept loop.

use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tiny_http::{Header, Method, Response};
use tracing::{debug, info, warn};
use tungstenite::protocol::{Role, WebSocket};
use tungstenite::Message;

use hb100_engine::{Task, TaskQueue};

/// How long a client waits for its command to complete before giving up.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while starting the server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The listening socket could not be bound.
    #[error("failed to start HTTP/WebSocket server: {0}")]
    Bind(String),
}

/// The distinct request-validation failures, each with its own reason
/// string in the 400 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Body is not parseable JSON.
    InvalidJson,
    /// Body parses but is not a JSON object.
    NotJsonObject,
    /// `request` member missing or not a string.
    InvalidRequest,
    /// `arguments` member present but not an array.
    InvalidArguments,
    /// An `arguments` element is not a string.
    InvalidArgument,
    /// The command verb or its arguments were rejected.
    InvalidCommand,
}

impl RequestError {
    /// The reason string reported to the client.
    pub fn reason(self) -> &'static str {
        match self {
            RequestError::InvalidJson => "Invalid JSON",
            RequestError::NotJsonObject => "Not a JSON object",
            RequestError::InvalidRequest => "Invalid request",
            RequestError::InvalidArguments => "Invalid arguments",
            RequestError::InvalidArgument => "Invalid argument (not a string)",
            RequestError::InvalidCommand => "Invalid command",
        }
    }
}

/// Translate a request body into an engine task.
pub fn parse_command(text: &str) -> Result<Task, RequestError> {
    let json: Value = serde_json::from_str(text).map_err(|_| RequestError::InvalidJson)?;
    let Some(object) = json.as_object() else {
        return Err(RequestError::NotJsonObject);
    };
    let request = object
        .get("request")
        .and_then(Value::as_str)
        .ok_or(RequestError::InvalidRequest)?;
    let mut argv = vec![request.to_string()];
    if let Some(arguments) = object.get("arguments") {
        let arguments = arguments.as_array().ok_or(RequestError::InvalidArguments)?;
        for argument in arguments {
            let argument = argument.as_str().ok_or(RequestError::InvalidArgument)?;
            argv.push(argument.to_string());
        }
    }
    Task::from_argv(&argv).ok_or(RequestError::InvalidCommand)
}

fn error_document(error: RequestError) -> Value {
    json!({ "code": 400, "payload": { "reason": error.reason() } })
}

fn completion_document(code: u16, payload: Value) -> Value {
    json!({ "code": code, "payload": payload })
}

/// Enqueue a parsed task and wait for its completion document.
fn submit_and_wait(queue: &TaskQueue, mut task: Task) -> Value {
    let (tx, rx) = mpsc::sync_channel::<(u16, Value)>(1);
    task.attach_completion(Box::new(move |code, payload| {
        let _ = tx.try_send((code, payload));
    }));
    queue.push(task);
    match rx.recv_timeout(COMPLETION_TIMEOUT) {
        Ok((code, payload)) => completion_document(code, payload),
        Err(_) => {
            warn!("command completion timed out");
            json!({ "code": 504, "payload": { "reason": "Command timed out" } })
        }
    }
}

type Clients = Arc<Mutex<HashMap<u64, String>>>;

/// The HTTP/WebSocket command server.
pub struct Server {
    server: Arc<tiny_http::Server>,
    accept_thread: Option<JoinHandle<()>>,
    clients: Clients,
}

impl Server {
    /// Bind the server on `port` and start the accept loop. Port 0 picks an
    /// ephemeral port (see [`local_addr`](Self::local_addr)).
    pub fn start(port: u16, queue: Arc<TaskQueue>) -> Result<Self, ApiError> {
        let server = tiny_http::Server::http(("0.0.0.0", port))
            .map_err(|e| ApiError::Bind(e.to_string()))?;
        let server = Arc::new(server);
        let clients: Clients = Arc::default();
        info!(addr = %server.server_addr(), "HTTP/WebSocket server started");

        let accept_thread = {
            let server = Arc::clone(&server);
            let clients = Arc::clone(&clients);
            std::thread::spawn(move || accept_loop(&server, &queue, &clients))
        };

        Ok(Self {
            server,
            accept_thread: Some(accept_thread),
            clients,
        })
    }

    /// The bound address, useful when started on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Number of connected WebSocket clients.
    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("client table poisoned").len()
    }

    /// Stop accepting connections and join the accept thread. WebSocket
    /// worker threads end when their peers disconnect.
    pub fn shutdown(mut self) {
        self.server.unblock();
        if let Some(thread) = self.accept_thread.take() {
            let _ = thread.join();
        }
        info!("HTTP/WebSocket server stopped");
    }
}

fn accept_loop(server: &tiny_http::Server, queue: &Arc<TaskQueue>, clients: &Clients) {
    static CLIENT_IDS: AtomicU64 = AtomicU64::new(1);
    for request in server.incoming_requests() {
        if is_websocket_upgrade(&request) {
            let id = CLIENT_IDS.fetch_add(1, Ordering::Relaxed);
            let queue = Arc::clone(queue);
            let clients = Arc::clone(clients);
            std::thread::spawn(move || serve_websocket(request, id, &queue, &clients));
            continue;
        }
        let queue = Arc::clone(queue);
        std::thread::spawn(move || serve_http(request, &queue));
    }
}

fn is_websocket_upgrade(request: &tiny_http::Request) -> bool {
    let upgrade = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Upgrade"))
        .map(|h| h.value.as_str().eq_ignore_ascii_case("websocket"));
    upgrade == Some(true) && websocket_key(request).is_some()
}

fn websocket_key(request: &tiny_http::Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Sec-WebSocket-Key"))
        .map(|h| h.value.as_str().to_string())
}

fn json_header() -> Header {
    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header is valid")
}

fn serve_http(mut request: tiny_http::Request, queue: &Arc<TaskQueue>) {
    if *request.method() != Method::Post {
        let _ = request.respond(Response::from_string("Use POST").with_status_code(404));
        return;
    }
    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() {
        let _ = request.respond(Response::from_string("Bad body").with_status_code(400));
        return;
    }
    info!("[HTTP] {body}");
    let document = match parse_command(&body) {
        Ok(task) => submit_and_wait(queue, task),
        Err(error) => {
            warn!(reason = error.reason(), "rejecting HTTP command");
            error_document(error)
        }
    };
    let response = Response::from_string(document.to_string()).with_header(json_header());
    let _ = request.respond(response);
}

fn serve_websocket(request: tiny_http::Request, id: u64, queue: &Arc<TaskQueue>, clients: &Clients) {
    let Some(key) = websocket_key(&request) else {
        let _ = request.respond(Response::from_string("Bad upgrade").with_status_code(400));
        return;
    };
    let accept = tungstenite::handshake::derive_accept_key(key.as_bytes());
    let peer = request
        .remote_addr()
        .map_or_else(|| "unknown".to_string(), |a| a.to_string());
    // tiny_http adds the Upgrade/Connection headers itself on upgrade()
    let response = Response::empty(101).with_header(
        Header::from_bytes(&b"Sec-WebSocket-Accept"[..], accept.as_bytes())
            .expect("valid header"),
    );
    let stream = request.upgrade("websocket", response);
    let mut socket = WebSocket::from_raw_socket(stream, Role::Server, None);

    clients
        .lock()
        .expect("client table poisoned")
        .insert(id, peer.clone());
    info!(id, %peer, "WebSocket client connected");

    loop {
        match socket.read() {
            Ok(Message::Text(text)) => {
                info!("[WS-{id}] {text}");
                match parse_command(&text) {
                    Ok(task) => {
                        let queued =
                            json!({ "code": 200, "payload": { "reason": "Command queued" } });
                        if socket.send(Message::text(queued.to_string())).is_err() {
                            break;
                        }
                        let document = submit_and_wait(queue, task);
                        if socket.send(Message::text(document.to_string())).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(id, reason = error.reason(), "rejecting WS command");
                        let document = error_document(error);
                        if socket.send(Message::text(document.to_string())).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                if socket.send(Message::Pong(payload)).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    clients.lock().expect("client table poisoned").remove(&id);
    debug!(id, "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb100_engine::TaskKind;

    #[test]
    fn parse_command_accepts_request_with_arguments() {
        let task = parse_command(r#"{"request":"change-preset","arguments":["42"]}"#).unwrap();
        assert_eq!(task.kind, TaskKind::ChangePreset { slot: 42 });
    }

    #[test]
    fn parse_command_accepts_argumentless_requests() {
        let task = parse_command(r#"{"request":"list-presets"}"#).unwrap();
        assert_eq!(task.kind, TaskKind::ListPresets);
    }

    #[test]
    fn each_failure_shape_has_its_own_reason() {
        let cases: &[(&str, RequestError)] = &[
            ("{ not json", RequestError::InvalidJson),
            ("[1,2]", RequestError::NotJsonObject),
            ("{}", RequestError::InvalidRequest),
            (r#"{"request": 7}"#, RequestError::InvalidRequest),
            (
                r#"{"request":"init","arguments":"nope"}"#,
                RequestError::InvalidArguments,
            ),
            (
                r#"{"request":"init","arguments":[3]}"#,
                RequestError::InvalidArgument,
            ),
            (r#"{"request":"frobnicate"}"#, RequestError::InvalidCommand),
            (
                r#"{"request":"change-preset","arguments":["300"]}"#,
                RequestError::InvalidCommand,
            ),
        ];
        for (body, expected) in cases {
            assert_eq!(parse_command(body).unwrap_err(), *expected, "{body}");
        }
    }

    #[test]
    fn reason_strings_match_the_wire_contract() {
        assert_eq!(RequestError::InvalidJson.reason(), "Invalid JSON");
        assert_eq!(RequestError::NotJsonObject.reason(), "Not a JSON object");
        assert_eq!(RequestError::InvalidRequest.reason(), "Invalid request");
        assert_eq!(RequestError::InvalidArguments.reason(), "Invalid arguments");
        assert_eq!(
            RequestError::InvalidArgument.reason(),
            "Invalid argument (not a string)"
        );
        assert_eq!(RequestError::InvalidCommand.reason(), "Invalid command");
    }

    #[test]
    fn error_document_shape() {
        let doc = error_document(RequestError::InvalidCommand);
        assert_eq!(doc["code"], 400);
        assert_eq!(doc["payload"]["reason"], "Invalid command");
    }
}
