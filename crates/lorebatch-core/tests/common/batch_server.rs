//! Minimal HTTP/1.1 Message Batches server for integration tests.
//!
//! Accepts batch creation, answers status polls (first poll of each batch is
//! `in_progress`, later polls `ended`) and serves JSONL results. Items named in
//! `failing_items` error unless their request id carries the retry suffix.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const API_KEY: &str = "test-key";
const BATCHES: &str = "/v1/messages/batches";

#[derive(Debug, Default)]
pub struct ServerState {
    /// Submitted request ids, indexed by batch number.
    pub batches: Vec<Vec<String>>,
    pub polls: HashMap<String, u32>,
    pub failing_items: HashSet<String>,
    /// Remaining create calls to answer with 529 before accepting.
    pub overloaded_creates: u32,
}

pub struct BatchServer {
    pub base_url: String,
    pub state: Arc<Mutex<ServerState>>,
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(failing_items: &[&str]) -> BatchServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{}/", port);
    let state = Arc::new(Mutex::new(ServerState {
        failing_items: failing_items.iter().map(|s| s.to_string()).collect(),
        ..ServerState::default()
    }));
    let shared = Arc::clone(&state);
    let base = base_url.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = Arc::clone(&shared);
            let base = base.clone();
            thread::spawn(move || handle(stream, &shared, &base));
        }
    });
    BatchServer { base_url, state }
}

struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..header_end]).ok()?;
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    if headers
        .get("expect")
        .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    {
        stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").ok()?;
    }

    let len: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn respond_json(stream: &mut TcpStream, status: &str, value: &Value) {
    respond(stream, status, "application/json", value.to_string().as_bytes());
}

fn handle(mut stream: TcpStream, state: &Mutex<ServerState>, base_url: &str) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };

    if request.headers.get("x-api-key").map(String::as_str) != Some(API_KEY) {
        respond_json(
            &mut stream,
            "401 Unauthorized",
            &json!({"type": "error", "error": {"type": "authentication_error"}}),
        );
        return;
    }

    let mut state = state.lock().unwrap();
    let tail = request.path.strip_prefix(BATCHES).unwrap_or("");
    let segments: Vec<&str> = tail.split('/').filter(|s| !s.is_empty()).collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("POST", []) if request.path.starts_with(BATCHES) => {
            if state.overloaded_creates > 0 {
                state.overloaded_creates -= 1;
                respond_json(
                    &mut stream,
                    "529 Overloaded",
                    &json!({"type": "error", "error": {"type": "overloaded_error"}}),
                );
                return;
            }
            let parsed: Value = match serde_json::from_slice(&request.body) {
                Ok(v) => v,
                Err(_) => {
                    respond_json(&mut stream, "400 Bad Request", &json!({"type": "error"}));
                    return;
                }
            };
            let ids: Vec<String> = parsed["requests"]
                .as_array()
                .map(|reqs| {
                    reqs.iter()
                        .filter_map(|r| r["custom_id"].as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            let id = format!("msgbatch_{:02}", state.batches.len());
            let count = ids.len();
            state.batches.push(ids);
            respond_json(
                &mut stream,
                "200 OK",
                &json!({
                    "id": id,
                    "type": "message_batch",
                    "processing_status": "in_progress",
                    "request_counts": counts(count, 0),
                    "results_url": null
                }),
            );
        }
        ("GET", [id]) => {
            let Some(index) = batch_index(&state, id) else {
                respond_json(&mut stream, "404 Not Found", &json!({"type": "error"}));
                return;
            };
            let polls = state.polls.entry(id.to_string()).or_insert(0);
            *polls += 1;
            let ended = *polls > 1;
            let count = state.batches[index].len();
            let body = if ended {
                json!({
                    "id": id,
                    "processing_status": "ended",
                    "request_counts": counts(0, count),
                    "results_url": format!("{}v1/messages/batches/{}/results", base_url, id)
                })
            } else {
                json!({
                    "id": id,
                    "processing_status": "in_progress",
                    "request_counts": counts(count, 0),
                    "results_url": null
                })
            };
            respond_json(&mut stream, "200 OK", &body);
        }
        ("GET", [id, "results"]) => {
            let Some(index) = batch_index(&state, id) else {
                respond_json(&mut stream, "404 Not Found", &json!({"type": "error"}));
                return;
            };
            let mut jsonl = String::new();
            for custom_id in &state.batches[index] {
                let item = custom_id.strip_prefix("storyline-").unwrap_or(custom_id);
                let line = if state.failing_items.contains(item) {
                    json!({
                        "custom_id": custom_id,
                        "result": {
                            "type": "errored",
                            "error": {"type": "error", "error": {"type": "overloaded_error"}}
                        }
                    })
                } else {
                    json!({
                        "custom_id": custom_id,
                        "result": {
                            "type": "succeeded",
                            "message": {
                                "content": [{"type": "text", "text": format!("story for {item}")}]
                            }
                        }
                    })
                };
                jsonl.push_str(&line.to_string());
                jsonl.push('\n');
            }
            respond(&mut stream, "200 OK", "application/binary", jsonl.as_bytes());
        }
        _ => respond_json(&mut stream, "405 Method Not Allowed", &json!({"type": "error"})),
    }
}

fn counts(processing: usize, succeeded: usize) -> Value {
    json!({
        "processing": processing,
        "succeeded": succeeded,
        "errored": 0,
        "canceled": 0,
        "expired": 0
    })
}

fn batch_index(state: &ServerState, id: &str) -> Option<usize> {
    let index: usize = id.strip_prefix("msgbatch_")?.parse().ok()?;
    (index < state.batches.len()).then_some(index)
}
