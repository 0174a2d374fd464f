//! Scripted HTTP listener standing in for the Compute Engine endpoint.
//!
//! Each accepted connection receives the next scripted response and is then
//! closed, so every client request lands on a fresh connection.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// A request as seen by the stub.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub authorization: Option<String>,
    pub content_length: Option<String>,
    pub body: String,
}

pub struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    /// Starts a listener that answers with `responses` in order.
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        let address = listener.local_addr().expect("stub address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                serve(stream, status, &body, &recorded);
            }
        });

        Self {
            base_url: format!("http://{address}/compute/v1"),
            requests,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

fn serve(stream: TcpStream, status: u16, body: &str, recorded: &Mutex<Vec<RecordedRequest>>) {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let target = parts.next().unwrap_or_default().to_owned();

    let mut content_length = None;
    let mut authorization = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).is_err() {
            return;
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let trimmed = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = Some(trimmed.to_owned());
            } else if name.eq_ignore_ascii_case("authorization") {
                authorization = Some(trimmed.to_owned());
            }
        }
    }

    let length = content_length
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0usize);
    let mut payload = vec![0u8; length];
    if reader.read_exact(&mut payload).is_err() {
        return;
    }
    recorded.lock().expect("requests lock").push(RecordedRequest {
        method,
        target,
        authorization,
        content_length,
        body: String::from_utf8_lossy(&payload).into_owned(),
    });

    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        reason(status),
        body.len()
    );
    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).ok();
    stream.flush().ok();
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// JSON for an operation in `status` with `progress`.
pub fn operation_json(name: &str, status: &str, progress: u32) -> String {
    format!(
        r#"{{"kind":"compute#operation","name":"{name}","status":"{status}","progress":{progress}}}"#
    )
}
