use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

/// Scripted stand-in for a benchmark agent: accepts job templates, walks
/// them to a terminal state after a couple of polls, and serves canned
/// measurements.
pub struct AgentHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
    pub state: Arc<AgentState>,
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

pub struct AgentState {
    next_id: AtomicU64,
    jobs: Mutex<HashMap<String, MockJob>>,
    events: Mutex<Vec<String>>,
    seed_measurements: Vec<Value>,
    seed_metadata: Vec<Value>,
}

struct MockJob {
    name: String,
    wait_for_exit: bool,
    fail: bool,
    stopped: bool,
    polls: u64,
    buffer: Vec<Value>,
}

impl AgentState {
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count_events(&self, needle: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| event.as_str() == needle)
            .count()
    }

    fn record(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub fn default_metadata() -> Vec<Value> {
    vec![json!({
        "name": "rps",
        "source": "load",
        "shortDescription": "Requests/sec",
        "format": "n0",
        "aggregate": "max",
        "reduce": "sum"
    })]
}

pub fn default_measurements() -> Vec<Value> {
    vec![
        json!({ "name": "rps", "timestamp": "", "value": 10 }),
        json!({ "name": "rps", "timestamp": "", "value": 30 }),
        json!({ "name": "rps", "timestamp": "", "value": 20 }),
    ]
}

/// Spawns the stub agent on an ephemeral port; returns its base URL.
pub fn spawn_agent(
    seed_measurements: Vec<Value>,
    seed_metadata: Vec<Value>,
) -> Result<(String, AgentHandle), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind stub agent failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("stub agent addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let state = Arc::new(AgentState {
        next_id: AtomicU64::new(1),
        jobs: Mutex::new(HashMap::new()),
        events: Mutex::new(Vec::new()),
        seed_measurements,
        seed_metadata,
    });

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let accept_state = state.clone();
    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            match listener.accept() {
                Ok((stream, _)) => {
                    let state = accept_state.clone();
                    thread::spawn(move || handle_client(stream, &state));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(_) => break,
            }
        }
    });

    Ok((
        format!("http://{}/", addr),
        AgentHandle {
            shutdown: shutdown_tx,
            thread: Some(handle),
            state,
        },
    ))
}

fn handle_client(mut stream: TcpStream, state: &AgentState) {
    let Some((method, path, body)) = read_request(&mut stream) else {
        return;
    };
    let (status, response) = route(state, &method, &path, &body);
    respond(&mut stream, status, &response);
}

fn read_request(stream: &mut TcpStream) -> Option<(String, String, Vec<u8>)> {
    let mut buffer: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let header_end;
    loop {
        let bytes = stream.read(&mut chunk).ok()?;
        if bytes == 0 {
            return None;
        }
        buffer.extend_from_slice(chunk.get(..bytes)?);
        if let Some(position) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            header_end = position;
            break;
        }
        if buffer.len() > 1024 * 1024 {
            return None;
        }
    }

    let header_text = std::str::from_utf8(buffer.get(..header_end)?).ok()?;
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_owned();
    let path = parts.next()?.to_owned();

    let mut content_length = 0usize;
    for line in lines {
        if let Some((key, value)) = line.split_once(':')
            && key.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }

    let body_start = header_end.checked_add(4)?;
    let mut body = buffer.get(body_start..).unwrap_or_default().to_vec();
    while body.len() < content_length {
        let bytes = stream.read(&mut chunk).ok()?;
        if bytes == 0 {
            break;
        }
        body.extend_from_slice(chunk.get(..bytes)?);
    }
    body.truncate(content_length);
    Some((method, path, body))
}

fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let text = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Bad Request",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        text,
        body.len(),
        body
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    let _flush_result = stream.flush();
    drop(stream.shutdown(Shutdown::Both));
}

fn route(state: &AgentState, method: &str, path: &str, body: &[u8]) -> (u16, String) {
    match (method, path) {
        ("GET", "/") => (200, "\"OK\"".to_owned()),
        ("GET", "/info") => (200, json!({ "os": "linux", "arch": "x64" }).to_string()),
        ("POST", "/jobs") => start_job(state, body),
        _ => {
            let Some(rest) = path.strip_prefix("/jobs/") else {
                return (404, String::new());
            };
            let (id, action) = match rest.split_once('/') {
                Some((id, action)) => (id.to_owned(), action.to_owned()),
                None => (rest.to_owned(), String::new()),
            };
            job_route(state, method, &id, &action)
        }
    }
}

fn start_job(state: &AgentState, body: &[u8]) -> (u16, String) {
    let template: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let name = template
        .get("service")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_owned();
    let wait_for_exit = template
        .get("waitForExit")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    // Jobs whose executable is "fail-bin" report Failed once polled.
    let fail = template.get("executable").and_then(Value::as_str) == Some("fail-bin");

    let id = state.next_id.fetch_add(1, Ordering::SeqCst).to_string();
    state.record(format!("start {}", name));
    if let Ok(mut jobs) = state.jobs.lock() {
        jobs.insert(
            id.clone(),
            MockJob {
                name,
                wait_for_exit,
                fail,
                stopped: false,
                polls: 0,
                buffer: state.seed_measurements.clone(),
            },
        );
    }
    (200, json!({ "id": id }).to_string())
}

fn job_route(state: &AgentState, method: &str, id: &str, action: &str) -> (u16, String) {
    let Ok(mut jobs) = state.jobs.lock() else {
        return (500, String::new());
    };
    let Some(job) = jobs.get_mut(id) else {
        return (404, String::new());
    };

    match (method, action) {
        ("GET", "state") => {
            job.polls = job.polls.saturating_add(1);
            (200, format!("\"{}\"", job_state(job)))
        }
        ("GET", "") => {
            job.polls = job.polls.saturating_add(1);
            let snapshot = json!({
                "state": job_state(job),
                "measurements": job.buffer,
                "metadata": state.seed_metadata,
            });
            (200, snapshot.to_string())
        }
        ("POST", "stop") => {
            job.stopped = true;
            state.record(format!("stop {}", job.name));
            (200, String::new())
        }
        ("POST", "resultsclear") => {
            job.buffer.clear();
            state.record(format!("clear {}", job.name));
            (200, String::new())
        }
        ("POST", "resultsflush") => {
            let last_delimiter = job
                .buffer
                .iter()
                .rposition(|entry| entry.get("isDelimiter") == Some(&Value::Bool(true)));
            if let Some(position) = last_delimiter {
                job.buffer.drain(..=position);
            }
            state.record(format!("flush {}", job.name));
            (200, String::new())
        }
        ("DELETE", "") => {
            state.record(format!("delete {}", job.name));
            jobs.remove(id);
            (200, String::new())
        }
        ("GET", "assets" | "trace") => (404, String::new()),
        _ => (404, String::new()),
    }
}

fn job_state(job: &MockJob) -> &'static str {
    if job.fail && job.polls >= 1 {
        "Failed"
    } else if job.stopped {
        "Stopped"
    } else if job.wait_for_exit && job.polls >= 2 {
        "Stopped"
    } else {
        "Running"
    }
}
