use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, info, warn};

use crate::bell::settings::{BellPatch, BellSound};
use crate::timer::queue::{QueueCommand, TimerSnapshot};

#[derive(Debug, Default)]
pub struct ApiSharedState {
    snapshot: Option<TimerSnapshot>,
    total_requests: u64,
    server_started_unix_ms: i64,
}

impl ApiSharedState {
    pub fn publish(&mut self, snapshot: TimerSnapshot) {
        self.snapshot = Some(snapshot);
    }

    pub fn snapshot(&self) -> Option<&TimerSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

pub struct ApiServer {
    pub state: Arc<Mutex<ApiSharedState>>,
    stop: Arc<AtomicBool>,
    http_join: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn start(config: ApiServerConfig, commands: Sender<QueueCommand>) -> Result<Self> {
        let bind = format!("{}:{}", config.bind_addr, config.port);
        let server = Server::http(&bind)
            .map_err(|err| anyhow::anyhow!("failed to start API server on {bind}: {err}"))?;
        info!(%bind, "local API listening");
        let state = Arc::new(Mutex::new(ApiSharedState {
            server_started_unix_ms: Local::now().timestamp_millis(),
            ..ApiSharedState::default()
        }));
        let stop = Arc::new(AtomicBool::new(false));
        let state_for_thread = Arc::clone(&state);
        let stop_for_thread = Arc::clone(&stop);
        let http_join = thread::spawn(move || {
            run_server_loop(server, state_for_thread, commands, stop_for_thread)
        });

        Ok(Self {
            state,
            stop,
            http_join: Some(http_join),
        })
    }

    pub fn publish(&self, snapshot: TimerSnapshot) {
        match self.state.lock() {
            Ok(mut guard) => guard.publish(snapshot),
            Err(_) => warn!("API state lock poisoned; snapshot dropped"),
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.http_join.take() {
            let _ = join.join();
        }
    }
}

fn run_server_loop(
    server: Server,
    state: Arc<Mutex<ApiSharedState>>,
    commands: Sender<QueueCommand>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => handle_request(request, &state, &commands),
            Ok(None) => continue,
            Err(_) => continue,
        }
    }
}

/// What a request resolves to, before any shared state is touched.
#[derive(Debug, Clone, PartialEq)]
enum Route {
    State,
    Health,
    Command(QueueCommand),
    BadRequest(String),
    MethodNotAllowed,
    NotFound,
}

fn route(method: &Method, path: &str, query: &str) -> Route {
    let command = match path {
        "/api/v1/state" | "/healthz" => {
            if method != &Method::Get {
                return Route::MethodNotAllowed;
            }
            return if path == "/healthz" {
                Route::Health
            } else {
                Route::State
            };
        }
        "/api/v1/toggle" => Ok(QueueCommand::Toggle),
        "/api/v1/stop" => Ok(QueueCommand::Stop),
        "/api/v1/next" => Ok(QueueCommand::Next),
        "/api/v1/prev" => Ok(QueueCommand::Prev),
        "/api/v1/select" => parse_select(query),
        "/api/v1/auto_advance" => parse_auto_advance(query),
        "/api/v1/bell" => parse_bell_patch(query).map(QueueCommand::PatchBell),
        "/api/v1/bell/test" => Ok(QueueCommand::TestBell),
        _ => return Route::NotFound,
    };
    if method != &Method::Post {
        return Route::MethodNotAllowed;
    }
    match command {
        Ok(command) => Route::Command(command),
        Err(reason) => Route::BadRequest(reason),
    }
}

fn parse_select(query: &str) -> Result<QueueCommand, String> {
    let raw = query_param(query, "index").ok_or("missing index parameter")?;
    raw.parse::<usize>()
        .map(QueueCommand::Select)
        .map_err(|_| format!("index must be a non-negative integer, got {raw:?}"))
}

fn parse_auto_advance(query: &str) -> Result<QueueCommand, String> {
    match query_param(query, "enabled") {
        None => Ok(QueueCommand::ToggleAutoAdvance),
        Some("true" | "1") => Ok(QueueCommand::SetAutoAdvance(true)),
        Some("false" | "0") => Ok(QueueCommand::SetAutoAdvance(false)),
        Some(other) => Err(format!("enabled must be true or false, got {other:?}")),
    }
}

/// Only the fields present in the query end up in the patch. The timer loop
/// merges it with whatever settings are live when the command is applied.
fn parse_bell_patch(query: &str) -> Result<BellPatch, String> {
    let mut patch = BellPatch::default();
    if let Some(raw) = query_param(query, "sound") {
        patch.sound =
            Some(BellSound::from_token(raw).ok_or_else(|| format!("unknown bell sound {raw:?}"))?);
    }
    if let Some(raw) = query_param(query, "repetitions") {
        patch.repetitions = Some(
            raw.parse()
                .map_err(|_| format!("repetitions must be an integer, got {raw:?}"))?,
        );
    }
    if let Some(raw) = query_param(query, "interval_ms") {
        patch.interval_ms = Some(
            raw.parse()
                .map_err(|_| format!("interval_ms must be an integer, got {raw:?}"))?,
        );
    }
    if patch.is_empty() {
        return Err("expected at least one of sound, repetitions, interval_ms".to_string());
    }
    patch.validate().map_err(|err| err.to_string())?;
    Ok(patch)
}

fn handle_request(
    request: tiny_http::Request,
    state: &Arc<Mutex<ApiSharedState>>,
    commands: &Sender<QueueCommand>,
) {
    let Some(remote_addr) = request.remote_addr() else {
        let _ = send_text(request, StatusCode(400), "missing remote address");
        return;
    };
    if !is_local_network_ip(remote_addr.ip()) {
        let _ = send_text(request, StatusCode(403), "forbidden: local network only");
        return;
    }

    let url = request.url().to_string();
    let (path, query) = split_path_query(&url);
    let method = request.method().clone();
    debug!(%method, path, "api request");

    let mut guard = match state.lock() {
        Ok(guard) => guard,
        Err(_) => {
            let _ = send_text(request, StatusCode(500), "internal state lock error");
            return;
        }
    };
    guard.total_requests = guard.total_requests.saturating_add(1);

    match route(&method, path, query) {
        Route::State => {
            #[derive(Serialize)]
            struct StateResponse<'a> {
                server_time_unix_ms: i64,
                server_started_unix_ms: i64,
                total_requests: u64,
                timer: Option<&'a TimerSnapshot>,
            }
            let payload = StateResponse {
                server_time_unix_ms: Local::now().timestamp_millis(),
                server_started_unix_ms: guard.server_started_unix_ms,
                total_requests: guard.total_requests(),
                timer: guard.snapshot(),
            };
            let _ = send_json(request, StatusCode(200), &payload);
        }
        Route::Health => {
            drop(guard);
            let _ = send_text(request, StatusCode(200), "ok");
        }
        Route::Command(command) => {
            drop(guard);
            #[derive(Serialize)]
            struct CommandResponse {
                accepted: bool,
                command: String,
            }
            let accepted = commands.send(command).is_ok();
            if !accepted {
                warn!(?command, "timer loop gone; command dropped");
            }
            let payload = CommandResponse {
                accepted,
                command: format!("{command:?}"),
            };
            let status = if accepted { 202 } else { 503 };
            let _ = send_json(request, StatusCode(status), &payload);
        }
        Route::BadRequest(reason) => {
            drop(guard);
            let _ = send_text(request, StatusCode(400), &reason);
        }
        Route::MethodNotAllowed => {
            drop(guard);
            let _ = send_text(request, StatusCode(405), "method not allowed");
        }
        Route::NotFound => {
            drop(guard);
            let _ = send_text(request, StatusCode(404), "not found");
        }
    }
}

fn send_json<T: Serialize>(
    request: tiny_http::Request,
    status: StatusCode,
    body: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    let content_type = Header::from_str("Content-Type: application/json; charset=utf-8")
        .map_err(|_| anyhow::anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_data(payload)
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn send_text(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    let content_type = Header::from_str("Content-Type: text/plain; charset=utf-8")
        .map_err(|_| anyhow::anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_string(body.to_string())
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn split_path_query(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        if k == key {
            return Some(v);
        }
    }
    None
}

fn is_local_network_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || is_ipv4_mapped_local(v6)
        }
    }
}

fn is_ipv4_mapped_local(v6: Ipv6Addr) -> bool {
    match v6.to_ipv4_mapped() {
        Some(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        None => false,
    }
}
