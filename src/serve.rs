//! HTTP server for the backport board
//!
//! `backboard serve` → loads the snapshot, starts the refresh loop, serves the board

use crate::board::{BoardQuery, BoardView};
use crate::error::BoardError;
use crate::registry::{Registry, Shutdown};
use crate::report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Shared by every worker
#[derive(Debug)]
pub struct ServeState {
    pub registry: Arc<Registry>,
    pub default_branch: Option<String>,
}

/// A response, independent of the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Set for redirects
    pub location: Option<String>,
}

impl Reply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
            location: None,
        }
    }

    fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
            location: None,
        }
    }

    fn json<T: Serialize>(status: u16, payload: &ApiResponse<T>) -> Self {
        let body = serde_json::to_string(payload).unwrap_or_else(|e| {
            format!(r#"{{"ok":false,"data":null,"error":"serialization failed: {}"}}"#, e)
        });
        Self {
            status,
            content_type: "application/json",
            body,
            location: None,
        }
    }

    fn redirect(to: &str) -> Self {
        Self {
            status: 308,
            content_type: "text/plain; charset=utf-8",
            body: String::new(),
            location: Some(to.to_string()),
        }
    }
}

/// Raw query string; every value is optional and empty means absent
#[derive(Debug, Default, Deserialize)]
struct RawQuery {
    repo: Option<String>,
    branch: Option<String>,
    author: Option<String>,
    label: Option<String>,
    ready: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_query(query: &str) -> Result<(BoardQuery, bool), String> {
    let raw: RawQuery =
        serde_urlencoded::from_str(query).map_err(|e| format!("invalid query string: {}", e))?;
    let repo = match non_empty(raw.repo) {
        Some(id) => Some(
            id.trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid repository id {:?}", id))?,
        ),
        None => None,
    };
    let ready = non_empty(raw.ready).is_some_and(|v| v != "0" && v != "false");
    Ok((
        BoardQuery {
            repo,
            branch: non_empty(raw.branch),
            author: non_empty(raw.author),
            label: non_empty(raw.label),
        },
        ready,
    ))
}

fn error_status(err: &BoardError) -> u16 {
    if err.is_user_error() {
        400
    } else {
        500
    }
}

/// Map a request onto a reply.
pub fn route(state: &ServeState, method: &Method, url: &str) -> Reply {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));

    if *method != Method::Get && *method != Method::Head {
        return Reply::text(405, "Method not allowed");
    }

    let (board_query, ready) = match parse_query(query) {
        Ok(parsed) => parsed,
        Err(e) => {
            return match path {
                "/api/board" => Reply::json(400, &ApiResponse::<()>::failure(e)),
                _ => Reply::text(400, e),
            }
        }
    };

    match path {
        "/healthz" => {
            if ready && !state.registry.is_ready() {
                Reply::text(503, "Bootstrapping")
            } else {
                Reply::text(200, "OK")
            }
        }

        "/" => {
            if !state.registry.is_ready() {
                return Reply::text(503, "Bootstrapping");
            }
            match board(state, &board_query) {
                Ok(view) => Reply::html(200, report::html::render(&view)),
                Err(e) => Reply::text(error_status(&e), e.to_string()),
            }
        }

        "/api/board" => {
            if !state.registry.is_ready() {
                return Reply::json(503, &ApiResponse::<()>::failure("Bootstrapping"));
            }
            match board(state, &board_query) {
                Ok(view) => Reply::json(200, &ApiResponse::success(view)),
                Err(e) => Reply::json(error_status(&e), &ApiResponse::<()>::failure(e.to_string())),
            }
        }

        _ => Reply::redirect("/"),
    }
}

fn board(state: &ServeState, query: &BoardQuery) -> crate::error::Result<BoardView> {
    state.registry.board(query, state.default_branch.as_deref())
}

fn respond(state: &ServeState, request: Request) -> std::io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();
    let reply = route(state, &method, &url);
    debug!(%method, %url, status = reply.status, "request");

    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        response = response.with_header(header);
    }
    if let Some(location) = reply.location {
        if let Ok(header) = Header::from_bytes(&b"Location"[..], location.as_bytes()) {
            response = response.with_header(header);
        }
    }
    request.respond(response)
}

/// Serve requests on `bind` with `workers` threads until `shutdown` fires.
pub fn run(state: ServeState, bind: &str, workers: usize, shutdown: Arc<Shutdown>) -> std::io::Result<()> {
    let server = Server::http(bind).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let server = Arc::new(server);
    let state = Arc::new(state);
    let workers = workers.max(1);

    info!(bind, workers, "board server listening");
    eprintln!("\n\x1b[1;32mbackboard\x1b[0m");
    eprintln!("   Board: http://{}", bind);
    eprintln!("   Press Ctrl+C to stop\n");

    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name(format!("backboard-http-{}", i))
                .spawn(move || {
                    while !shutdown.is_triggered() {
                        match server.recv() {
                            Ok(request) => {
                                if let Err(e) = respond(&state, request) {
                                    warn!(error = %e, "failed to write response");
                                }
                            }
                            Err(_) if shutdown.is_triggered() => break,
                            Err(e) => {
                                warn!(error = %e, "failed to accept request");
                                break;
                            }
                        }
                    }
                })
        })
        .collect::<std::io::Result<_>>()?;

    // Wake the workers once shutdown fires.
    {
        let server = Arc::clone(&server);
        let shutdown = Arc::clone(&shutdown);
        let count = handles.len();
        thread::Builder::new()
            .name("backboard-http-stop".to_string())
            .spawn(move || {
                while !shutdown.wait_timeout(std::time::Duration::from_secs(3600)) {}
                for _ in 0..count {
                    server.unblock();
                }
            })?;
    }

    for handle in handles {
        if handle.join().is_err() {
            warn!("server worker panicked");
        }
    }
    info!("board server stopped");
    Ok(())
}
