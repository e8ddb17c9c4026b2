//! Development server with live reload via Server-Sent Events.
//!
//! Serves the output directory straight from disk, injects the reload client
//! into every HTML page and forwards [`ReloadEvent`](crate::reload::ReloadEvent)s
//! from the build to connected browsers.

pub mod tunnel;

use crate::build::{BuildContext, TaskError};
use crate::reload::ReloadHub;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Redirect, Response, Sse,
    },
    routing::get,
    Router,
};
use futures::{future, Stream, StreamExt};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;

const SSE_PATH: &str = "/__sluice_sse__";
const CLIENT_PATH: &str = "/__sluice_reload__.js";
const CLIENT_TAG: &str = r#"<script src="/__sluice_reload__.js" async></script>"#;
const CLIENT_SCRIPT: &str = include_str!("../../assets/livereload.js");

#[derive(Debug, Clone)]
struct ServerState {
    root: PathBuf,
    hub: ReloadHub,
    show_notice: bool,
    closing: watch::Receiver<bool>,
}

/// A bound, not yet serving, development server.
#[derive(Debug)]
pub struct DevServer {
    ctx: BuildContext,
    listener: TcpListener,
    addr: SocketAddr,
}

impl DevServer {
    /// Bind the configured host and port.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Server`] when the address is unavailable.
    pub async fn bind(ctx: BuildContext) -> Result<Self, TaskError> {
        let server = &ctx.config().server;
        let listener = TcpListener::bind((server.host.as_str(), server.port))
            .await
            .map_err(|e| TaskError::Server(format!("cannot bind {}:{}: {}", server.host, server.port, e)))?;
        let addr = listener.local_addr().map_err(|e| TaskError::Server(e.to_string()))?;
        Ok(Self { ctx, listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Serve until `shutdown` resolves, then close open event streams and
    /// drain connections.
    pub async fn serve<S>(self, shutdown: S) -> Result<(), TaskError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let (closing_tx, closing) = watch::channel(false);
        let root = self.ctx.serve_root();
        let state = ServerState {
            root: root.clone(),
            hub: self.ctx.reload().clone(),
            show_notice: self.ctx.config().server.notify,
            closing,
        };

        println!("Serving {} at {}", root.display(), self.url());

        let tunnel = self.ctx.config().server.tunnel.clone().map(|subdomain| {
            let host = self.ctx.config().server.tunnel_host.clone();
            let local = loopback(self.addr);
            tokio::spawn(async move {
                if let Err(e) = tunnel::open(&host, &subdomain, local).await {
                    tracing::warn!("tunnel unavailable: {}", e);
                }
            })
        });

        let served = axum::serve(self.listener, router(state))
            .with_graceful_shutdown(async move {
                shutdown.await;
                closing_tx.send_replace(true);
            })
            .await
            .map_err(|e| TaskError::Server(e.to_string()));

        if let Some(handle) = tunnel {
            handle.abort();
        }
        tracing::info!("dev server stopped");
        served
    }
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route(SSE_PATH, get(handle_sse))
        .route(CLIENT_PATH, get(handle_client))
        .fallback(handle_request)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_sse(State(state): State<ServerState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.hub.subscribe();
    tracing::debug!("browser connected ({} listening)", state.hub.subscriber_count());

    let stream = BroadcastStream::new(rx)
        .filter_map(|msg| future::ready(msg.ok().map(|event| Ok(Event::default().data(event.to_json())))))
        .take_until(closed(state.closing));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

async fn closed(mut closing: watch::Receiver<bool>) {
    loop {
        let done = *closing.borrow_and_update();
        if done || closing.changed().await.is_err() {
            break;
        }
    }
}

async fn handle_client(State(state): State<ServerState>) -> impl IntoResponse {
    let script = CLIENT_SCRIPT.replace("__SLUICE_NOTIFY__", if state.show_notice { "true" } else { "false" });
    ([(header::CONTENT_TYPE, "application/javascript"), (header::CACHE_CONTROL, "no-cache")], script)
}

async fn handle_request(State(state): State<ServerState>, uri: Uri) -> Response {
    let path = uri.path();
    let Some(relative) = request_path(path) else {
        return (StatusCode::BAD_REQUEST, format!("Invalid path: {}", path)).into_response();
    };

    let mut file = state.root.join(relative);
    if tokio::fs::metadata(&file).await.map(|m| m.is_dir()).unwrap_or(false) {
        if !path.ends_with('/') {
            return Redirect::permanent(&format!("{}/", path)).into_response();
        }
        file.push("index.html");
    }

    match tokio::fs::read(&file).await {
        Ok(content) => {
            let content_type = content_type(&file);
            let body = if content_type.starts_with("text/html") { inject_client(&content) } else { content };
            ([(header::CONTENT_TYPE, content_type), (header::CACHE_CONTROL, "no-cache")], body).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, format!("Cannot GET {}", path)).into_response()
        }
        Err(e) => {
            tracing::warn!("failed to read {}: {}", file.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Decode a request path into a path relative to the served root.
///
/// Returns `None` for paths that would escape the root.
fn request_path(path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let mut relative = PathBuf::new();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(relative)
}

/// Add the reload client before the closing `</body>`, or at the end.
fn inject_client(content: &[u8]) -> Vec<u8> {
    let html = String::from_utf8_lossy(content);
    let mut result = String::with_capacity(html.len() + CLIENT_TAG.len() + 2);
    match html.rfind("</body>") {
        Some(pos) => {
            result.push_str(&html[..pos]);
            result.push_str(CLIENT_TAG);
            result.push('\n');
            result.push_str(&html[pos..]);
        }
        None => {
            result.push_str(&html);
            result.push('\n');
            result.push_str(CLIENT_TAG);
        }
    }
    result.into_bytes()
}

fn content_type(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("").to_ascii_lowercase();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Address the tunnel should forward to; wildcard binds map to loopback.
fn loopback(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        SocketAddr::from((Ipv4Addr::LOCALHOST, addr.port()))
    } else {
        addr
    }
}
