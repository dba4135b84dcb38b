//! JSON-RPC over HTTP: one message per `POST /mcp`.

use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use fleetsql_shared::{FleetSqlError, Result};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::protocol::McpServer;

/// Build the HTTP router for `server`.
pub fn build_router(server: McpServer) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler))
        .with_state(server)
}

#[instrument(name = "mcp_request", skip_all, fields(bytes = body.len()))]
async fn mcp_handler(State(server): State<McpServer>, body: String) -> Response {
    let start = Instant::now();
    let response = match server.handle_message(&body).await {
        Some(text) => ([(header::CONTENT_TYPE, "application/json")], text).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    info!(
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

/// Listen on `addr` until `shutdown` resolves. In-flight requests finish.
pub async fn serve_http(
    server: McpServer,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| FleetSqlError::Transport(format!("failed to listen on {addr:?}: {e}")))?;
    if let Ok(local) = listener.local_addr() {
        info!(addr = %format!("http://{local}/mcp"), "MCP handler listening");
    }
    axum::serve(listener, build_router(server))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| FleetSqlError::Transport(format!("failed to serve http: {e}")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use fleetsql_core::{QuerySurface, store_channel};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn requests_are_logged_with_status() {
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (_publisher, handle) = store_channel();
        let server = McpServer::new(QuerySurface::new(handle));

        let ping = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_string();
        let response = mcp_handler(State(server.clone()), ping).await;
        assert_eq!(response.status(), StatusCode::OK);

        let note = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string();
        let response = mcp_handler(State(server), note).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let text = logs.text();
        assert!(text.contains("mcp_request"), "{text}");
        assert!(text.contains("request handled"), "{text}");
        assert!(text.contains("status=200"), "{text}");
        assert!(text.contains("status=202"), "{text}");
    }
}
