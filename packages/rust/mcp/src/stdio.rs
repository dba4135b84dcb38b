//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Each request is handled on its own task; responses go through a single
//! writer task so lines never interleave.

use std::future::Future;

use fleetsql_shared::{FleetSqlError, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::protocol::McpServer;

/// Serve on the process's stdin/stdout until EOF or `shutdown` resolves.
pub async fn serve_stdio(server: McpServer, shutdown: impl Future<Output = ()>) -> Result<()> {
    info!("serving MCP over stdio");
    serve_lines(server, tokio::io::stdin(), tokio::io::stdout(), shutdown).await
}

/// Serve newline-delimited messages read from `reader`, writing responses to
/// `writer`. Requests already in flight finish before this returns.
pub async fn serve_lines<R, W>(
    server: McpServer,
    reader: R,
    writer: W,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(write_lines(writer, rx));

    let mut lines = BufReader::new(reader).lines();
    let mut in_flight = JoinSet::new();
    tokio::pin!(shutdown);

    let read_result = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, closing stdio transport");
                break Ok(());
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let server = server.clone();
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        if let Some(response) = server.handle_message(&line).await {
                            // The writer only goes away once every sender is dropped.
                            let _ = tx.send(response);
                        }
                    });
                }
                Ok(None) => {
                    debug!("stdin closed");
                    break Ok(());
                }
                Err(e) => break Err(FleetSqlError::Transport(format!("reading stdin: {e}"))),
            }
        }
    };

    while in_flight.join_next().await.is_some() {}
    drop(tx);

    let write_result = writer_task
        .await
        .map_err(|e| FleetSqlError::Task(e.to_string()))?;
    read_result?;
    write_result
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| FleetSqlError::Transport(format!("writing stdout: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| FleetSqlError::Transport(format!("flushing stdout: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsql_core::{QuerySurface, store_channel};
    use serde_json::{Value, json};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn answers_each_request_on_its_own_line() {
        let (_publisher, handle) = store_channel();
        let server = McpServer::new(QuerySurface::new(handle));

        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}),
        ]
        .iter()
        .map(|v| v.to_string() + "\n")
        .collect::<String>();

        let (writer, mut output) = tokio::io::duplex(64 * 1024);
        serve_lines(server, input.as_bytes(), writer, std::future::pending())
            .await
            .unwrap();

        let mut text = String::new();
        output.read_to_string(&mut text).await.unwrap();
        let mut ids: Vec<i64> = text
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["id"].as_i64().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let (_publisher, handle) = store_channel();
        let server = McpServer::new(QuerySurface::new(handle));
        // A reader that never yields a line.
        let (_keep_open, reader) = tokio::io::duplex(64);
        let (writer, _output) = tokio::io::duplex(64);
        serve_lines(server, reader, writer, async {}).await.unwrap();
    }
}
