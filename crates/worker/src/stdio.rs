//! Line-oriented stdio transport for the worker host.

use anyhow::Result;
use http::Method;
use serde::Serialize;
use shield_client::{canonicalize, resolve};
use shield_core::Request;
use shield_worker::{Registration, ResponseSource, ServiceWorker};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use url::Url;

/// One handled request, as written to stdout.
#[derive(Debug, Serialize)]
struct HandledRequest {
    method: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ResponseSource>,
    bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Parse `[METHOD] URL`, where URL is absolute or a path on `origin`.
fn parse_request_line(line: &str, origin: &Url) -> Result<Request> {
    let mut parts = line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method.to_ascii_uppercase().parse::<Method>()?, target),
        (Some(target), None) => (Method::GET, target),
        _ => anyhow::bail!("empty request line"),
    };
    if parts.next().is_some() {
        anyhow::bail!("expected `METHOD URL`, got {line:?}");
    }

    let url = if target.starts_with('/') { resolve(origin, target)? } else { canonicalize(target)? };
    Ok(Request::new(method, url))
}

/// Read request lines until EOF, handling each concurrently.
pub async fn serve(registration: Registration, worker: ServiceWorker) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let request = match parse_request_line(line, worker.origin()) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping malformed request line");
                continue;
            }
        };

        let registration = registration.clone();
        let worker = worker.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            let mut record = HandledRequest {
                method: request.method.to_string(),
                url: request.url.to_string(),
                status: None,
                source: None,
                bytes: 0,
                error: None,
            };
            match registration.dispatch(&worker, &request).await {
                Ok(dispatched) => {
                    record.status = Some(dispatched.response.status.as_u16());
                    record.source = Some(dispatched.source);
                    record.bytes = dispatched.response.body.len();
                }
                Err(e) => record.error = Some(e.to_string()),
            }
            match serde_json::to_string(&record) {
                Ok(json) => {
                    let _ = tx.send(json);
                }
                Err(e) => tracing::error!(error = %e, "failed to encode result"),
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "request task failed");
        }
    }

    drop(tx);
    writer.await??;

    Ok(())
}
