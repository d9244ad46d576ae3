// SPDX-License-Identifier: GPL-3.0-only
//! Unix socket between the CLI and the daemon
//!
//! One JSON request line per connection, answered with one JSON response
//! line.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::error::AppError;
use crate::service::{Request, Response, ServiceHandle};

/// Accept connections until the listener fails
pub async fn serve(path: &Path, handle: ServiceHandle) -> Result<()> {
    if path.exists() {
        // Left over from a previous run; a live daemon would still answer
        if UnixStream::connect(path).await.is_ok() {
            anyhow::bail!("another daemon is already listening on {}", path.display());
        }
        std::fs::remove_file(path)
            .with_context(|| format!("can't remove stale socket {}", path.display()))?;
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("can't bind {}", path.display()))?;
    info!("Listening on {}", path.display());

    loop {
        let (stream, _) = listener.accept().await.context("accept failed")?;
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, handle).await {
                warn!("Client connection failed: {:#}", e);
            }
        });
    }
}

async fn serve_connection(stream: UnixStream, handle: ServiceHandle) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut line = String::new();
    BufReader::new(reader)
        .read_line(&mut line)
        .await
        .map_err(AppError::from)?;

    let request: Request = serde_json::from_str(line.trim()).map_err(AppError::from)?;
    debug!(?request, "Client request");

    let response = handle
        .request(request)
        .await
        .ok_or_else(|| AppError::Ipc("brightness service stopped".to_string()))?;

    let mut payload = serde_json::to_string(&response).map_err(AppError::from)?;
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(AppError::from)?;
    writer.shutdown().await.map_err(AppError::from)?;
    Ok(())
}

/// Send `request` to the daemon listening on `path`
pub async fn send(path: &Path, request: &Request) -> Result<Response> {
    let stream = UnixStream::connect(path)
        .await
        .with_context(|| format!("no daemon listening on {}", path.display()))?;
    let (reader, mut writer) = stream.into_split();

    let mut payload = serde_json::to_string(request)?;
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await?;

    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).await?;
    if line.trim().is_empty() {
        let reason = "daemon closed the connection without answering".to_string();
        return Err(AppError::Ipc(reason).into());
    }

    Ok(serde_json::from_str(line.trim())?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::BoxFuture;

    use super::*;
    use crate::config::Config;
    use crate::monitor::{Display, TopologySource};
    use crate::process::testing::RecordingRunner;
    use crate::service::BrightnessService;
    use crate::window_manager::NoWindowManager;

    struct OnePanel;

    impl TopologySource for OnePanel {
        fn displays(&self) -> BoxFuture<'static, Vec<Display>> {
            Box::pin(async {
                vec![Display {
                    name: "eDP-1".to_string(),
                    model: String::new(),
                    serial: String::new(),
                }]
            })
        }
    }

    #[tokio::test]
    async fn test_round_trip_over_socket() {
        let runner = Arc::new(RecordingRunner::new());
        runner.set_output(r#"sh -c "$0" g; "$0" m brightnessctl"#, "40\n100\n");
        let service = BrightnessService::new(
            &Config::default(),
            runner,
            Arc::new(NoWindowManager),
            Arc::new(OnePanel),
        );
        let handle = service.handle();
        tokio::spawn(service.run());

        let path = std::env::temp_dir().join(format!("mbc-ipc-{}.sock", std::process::id()));
        let server_path = path.clone();
        tokio::spawn(async move { serve(&server_path, handle).await });

        let request = Request::Get {
            query: "eDP-1".to_string(),
        };
        let mut response = None;
        for _ in 0..100 {
            if let Ok(Response::Brightness(value)) = send(&path, &request).await {
                if value > 0.0 {
                    response = Some(value);
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let _ = std::fs::remove_file(&path);

        assert_eq!(response, Some(0.4));
    }
}
