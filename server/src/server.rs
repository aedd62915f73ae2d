//! Request loop
//!
//! Reads newline-delimited JSON-RPC from stdin, dispatches each request on
//! its own task with a fresh cancellation token, and funnels responses
//! through a single writer task. `$/cancelRequest` notifications are
//! handled inline so they can reach requests that are still running.

use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::protocol::{JsonRpcError, JsonRpcResponse};
use crate::requests::CancelParams;
use crate::transport::{self, ReadOutcome};

/// The Atomgraph JSON-RPC server
pub struct Server {
    backend: Arc<Backend>,
}

impl Server {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Serve until stdin reaches EOF
    pub async fn run(&self) -> io::Result<()> {
        let (mut reader, mut writer) = transport::stdio();
        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(64);

        let writer_task = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                if let Err(e) = writer.write_response(&response).await {
                    tracing::error!("failed to write response: {}", e);
                    break;
                }
            }
        });

        loop {
            let request = match reader.read_request().await? {
                ReadOutcome::Eof => break,
                ReadOutcome::Malformed(message) => {
                    let _ = tx
                        .send(JsonRpcResponse::error(
                            None,
                            JsonRpcError::parse_error(message),
                        ))
                        .await;
                    continue;
                }
                ReadOutcome::Request(request) => request,
            };

            if request.method == "$/cancelRequest" {
                self.handle_cancel(request.params);
                continue;
            }

            if request.is_notification() {
                tracing::warn!(method = %request.method, "ignoring unknown notification");
                continue;
            }

            let Some(id) = request.id else {
                continue;
            };
            let method = request.method;
            let params = request.params;
            let key = id.to_string();
            let token = self.backend.register_request(key.clone());

            let backend = Arc::clone(&self.backend);
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = backend.dispatch(&method, params, &token).await;
                backend.finish_request(&key);

                let response = match outcome {
                    Ok(result) => JsonRpcResponse::success(Some(id), result),
                    Err(e) => {
                        tracing::debug!(%method, error = %e, "request failed");
                        JsonRpcResponse::error(Some(id), e.into())
                    }
                };
                let _ = tx.send(response).await;
            });
        }

        drop(tx);
        let _ = writer_task.await;
        Ok(())
    }

    fn handle_cancel(&self, params: Option<serde_json::Value>) {
        let Some(params) = params else {
            tracing::warn!("$/cancelRequest without params");
            return;
        };
        match serde_json::from_value::<CancelParams>(params) {
            Ok(cancel) => {
                let key = cancel.id.to_string();
                if !self.backend.cancel_request(&key) {
                    tracing::debug!(request = %key, "cancel for unknown or finished request");
                }
            }
            Err(e) => tracing::warn!("malformed $/cancelRequest params: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomgraph_engine::FusionConfig;
    use std::time::Duration;

    fn server() -> Server {
        Server::new(Backend::new(
            None,
            Duration::from_secs(1),
            FusionConfig::default(),
            10,
        ))
    }

    #[test]
    fn test_cancel_unknown_request_is_harmless() {
        let server = server();
        server.handle_cancel(Some(serde_json::json!({"id": 42})));
        server.handle_cancel(Some(serde_json::json!({"bogus": true})));
        server.handle_cancel(None);
    }

    #[tokio::test]
    async fn test_cancel_reaches_registered_request() {
        let server = server();
        let token = server.backend().register_request("9".to_string());

        server.handle_cancel(Some(serde_json::json!({"id": 9})));
        assert!(token.is_cancelled());
    }
}
