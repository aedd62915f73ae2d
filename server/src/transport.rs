//! Stdio transport
//!
//! Newline-delimited JSON-RPC 2.0 over stdin/stdout, split into a reader
//! and a writer half so requests can be answered out of order while the
//! read loop keeps accepting cancellations. Logging goes to stderr so
//! stdout stays a clean protocol channel.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Reader half of the stdio transport
pub struct RequestReader {
    stdin: BufReader<tokio::io::Stdin>,
}

/// Writer half of the stdio transport
pub struct ResponseWriter {
    stdout: tokio::io::Stdout,
}

/// Open both halves over the process stdio
pub fn stdio() -> (RequestReader, ResponseWriter) {
    (
        RequestReader {
            stdin: BufReader::new(tokio::io::stdin()),
        },
        ResponseWriter {
            stdout: tokio::io::stdout(),
        },
    )
}

/// Outcome of one read attempt
pub enum ReadOutcome {
    Request(JsonRpcRequest),
    /// Line was not valid JSON-RPC; the connection stays usable
    Malformed(String),
    /// End of input
    Eof,
}

impl RequestReader {
    /// Read the next request, skipping blank lines
    pub async fn read_request(&mut self) -> io::Result<ReadOutcome> {
        loop {
            let mut line = String::new();
            let bytes_read = self.stdin.read_line(&mut line).await?;

            if bytes_read == 0 {
                return Ok(ReadOutcome::Eof);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return match serde_json::from_str(line) {
                Ok(request) => Ok(ReadOutcome::Request(request)),
                Err(e) => {
                    tracing::error!("failed to parse JSON-RPC request: {}", e);
                    Ok(ReadOutcome::Malformed(e.to_string()))
                }
            };
        }
    }
}

impl ResponseWriter {
    /// Write a response followed by a newline
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)?;
        self.stdout.write_all(json.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await
    }
}
