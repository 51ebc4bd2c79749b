//! Request transport for chat turns.
//!
//! [`ChatTransport`] is the seam between the session store and the network:
//! it sends one turn and hands back the raw response body as a byte stream.
//! [`HttpTransport`] is the production implementation (multipart POST via
//! reqwest); tests substitute scripted streams.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use parley_types::Message;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;

/// Response body of an accepted turn.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The response body broke off after the headers were accepted.
    #[error("connection interrupted: {0}")]
    Interrupted(String),
}

/// A binary part of the request, named `file_<index>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Everything the producer needs for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    /// The new user text.
    pub message: String,
    /// Messages that preceded this turn, oldest first.
    pub history: Vec<Message>,
    pub files: Vec<FilePart>,
}

impl TurnRequest {
    /// The `messages` form field.
    pub fn history_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.history)
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue the request. Resolves once response headers are in; a non-2xx
    /// status is an error and no body is returned.
    async fn open(&self, request: TurnRequest) -> Result<ByteStream, TransportError>;
}

/// Multipart-over-HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    fn form(request: TurnRequest) -> Result<Form, TransportError> {
        let mut form = Form::new()
            .text("message", request.message.clone())
            .text("messages", request.history_json()?);

        for file in request.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime_type)?;
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: TurnRequest) -> Result<ByteStream, TransportError> {
        debug!(
            endpoint = %self.endpoint,
            history_len = request.history.len(),
            files = request.files.len(),
            "opening chat stream"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(Self::form(request)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Interrupted(e.to_string())))
            .boxed())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use parley_types::Role;

    #[test]
    fn history_json_is_a_message_array() {
        let req = TurnRequest {
            message: "next".into(),
            history: vec![Message::user("first", vec![])],
            files: vec![],
        };
        let value: serde_json::Value = serde_json::from_str(&req.history_json().unwrap()).unwrap();
        assert_eq!(value[0]["role"], Role::User.as_str());
        assert_eq!(value[0]["content"], "first");
    }

    #[test]
    fn form_builds_with_files() {
        let req = TurnRequest {
            message: "see attached".into(),
            history: vec![],
            files: vec![FilePart {
                field: "file_0".into(),
                file_name: "a.txt".into(),
                mime_type: "text/plain".into(),
                bytes: b"hi".to_vec(),
            }],
        };
        assert!(HttpTransport::form(req).is_ok());
    }

    #[tokio::test]
    async fn truncated_body_is_reported_as_interrupted() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut seen = Vec::new();
            let mut buf = [0u8; 4096];
            while !(seen.ends_with(b"--\r\n") || seen.ends_with(b"\r\n0\r\n\r\n")) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                seen.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      Content-Type: text/event-stream\r\n\
                      Content-Length: 100\r\n\r\n\
                      data: {\"content\":\"a\"}\n\n",
                )
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let config = ClientConfig::default().with_endpoint(format!("http://{addr}/api/chat"));
        let transport = HttpTransport::new(&config).unwrap();
        let mut body = transport
            .open(TurnRequest {
                message: "hi".into(),
                history: vec![],
                files: vec![],
            })
            .await
            .unwrap();

        let mut received = Vec::new();
        let err = loop {
            match body.next().await {
                Some(Ok(bytes)) => received.extend_from_slice(&bytes),
                Some(Err(e)) => break e,
                None => panic!("body ended without an error"),
            }
        };
        server.await.unwrap();

        assert_eq!(received, b"data: {\"content\":\"a\"}\n\n");
        assert!(matches!(err, TransportError::Interrupted(_)), "{err:?}");
    }
}
