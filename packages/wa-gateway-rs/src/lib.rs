// Client for the messaging gateway sidecar.
//
// The gateway hosts the multi-device messaging library and exposes one HTTP
// resource per linked session. This crate only speaks the gateway's JSON API;
// it knows nothing about pairing workflows.

pub mod models;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{header, Client, RequestBuilder, Response};
use thiserror::Error;
use tracing::debug;

use crate::models::{
    CreateSessionRequest, CreateSessionResponse, GatewayErrorBody, GatewayEvent, MessageContent,
    PairingCodeRequest, PairingCodeResponse, SendMessageRequest,
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to messaging gateway failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("messaging gateway returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed gateway payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayService {
    options: GatewayOptions,
    client: Client,
}

impl GatewayService {
    pub fn new(options: GatewayOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.options.base_url.trim_end_matches('/')
    }

    /// Create (or replace) the gateway session named in `request`.
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, GatewayError> {
        let url = format!("{}/sessions", self.base_url());

        let response = self.authorized(self.client.post(url)).json(request).send().await?;
        let response = check_status(response).await?;

        Ok(response.json::<CreateSessionResponse>().await?)
    }

    /// Subscribe to the session's lifecycle events.
    ///
    /// The gateway answers with newline-delimited JSON; the returned stream
    /// yields one item per line and ends when the gateway closes the body.
    pub async fn subscribe_events(
        &self,
        session_id: &str,
    ) -> Result<impl Stream<Item = Result<GatewayEvent, GatewayError>> + Send + 'static, GatewayError>
    {
        let url = format!("{}/sessions/{}/events", self.base_url(), session_id);

        let response = self
            .authorized(self.client.get(url))
            .header(header::ACCEPT, "application/x-ndjson")
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(decode_ndjson(response.bytes_stream()))
    }

    pub async fn request_pairing_code(
        &self,
        session_id: &str,
        phone_number: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/sessions/{}/pairing-code", self.base_url(), session_id);
        let body = PairingCodeRequest {
            phone_number: phone_number.to_string(),
        };

        let response = self.authorized(self.client.post(url)).json(&body).send().await?;
        let response = check_status(response).await?;

        let data = response.json::<PairingCodeResponse>().await?;
        Ok(data.code)
    }

    pub async fn send_message(
        &self,
        session_id: &str,
        request: &SendMessageRequest,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/sessions/{}/messages", self.base_url(), session_id);

        let response = self.authorized(self.client.post(url)).json(request).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Convenience wrapper for sending a file as a document attachment.
    pub async fn send_document(
        &self,
        session_id: &str,
        to: &str,
        bytes: &[u8],
        mimetype: &str,
        file_name: &str,
        caption: Option<&str>,
    ) -> Result<(), GatewayError> {
        let request = SendMessageRequest {
            to: to.to_string(),
            content: MessageContent::Document {
                document: BASE64.encode(bytes),
                mimetype: mimetype.to_string(),
                file_name: file_name.to_string(),
                caption: caption.map(str::to_string),
            },
        };
        self.send_message(session_id, &request).await
    }

    pub async fn send_text(&self, session_id: &str, to: &str, text: &str) -> Result<(), GatewayError> {
        let request = SendMessageRequest {
            to: to.to_string(),
            content: MessageContent::Text {
                text: text.to_string(),
            },
        };
        self.send_message(session_id, &request).await
    }

    pub async fn close_session(&self, session_id: &str) -> Result<(), GatewayError> {
        let url = format!("{}/sessions/{}", self.base_url(), session_id);

        let response = self.authorized(self.client.delete(url)).send().await?;
        check_status(response).await?;
        Ok(())
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.options.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GatewayErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    debug!(status = status.as_u16(), message = %message, "gateway returned an error");

    Err(GatewayError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Splits a byte stream into lines and decodes each non-blank line as an event.
fn decode_ndjson<S, B, E>(
    bytes: S,
) -> impl Stream<Item = Result<GatewayEvent, GatewayError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    GatewayError: From<E>,
{
    stream::unfold(
        (Box::pin(bytes), LineBuffer::default()),
        |(mut bytes, mut buffer)| async move {
            loop {
                if let Some(line) = buffer.next_line() {
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    let item = serde_json::from_slice::<GatewayEvent>(&line).map_err(GatewayError::Decode);
                    return Some((item, (bytes, buffer)));
                }

                if buffer.finished {
                    return None;
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend(chunk.as_ref()),
                    Some(Err(e)) => return Some((Err(GatewayError::from(e)), (bytes, buffer))),
                    None => buffer.finish(),
                }
            }
        },
    )
}

#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
    finished: bool,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Terminate the input; a trailing line without newline becomes available.
    fn finish(&mut self) {
        self.finished = true;
        if !self.pending.is_empty() {
            self.pending.push(b'\n');
        }
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionState;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, GatewayError>> + Send + 'static {
        let owned: Vec<Result<Vec<u8>, GatewayError>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn decodes_lines_split_across_chunks() {
        let input = chunks(&[
            r#"{"type":"creds.update","cr"#,
            r#"eds":{"registered":false}}"#,
            "\n\n",
            r#"{"type":"connection.update","connection":"open","user":{"id":"1@s"}}"#,
            "\n",
        ]);

        let events: Vec<_> = decode_ndjson(input).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(GatewayEvent::CredsUpdate { .. })));
        match &events[1] {
            Ok(GatewayEvent::ConnectionUpdate { connection, .. }) => {
                assert_eq!(*connection, Some(ConnectionState::Open));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn flushes_trailing_line_without_newline() {
        let input = chunks(&[r#"{"type":"connection.update","connection":"close"}"#]);

        let events: Vec<_> = decode_ndjson(input).collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    #[tokio::test]
    async fn malformed_line_yields_error_and_continues() {
        let input = chunks(&["not json\n", r#"{"type":"creds.update","creds":{}}"#, "\n"]);

        let events: Vec<_> = decode_ndjson(input).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Err(GatewayError::Decode(_))));
        assert!(events[1].is_ok());
    }

    #[test]
    fn base_url_ignores_trailing_slash() {
        let service = GatewayService::new(GatewayOptions {
            base_url: "http://localhost:3001/".to_string(),
            api_key: None,
        });
        assert_eq!(service.base_url(), "http://localhost:3001");
    }
}
