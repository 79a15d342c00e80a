//! Request envelope and response body handling.
//!
//! Statements travel as a JSON envelope. Response bodies arrive as a
//! stream of byte chunks; single responses are buffered up to a size
//! limit and streaming responses are split into lines of bounded length.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::Serialize;

use crate::error::{ClientError, ClientResult};
use crate::transport::BodyStream;

/// JSON body of every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Statement text.
    pub ksql: String,
    /// Properties applied to the statement.
    #[serde(rename = "streamsProperties", skip_serializing_if = "BTreeMap::is_empty")]
    pub streams_properties: BTreeMap<String, String>,
}

impl Envelope {
    /// Wraps `statement` with `streams_properties`.
    pub fn new(statement: &str, streams_properties: &BTreeMap<String, String>) -> Self {
        Self {
            ksql: statement.to_string(),
            streams_properties: streams_properties.clone(),
        }
    }
}

/// Buffers a whole body, failing once it grows past `limit` bytes.
pub(crate) async fn read_to_end(body: &mut BodyStream, limit: usize) -> ClientResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(ClientError::CannotRead)?;
        if buf.len() + chunk.len() > limit {
            return Err(ClientError::Protocol(format!(
                "response body exceeds {} bytes",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Splits a body into newline-terminated lines.
pub(crate) struct LineReader {
    body: BodyStream,
    buf: BytesMut,
    max_line: usize,
    eof: bool,
}

impl LineReader {
    pub fn new(body: BodyStream, max_line: usize) -> Self {
        Self {
            body,
            buf: BytesMut::new(),
            max_line,
            eof: false,
        }
    }

    /// Returns the next line without its terminator, or `None` at the end.
    pub async fn next_line(&mut self) -> ClientResult<Option<String>> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buf[scanned..].iter().position(|&b| b == b'\n') {
                let pos = scanned + pos;
                let line = self.buf.split_to(pos + 1);
                let text = String::from_utf8_lossy(&line[..pos]);
                return Ok(Some(text.trim_end_matches('\r').to_string()));
            }
            scanned = self.buf.len();
            if scanned > self.max_line {
                return Err(ClientError::Protocol(format!(
                    "line exceeds {} bytes",
                    self.max_line
                )));
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = self.buf.split();
                return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
            }
            match self.body.next().await {
                Some(chunk) => self
                    .buf
                    .extend_from_slice(&chunk.map_err(ClientError::CannotRead)?),
                None => self.eof = true,
            }
        }
    }
}

/// Extracts a readable message from an error response body.
pub(crate) fn error_message(body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct EngineError {
        message: String,
    }

    match serde_json::from_slice::<EngineError>(body) {
        Ok(err) => err.message,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

/// Strips the JSON array punctuation wrapping each line of a query response.
pub(crate) fn strip_array_punctuation(line: &str) -> &str {
    let line = line.trim();
    let line = line.strip_prefix('[').unwrap_or(line);
    let line = line
        .strip_suffix(',')
        .or_else(|| line.strip_suffix(']'))
        .unwrap_or(line);
    line.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn body(parts: &[&'static [u8]]) -> BodyStream {
        let parts: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(futures::stream::iter(parts))
    }

    #[test]
    fn test_envelope() {
        let mut props = BTreeMap::new();
        let body = serde_json::to_string(&Envelope::new("LIST STREAMS;", &props)).unwrap();
        assert_eq!(body, r#"{"ksql":"LIST STREAMS;"}"#);
        props.insert("ksql.streams.auto.offset.reset".to_string(), "earliest".to_string());
        let body = serde_json::to_string(&Envelope::new("SELECT 'a' FROM t;", &props)).unwrap();
        assert_eq!(
            body,
            r#"{"ksql":"SELECT 'a' FROM t;","streamsProperties":{"ksql.streams.auto.offset.reset":"earliest"}}"#
        );
    }

    #[tokio::test]
    async fn test_read_to_end() {
        let bytes = read_to_end(&mut body(&[b"hel", b"lo"]), 5).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_read_to_end_limit() {
        let err = read_to_end(&mut body(&[b"hel", b"lo!"]), 5).await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_read_error_is_cannot_read() {
        let parts: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"[")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut stream: BodyStream = Box::pin(futures::stream::iter(parts));
        let err = read_to_end(&mut stream, 1024).await.unwrap_err();
        assert!(matches!(err, ClientError::CannotRead(_)));
    }

    #[tokio::test]
    async fn test_line_reader() {
        let mut lines = LineReader::new(body(&[b"[{a}", b",\r\n\n{b", b"}]\n", b"tail"]), 64);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("[{a},"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some(""));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("{b}]"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("tail"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_reader_rejects_long_lines() {
        let mut lines = LineReader::new(body(&[b"ok\n", b"aaaa", b"aaaa", b"aaaa"]), 8);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ok"));
        let err = lines.next_line().await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(br#"{"message":"bad"}"#), "bad");
        assert_eq!(error_message(b" plain "), "plain");
    }

    #[test]
    fn test_strip_array_punctuation() {
        assert_eq!(strip_array_punctuation("[{\"header\":{}},"), "{\"header\":{}}");
        assert_eq!(strip_array_punctuation("{\"row\":{}}]"), "{\"row\":{}}");
        assert_eq!(strip_array_punctuation("["), "");
        assert_eq!(strip_array_punctuation("]"), "");
    }
}
