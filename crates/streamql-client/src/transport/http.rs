//! HTTP transport.

use std::io;

use futures::TryStreamExt;
use reqwest::header::{ACCEPT, CONNECTION, CONTENT_TYPE};
use tracing::debug;

use streamql_common::{ClientConfig, MEDIA_TYPE, USER_AGENT};

use super::{Envelope, SendFuture, Transport, TransportResponse};
use crate::error::{ClientError, ClientResult};

/// Sends statements over HTTP with `reqwest`.
///
/// Connections are not pooled; every request opens its own and asks the
/// engine to close it afterwards.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    /// Creates a transport for the configured endpoint and credentials.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(0)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::CannotDial(io::Error::other(e)))?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(&'a self, path: &'a str, envelope: &'a Envelope) -> SendFuture<'a> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, path);
            debug!("POST {}", url);

            let mut req = self
                .client
                .post(&url)
                .header(ACCEPT, MEDIA_TYPE)
                .header(CONTENT_TYPE, MEDIA_TYPE)
                .header(CONNECTION, "close")
                .json(envelope);
            if let Some(ref username) = self.username {
                req = req.basic_auth(username, self.password.as_ref());
            }

            let resp = req.send().await.map_err(send_error)?;
            let status = resp.status().as_u16();
            let body = resp.bytes_stream().map_err(io::Error::other);
            Ok(TransportResponse {
                status,
                body: Box::pin(body),
            })
        })
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}

fn send_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::CannotDial(io::Error::new(io::ErrorKind::TimedOut, e))
    } else if e.is_connect() {
        ClientError::CannotDial(io::Error::new(io::ErrorKind::ConnectionRefused, e))
    } else if e.is_body() || e.is_request() {
        ClientError::CannotWrite(io::Error::other(e))
    } else {
        ClientError::CannotRead(io::Error::other(e))
    }
}
