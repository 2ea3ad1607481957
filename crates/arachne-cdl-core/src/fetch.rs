//! Retrieval of the user configuration from the admin server.
//!
//! One bounded GET per attempt. If the server challenges with
//! `WWW-Authenticate: Negotiate` and a [`NegotiateProvider`] is configured,
//! the request is repeated once with an SPNEGO token. Mutual
//! authentication is optional: a server token that fails to verify is
//! logged, not fatal. Nothing here retries on failure.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, WWW_AUTHENTICATE};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DownloadType;
use crate::payload::{Payload, UserConfig};

const NEGOTIATE_SCHEME: &str = "Negotiate";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("the admin server refused the credentials (401 Unauthorized)")]
    Unauthorized,

    #[error("the admin server answered with HTTP status {status}")]
    Http { status: u16 },

    #[error("cannot connect to the admin server: {0}")]
    Connect(String),

    #[error("cannot parse the downloaded configuration: {0}")]
    Decode(String),

    #[error("cannot prepare the download: {0}")]
    Client(String),
}

/// Parameters of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub download_type: DownloadType,
    /// `false` disables certificate validation.
    pub verify_tls: bool,
    pub timeout: Duration,
}

/// Anything that can produce a [`Payload`] for a request.
pub trait ConfigSource: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<Payload, FetchError>;
}

/// Source of SPNEGO tokens for `Negotiate` authentication.
pub trait NegotiateProvider: Send + Sync {
    /// Start a security context for the HTTP service on `host`.
    fn start(&self, host: &str) -> Result<Box<dyn NegotiateSession>, String>;
}

/// One client security context.
pub trait NegotiateSession {
    /// The initial token to send to the server.
    fn initial_token(&mut self) -> Result<Vec<u8>, String>;

    /// Process the token the server returned with its response.
    fn verify(&mut self, server_token: &[u8]) -> Result<(), String>;
}

/// HTTP(S) implementation of [`ConfigSource`].
#[derive(Default, Clone)]
pub struct HttpFetcher {
    negotiate: Option<Arc<dyn NegotiateProvider>>,
}

impl HttpFetcher {
    /// Fetcher without Negotiate support.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher answering Negotiate challenges through `provider`.
    pub fn with_negotiate(provider: Arc<dyn NegotiateProvider>) -> Self {
        Self {
            negotiate: Some(provider),
        }
    }

    fn build_client(request: &FetchRequest) -> Result<Client, FetchError> {
        if !request.verify_tls {
            warn!("TLS certificate verification is disabled");
        }
        Client::builder()
            .timeout(request.timeout)
            .connect_timeout(request.timeout)
            .danger_accept_invalid_certs(!request.verify_tls)
            .user_agent(concat!("arachne-cdl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))
    }

    fn send(
        client: &Client,
        url: &Url,
        authorization: Option<&str>,
    ) -> Result<Response, FetchError> {
        let mut builder = client.get(url.clone());
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Connect(format!("request to {} timed out", url))
            } else {
                FetchError::Connect(e.to_string())
            }
        })
    }

    /// Repeat the request with a Negotiate token. Returns the original
    /// response when no token can be produced.
    fn negotiate(
        provider: &dyn NegotiateProvider,
        client: &Client,
        url: &Url,
        challenged: Response,
    ) -> Result<Response, FetchError> {
        let Some(host) = url.host_str() else {
            return Ok(challenged);
        };

        let mut session = match provider.start(host) {
            Ok(session) => session,
            Err(e) => {
                warn!("Cannot start Negotiate authentication for {}: {}", host, e);
                return Ok(challenged);
            }
        };
        let token = match session.initial_token() {
            Ok(token) => token,
            Err(e) => {
                warn!("Cannot obtain a Negotiate token for {}: {}", host, e);
                return Ok(challenged);
            }
        };

        debug!("Retrying {} with Negotiate authentication", url);
        let header = format!("{} {}", NEGOTIATE_SCHEME, BASE64.encode(token));
        let response = Self::send(client, url, Some(&header))?;

        if response.status().is_success()
            && let Some(Some(server_token)) = negotiate_challenge(response.headers())
            && let Err(e) = session.verify(&server_token)
        {
            warn!("Mutual authentication with {} failed: {}", host, e);
        }

        Ok(response)
    }
}

impl ConfigSource for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<Payload, FetchError> {
        let url = Url::parse(&request.url)
            .map_err(|e| FetchError::Client(format!("invalid URL {}: {}", request.url, e)))?;
        let client = Self::build_client(request)?;

        info!("Downloading configuration from {}", url);
        let mut response = Self::send(&client, &url, None)?;

        if response.status() == StatusCode::UNAUTHORIZED
            && negotiate_challenge(response.headers()).is_some()
        {
            match &self.negotiate {
                Some(provider) => {
                    response = Self::negotiate(provider.as_ref(), &client, &url, response)?;
                }
                None => debug!("Server offers Negotiate, but no provider is configured"),
            }
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .map_err(|e| FetchError::Connect(format!("reading response body failed: {}", e)))?;
        debug!("Received {} bytes", body.len());

        decode(request.download_type, &body)
    }
}

/// Interpret a response body for the download type.
pub fn decode(download_type: DownloadType, body: &[u8]) -> Result<Payload, FetchError> {
    match download_type {
        DownloadType::NetworkManager => UserConfig::from_json(body)
            .map(Payload::Profile)
            .map_err(|e| FetchError::Decode(e.to_string())),
        DownloadType::Ovpn => Ok(Payload::File(body.to_vec())),
    }
}

/// Find a Negotiate challenge among the `WWW-Authenticate` headers.
///
/// `None` means Negotiate is not offered; `Some(None)` is a bare challenge;
/// `Some(Some(token))` carries a (decoded) server token.
fn negotiate_challenge(headers: &HeaderMap) -> Option<Option<Vec<u8>>> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(parse_negotiate)
}

fn parse_negotiate(value: &str) -> Option<Option<Vec<u8>>> {
    let value = value.trim();
    let (scheme, rest) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case(NEGOTIATE_SCHEME) {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        Some(None)
    } else {
        Some(BASE64.decode(token).ok())
    }
}
