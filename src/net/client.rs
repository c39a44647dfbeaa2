//! HTTP invoker used to talk to the platform management API.
//!
//! [`HttpClient`] is the seam the API clients depend on: it takes a request
//! carrying only a path and returns the response with an unread body.
//! [`HyperClient`] is the production implementation on top of hyper and
//! rustls.

use crate::error::{Result, SecurityError};
use crate::net::config::{build_tls_config, ApiConfig};
use async_trait::async_trait;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, AUTHORIZATION};
use hyper::{Request, Response, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::debug;

/// Boxed error produced by an [`HttpClient`] or a response body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A response body that has not been read yet.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Something that can submit an HTTP request and hand back the response.
///
/// Implementations own connection handling, authentication and deadlines.
/// Callers build requests with a path-only URI.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(
        &self,
        request: Request<Empty<Bytes>>,
    ) -> std::result::Result<Response<ResponseBody>, BoxError>;
}

/// Wrap any body into a [`ResponseBody`].
pub fn boxed_body<B>(body: B) -> ResponseBody
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// An [`HttpClient`] backed by hyper over rustls.
///
/// Request paths are resolved against the configured target and, when a
/// token is configured, an `Authorization: Bearer` header is added.
#[derive(Debug)]
pub struct HyperClient {
    target: Uri,
    authorization: Option<HeaderValue>,
    timeout: Option<Duration>,
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl HyperClient {
    /// Build a client from `config`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use opsman_security::net::client::HyperClient;
    /// use opsman_security::net::config::ApiConfig;
    ///
    /// # fn example() -> opsman_security::error::Result<()> {
    /// let client = HyperClient::new(&ApiConfig::new("https://opsman.example.com"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let target = config.target_uri()?;
        let tls = build_tls_config(config.ca_cert_pem.as_deref())?;

        let authorization = config
            .token
            .as_deref()
            .map(|token| {
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| SecurityError::Config(format!("Invalid token: {}", e)))
            })
            .transpose()?;

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(https);

        Ok(Self {
            target,
            authorization,
            timeout: config.request_timeout(),
            client,
        })
    }

    async fn send(
        &self,
        request: Request<Empty<Bytes>>,
    ) -> std::result::Result<Response<ResponseBody>, BoxError> {
        let response = self.client.request(request).await?;
        Ok(response.map(boxed_body))
    }
}

#[async_trait]
impl HttpClient for HyperClient {
    async fn execute(
        &self,
        request: Request<Empty<Bytes>>,
    ) -> std::result::Result<Response<ResponseBody>, BoxError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = resolve_uri(&self.target, &parts.uri)?;
        if let Some(authorization) = &self.authorization {
            parts.headers.insert(AUTHORIZATION, authorization.clone());
        }

        debug!(method = %parts.method, uri = %parts.uri, "submitting request");
        let request = Request::from_parts(parts, body);

        match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(format!("request timed out after {:?}", timeout).into()),
            },
            None => self.send(request).await,
        }
    }
}

/// Join a path-only request URI onto the target, keeping any base path the
/// target carries.
pub fn resolve_uri(target: &Uri, request_uri: &Uri) -> Result<Uri> {
    let base_path = target.path().trim_end_matches('/');
    let request_path = request_uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut builder = Uri::builder().path_and_query(format!("{}{}", base_path, request_path));
    if let Some(scheme) = target.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = target.authority() {
        builder = builder.authority(authority.clone());
    }

    builder
        .build()
        .map_err(|e| SecurityError::RequestConstruction(format!("Invalid request URI: {}", e)))
}
