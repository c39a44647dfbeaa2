//! Root CA certificate retrieval.
//!
//! One GET against the security endpoint, a JSON envelope back.

use crate::error::{Result, SecurityError};
use crate::net::client::{HttpClient, ResponseBody};
use http::response::Parts;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

/// Path of the root CA certificate endpoint.
pub const ROOT_CA_CERTIFICATE_PATH: &str = "/api/v0/security/root_ca_certificate";

#[derive(Debug, Deserialize)]
struct CertResponse {
    #[serde(default, rename = "root_ca_certificate_pem")]
    cert: Option<String>,
}

/// Fetches the platform's root CA certificate through an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct RootCaClient<C> {
    client: C,
}

impl<C> RootCaClient<C>
where
    C: HttpClient,
{
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch the root CA certificate as PEM text.
    ///
    /// The PEM is returned exactly as the API sent it; a missing field
    /// yields an empty string.
    pub async fn fetch_root_ca_cert(&self) -> Result<String> {
        let request = Request::get(ROOT_CA_CERTIFICATE_PATH)
            .body(Empty::<Bytes>::new())
            .map_err(|e| SecurityError::RequestConstruction(e.to_string()))?;

        debug!(path = ROOT_CA_CERTIFICATE_PATH, "fetching root CA certificate");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| SecurityError::Submit(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(unexpected_response(response).await);
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| SecurityError::BodyRead(e.to_string()))?
            .to_bytes();

        // A null body or null field reads as absent.
        let cert_response: Option<CertResponse> =
            serde_json::from_slice(&body).map_err(|e| SecurityError::Decode(e.to_string()))?;

        Ok(cert_response
            .and_then(|response| response.cert)
            .unwrap_or_default())
    }
}

async fn unexpected_response(response: Response<ResponseBody>) -> SecurityError {
    let (parts, body) = response.into_parts();

    match body.collect().await {
        Ok(collected) => {
            let dump = dump_response(&parts, &collected.to_bytes());
            warn!(status = %parts.status, "unexpected response from root CA endpoint");
            SecurityError::UnexpectedStatus(dump)
        }
        Err(e) => SecurityError::ResponseDump(e.to_string()),
    }
}

/// Render a response the way it appeared on the wire: status line, headers,
/// blank line, body.
pub fn dump_response(parts: &Parts, body: &[u8]) -> String {
    let mut out = format!(
        "{:?} {} {}\r\n",
        parts.version,
        parts.status.as_u16(),
        parts.status.canonical_reason().unwrap_or("")
    );

    for (name, value) in &parts.headers {
        out.push_str(&format!(
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }

    out.push_str("\r\n");
    out.push_str(&String::from_utf8_lossy(body));
    out
}
