// Async HTTP client for the Nuki Web API.
//
// Base URL: https://api.nuki.io
// Auth: static `Authorization: Bearer <token>` header, never negotiated.
//
// Every response goes through `classify`, which is the only place that
// turns an HTTP outcome into the two-variant `Error`.

use std::future::Future;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{ApiErrorBody, Smartlock, SmartlockAction};
use crate::transport::TransportConfig;

/// Production endpoint of the Nuki Web API.
pub const DEFAULT_BASE_URL: &str = "https://api.nuki.io";

// ── Seam used by locksync-core ───────────────────────────────────────

/// The calls the synchronization engine makes against the remote service.
///
/// Implemented by [`NukiWebClient`]; tests plug in in-memory fakes.
/// Implementations must be safe to share across concurrently running jobs.
pub trait LockApi: Send + Sync + 'static {
    /// List every device visible to the credential.
    fn get_smartlocks(&self) -> impl Future<Output = Result<Vec<Smartlock>, Error>> + Send;

    /// Fetch one device's current status.
    fn get_smartlock(&self, smartlock_id: &str)
    -> impl Future<Output = Result<Smartlock, Error>> + Send;

    /// Submit an action (lock, unlock, open, ...) to one device.
    fn send_action(
        &self,
        smartlock_id: &str,
        action: &SmartlockAction,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Validate the credential with a cheap authenticated call.
    fn probe(&self) -> impl Future<Output = Result<(), Error>> + Send {
        async move { self.get_smartlocks().await.map(|_| ()) }
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Nuki Web API.
///
/// Holds no per-call mutable state: the bearer header is baked into the
/// underlying `reqwest::Client` at construction, so one instance can be
/// shared by every device job.
#[derive(Debug, Clone)]
pub struct NukiWebClient {
    http: reqwest::Client,
    base_url: Url,
}

impl NukiWebClient {
    /// Build a client for the production API.
    pub fn new(access_token: &SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL, access_token, transport)
    }

    /// Build a client against an arbitrary base URL (proxies, tests).
    pub fn with_base_url(
        base_url: &str,
        access_token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", access_token.expose_secret()))
            .map_err(|e| Error::Unauthorized {
                message: format!("invalid access token header value: {e}"),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = transport.build_client_with_headers(headers)?;
        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::communication(format!("invalid base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::communication(format!(
                "invalid base URL {base_url:?}: cannot be a base"
            )));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Append path segments to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");
        let body = self.send(self.http.get(url)).await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::communication(format!(
                "Unexpected response body: {e} (body preview: {preview:?})"
            ))
        })
    }

    async fn post<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<(), Error> {
        debug!("POST {url}");
        self.send(self.http.post(url).json(body)).await.map(|_| ())
    }

    /// Send the request and classify the outcome. Returns the raw body on
    /// success.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, Error> {
        let resp = request.send().await.map_err(|e| Error::transport(&e))?;
        let status = resp.status();
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let body = resp.text().await.map_err(|e| Error::transport(&e))?;
        debug!(status = status.as_u16(), "response: {body}");

        classify(status, is_json, body)
    }
}

// ── Response classification ──────────────────────────────────────────

/// Map one HTTP outcome onto the result contract.
///
/// 401 and 403 are always `Unauthorized`; everything else >= 300 is
/// `Communication`. The body is returned untouched on success.
fn classify(status: StatusCode, is_json: bool, body: String) -> Result<String, Error> {
    let code = status.as_u16();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(Error::Unauthorized {
            message: error_message(status, is_json, &body),
        })
    } else if code >= 300 {
        Err(Error::Communication {
            message: error_message(status, is_json, &body),
        })
    } else {
        Ok(body)
    }
}

/// Prefer the API's `detailMessage`; otherwise describe the status.
fn error_message(status: StatusCode, is_json: bool, body: &str) -> String {
    if is_json {
        if let Some(detail) = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|e| e.detail_message)
        {
            return detail;
        }
    }
    let code = status.as_u16();
    if body.is_empty() {
        format!(
            "Server returned status {code}: {}",
            status.canonical_reason().unwrap_or("Unknown")
        )
    } else {
        format!("Server returned status {code}: {body}")
    }
}

// ── Endpoints ────────────────────────────────────────────────────────

impl LockApi for NukiWebClient {
    async fn get_smartlocks(&self) -> Result<Vec<Smartlock>, Error> {
        self.get(self.url(&["smartlock"])).await
    }

    async fn get_smartlock(&self, smartlock_id: &str) -> Result<Smartlock, Error> {
        self.get(self.url(&["smartlock", smartlock_id])).await
    }

    async fn send_action(&self, smartlock_id: &str, action: &SmartlockAction) -> Result<(), Error> {
        debug!(?action, "sending action to {smartlock_id}");
        self.post(self.url(&["smartlock", smartlock_id, "action"]), action)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_unauthorized_even_with_detail() {
        let body = r#"{"detailMessage":"token expired"}"#.to_owned();
        let err = classify(StatusCode::FORBIDDEN, true, body).expect_err("403 must fail");
        assert_eq!(
            err,
            Error::Unauthorized {
                message: "token expired".into()
            }
        );
    }

    #[test]
    fn redirect_is_a_communication_error() {
        let err = classify(StatusCode::FOUND, false, String::new()).expect_err("302 must fail");
        assert_eq!(err.message(), "Server returned status 302: Found");
    }

    #[test]
    fn json_without_detail_falls_back_to_body() {
        let message = error_message(StatusCode::BAD_REQUEST, true, r#"{"error":"x"}"#);
        assert_eq!(message, r#"Server returned status 400: {"error":"x"}"#);
    }

    #[test]
    fn detail_ignored_when_not_json() {
        let message = error_message(
            StatusCode::INTERNAL_SERVER_ERROR,
            false,
            r#"{"detailMessage":"nope"}"#,
        );
        assert_eq!(
            message,
            r#"Server returned status 500: {"detailMessage":"nope"}"#
        );
    }

    #[test]
    fn url_encodes_device_ids() {
        let client = NukiWebClient::from_reqwest("https://api.nuki.io/", reqwest::Client::new())
            .expect("valid base URL");
        assert_eq!(
            client.url(&["smartlock", "a b", "action"]).as_str(),
            "https://api.nuki.io/smartlock/a%20b/action"
        );
    }
}
