use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::client::credentials::Credential;
use crate::client::response::{classify_error, is_error_body};
use crate::client::transport::{Endpoint, Transport, TransportError};
use crate::types::UserId;

/// Default API root of the upstream network.
pub const DEFAULT_BASE_URL: &str = "https://api.renren.com/v2/";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Options for [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct HttpOptions {
    /// API root; endpoint paths are appended to it.
    pub base_url: String,
    /// Per-request timeout; expiry counts as a transient failure.
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Blocking HTTP implementation of [`Transport`].
///
/// The credential travels as the `access_token` query parameter.
pub struct HttpTransport {
    base_url: String,
    http: Client,
}

impl HttpTransport {
    /// Builds a transport with its own connection pool.
    pub fn new(opts: HttpOptions) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(opts.timeout).build()?;
        let mut base_url = opts.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { base_url, http })
    }

    fn get(
        &self,
        endpoint: Endpoint,
        credential: &Credential,
        params: &[(&str, String)],
    ) -> Result<String, TransportError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let response = self
            .http
            .get(&url)
            .query(params)
            .query(&[("access_token", credential.secret())])
            .send()
            .map_err(|err| TransportError::Transient(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| TransportError::Transient(err.to_string()))?;
        debug!(
            %endpoint,
            status = status.as_u16(),
            bytes = body.len(),
            "http.response"
        );
        if status.is_success() && !is_error_body(&body) {
            Ok(body)
        } else {
            Err(classify_error(Some(status.as_u16()), &body))
        }
    }
}

impl Transport for HttpTransport {
    fn get_friend_list(
        &self,
        credential: &Credential,
        user: UserId,
        page_size: u32,
    ) -> Result<String, TransportError> {
        self.get(
            Endpoint::FriendList,
            credential,
            &[("userId", user.to_string()), ("pageSize", page_size.to_string())],
        )
    }

    fn get_profile(
        &self,
        credential: &Credential,
        user: UserId,
    ) -> Result<String, TransportError> {
        self.get(Endpoint::Profile, credential, &[("userId", user.to_string())])
    }
}
