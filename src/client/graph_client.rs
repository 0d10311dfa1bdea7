use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::client::credentials::{Credential, CredentialPool};
use crate::client::response::{parse_degree, parse_friend_list};
use crate::client::transport::{Endpoint, Transport, TransportError};
use crate::types::{FriendSet, UserId};

/// Friend-list page size; large enough to fetch any list in one call.
pub const DEFAULT_PAGE_SIZE: u32 = 1_000_000;

/// Why the credential pool could not serve a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustReason {
    /// Every credential was rotated through and all are rate limited.
    Capacity,
    /// Every credential was discarded as invalid.
    NoCredentials,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustReason::Capacity => f.write_str("capacity exhausted"),
            ExhaustReason::NoCredentials => f.write_str("no credentials left"),
        }
    }
}

/// Fatal client failures. Everything else is absorbed into a not-found result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    /// No credential can serve the request.
    #[error("credential pool exhausted: {0}")]
    PoolExhausted(ExhaustReason),
}

/// Outcome of a friend-list fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Friends {
    /// The user exists and has at least one friend.
    Found(FriendSet),
    /// The user exists but has no friends.
    NoFriends,
    /// The user does not exist, is hidden, or the body was unusable.
    Missing,
    /// Every transient retry failed; the user may still exist.
    Unavailable,
}

impl Friends {
    /// Whether the fetch produced usable data.
    pub fn is_found(&self) -> bool {
        matches!(self, Friends::Found(_))
    }

    /// Friend list when found.
    pub fn into_found(self) -> Option<FriendSet> {
        match self {
            Friends::Found(ids) => Some(ids),
            _ => None,
        }
    }
}

/// Outcome of a friend-count fetch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Degree {
    /// Friend count reported by the profile.
    Known(u64),
    /// The profile does not exist, is hidden, or the body was unusable.
    Missing,
    /// Every transient retry failed; the profile may still exist.
    Unavailable,
}

impl Degree {
    /// Friend count when known.
    pub fn known(self) -> Option<u64> {
        match self {
            Degree::Known(degree) => Some(degree),
            _ => None,
        }
    }
}

/// Body of one logical request, or why there is none.
enum Reply {
    Body(String),
    Absent,
    Unavailable,
}

/// The two graph queries samplers are written against.
pub trait FriendSource {
    /// Friend list of `user`.
    fn fetch_friends(&mut self, user: UserId) -> Result<Friends, ClientError>;

    /// Friend count of `user`.
    fn fetch_degree(&mut self, user: UserId) -> Result<Degree, ClientError>;
}

impl<S: FriendSource + ?Sized> FriendSource for &mut S {
    fn fetch_friends(&mut self, user: UserId) -> Result<Friends, ClientError> {
        (**self).fetch_friends(user)
    }

    fn fetch_degree(&mut self, user: UserId) -> Result<Degree, ClientError> {
        (**self).fetch_degree(user)
    }
}

/// Retry and paging options for [`GraphClient`].
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Page size requested from the friend-list endpoint.
    pub page_size: u32,
    /// Retries of one request after transient failures before giving up.
    pub max_transient_retries: u32,
    /// Pause before retrying a transient failure.
    pub transient_backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_transient_retries: 3,
            transient_backoff: Duration::from_millis(500),
        }
    }
}

/// Counters describing client activity over its lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientMetrics {
    /// Requests issued, retries included.
    pub requests: u64,
    /// Rate-limit responses received.
    pub rate_limited: u64,
    /// Credential rotations performed.
    pub rotations: u64,
    /// Credentials discarded as invalid.
    pub discards: u64,
    /// Transient failures observed.
    pub transient_failures: u64,
    /// Requests abandoned after exhausting transient retries.
    pub transient_give_ups: u64,
    /// Users reported as missing or hidden.
    pub not_found: u64,
    /// Bodies that did not match the expected schema.
    pub malformed: u64,
    /// Unclassified upstream errors and unknown interfaces.
    pub upstream_errors: u64,
}

/// Graph queries over a [`Transport`] with credential rotation and retries.
pub struct GraphClient<T> {
    transport: T,
    pool: Arc<CredentialPool>,
    opts: ClientOptions,
    metrics: ClientMetrics,
}

impl<T: Transport> GraphClient<T> {
    /// Creates a client drawing credentials from `pool`.
    pub fn new(transport: T, pool: Arc<CredentialPool>, opts: ClientOptions) -> Self {
        Self {
            transport,
            pool,
            opts,
            metrics: ClientMetrics::default(),
        }
    }

    /// Shared credential pool.
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Activity counters so far.
    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issues one logical request, retrying until it yields a body, a benign
    /// not-found, a transient give-up, or a fatal pool failure.
    fn request<F>(
        &mut self,
        endpoint: Endpoint,
        user: UserId,
        call: F,
    ) -> Result<Reply, ClientError>
    where
        F: Fn(&T, &Credential) -> Result<String, TransportError>,
    {
        let mut rotations = 0usize;
        let mut transient = 0u32;
        loop {
            let Some(credential) = self.pool.current() else {
                error!(%endpoint, %user, "client.pool_empty");
                return Err(ClientError::PoolExhausted(ExhaustReason::NoCredentials));
            };
            self.metrics.requests += 1;
            let err = match call(&self.transport, &credential) {
                Ok(body) => return Ok(Reply::Body(body)),
                Err(err) => err,
            };
            match err {
                TransportError::RateLimitExceeded => {
                    self.metrics.rate_limited += 1;
                    if rotations >= self.pool.len() {
                        error!(%endpoint, %user, rotations, "client.capacity_exhausted");
                        return Err(ClientError::PoolExhausted(ExhaustReason::Capacity));
                    }
                    self.pool.rotate(&credential);
                    rotations += 1;
                    self.metrics.rotations += 1;
                }
                TransportError::InvalidCredential => {
                    self.pool.discard(&credential);
                    self.metrics.discards += 1;
                    if self.pool.is_empty() {
                        error!(%endpoint, %user, "client.all_credentials_invalid");
                        return Err(ClientError::PoolExhausted(ExhaustReason::NoCredentials));
                    }
                }
                TransportError::UnknownInterface => {
                    self.metrics.upstream_errors += 1;
                    error!(%endpoint, %user, "client.unknown_interface");
                    return Ok(Reply::Absent);
                }
                TransportError::ResourceNotFound => {
                    self.metrics.not_found += 1;
                    debug!(%endpoint, %user, "client.not_found");
                    return Ok(Reply::Absent);
                }
                TransportError::Transient(reason) => {
                    self.metrics.transient_failures += 1;
                    if transient >= self.opts.max_transient_retries {
                        self.metrics.transient_give_ups += 1;
                        warn!(%endpoint, %user, %reason, attempts = transient + 1, "client.transient_give_up");
                        return Ok(Reply::Unavailable);
                    }
                    transient += 1;
                    debug!(%endpoint, %user, %reason, attempt = transient, "client.transient_retry");
                    if !self.opts.transient_backoff.is_zero() {
                        thread::sleep(self.opts.transient_backoff);
                    }
                }
                TransportError::Upstream(detail) => {
                    self.metrics.upstream_errors += 1;
                    warn!(%endpoint, %user, %detail, "client.upstream_error");
                    return Ok(Reply::Absent);
                }
            }
        }
    }
}

impl<T: Transport> FriendSource for GraphClient<T> {
    fn fetch_friends(&mut self, user: UserId) -> Result<Friends, ClientError> {
        let page_size = self.opts.page_size;
        let body = self.request(Endpoint::FriendList, user, |transport, credential| {
            transport.get_friend_list(credential, user, page_size)
        })?;
        let body = match body {
            Reply::Body(body) => body,
            Reply::Absent => return Ok(Friends::Missing),
            Reply::Unavailable => return Ok(Friends::Unavailable),
        };
        match parse_friend_list(&body) {
            Ok(ids) if ids.is_empty() => {
                info!(%user, "client.friends.none");
                Ok(Friends::NoFriends)
            }
            Ok(ids) => Ok(Friends::Found(ids)),
            Err(err) => {
                self.metrics.malformed += 1;
                warn!(%user, error = %err, "client.friends.malformed");
                Ok(Friends::Missing)
            }
        }
    }

    fn fetch_degree(&mut self, user: UserId) -> Result<Degree, ClientError> {
        let body = self.request(Endpoint::Profile, user, |transport, credential| {
            transport.get_profile(credential, user)
        })?;
        let body = match body {
            Reply::Body(body) => body,
            Reply::Absent => return Ok(Degree::Missing),
            Reply::Unavailable => return Ok(Degree::Unavailable),
        };
        match parse_degree(&body) {
            Ok(degree) => Ok(Degree::Known(degree)),
            Err(err) => {
                self.metrics.malformed += 1;
                warn!(%user, error = %err, "client.degree.malformed");
                Ok(Degree::Missing)
            }
        }
    }
}
