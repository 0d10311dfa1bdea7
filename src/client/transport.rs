use std::fmt;

use thiserror::Error;

use crate::client::credentials::Credential;
use crate::types::UserId;

/// Upstream endpoints the samplers depend on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Friend list of a user.
    FriendList,
    /// Profile of a user, carrying its friend count.
    Profile,
}

impl Endpoint {
    /// Path of the endpoint relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::FriendList => "friend/list",
            Endpoint::Profile => "profile/get",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Classified failure of a single upstream request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The credential is over its invocation cap.
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    /// The credential was rejected.
    #[error("invalid credential")]
    InvalidCredential,
    /// The endpoint does not exist.
    #[error("unknown interface")]
    UnknownInterface,
    /// The user does not exist or is not visible to the application.
    #[error("resource not found")]
    ResourceNotFound,
    /// Network-level failure, including timeouts and server errors.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Any other upstream error.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Raw access to the upstream API.
///
/// Implementations issue one authenticated request per call and return the
/// response body. They never retry; retry policy lives in
/// [`GraphClient`](crate::client::GraphClient).
pub trait Transport {
    /// Fetches the friend list of `user`, up to `page_size` entries.
    fn get_friend_list(
        &self,
        credential: &Credential,
        user: UserId,
        page_size: u32,
    ) -> Result<String, TransportError>;

    /// Fetches the profile of `user`.
    fn get_profile(&self, credential: &Credential, user: UserId)
        -> Result<String, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_friend_list(
        &self,
        credential: &Credential,
        user: UserId,
        page_size: u32,
    ) -> Result<String, TransportError> {
        (**self).get_friend_list(credential, user, page_size)
    }

    fn get_profile(
        &self,
        credential: &Credential,
        user: UserId,
    ) -> Result<String, TransportError> {
        (**self).get_profile(credential, user)
    }
}
