//! In-memory stand-in for the upstream API.
//!
//! [`MemoryTransport`] serves a fixed friendship graph through the same JSON
//! bodies the real API returns, so tests exercise the full decoding and retry
//! path. Failures can be scripted per call or per credential.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use serde_json::json;

use crate::client::{Credential, Endpoint, Transport, TransportError};
use crate::types::UserId;

/// One request observed by a [`MemoryTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    /// Endpoint hit.
    pub endpoint: Endpoint,
    /// User requested.
    pub user: UserId,
    /// Raw token presented.
    pub token: String,
}

#[derive(Default)]
struct Script {
    queued: VecDeque<TransportError>,
    always: Option<TransportError>,
    calls: Vec<Call>,
}

/// Scriptable in-memory [`Transport`].
#[derive(Default)]
pub struct MemoryTransport {
    friends: HashMap<UserId, Vec<UserId>>,
    degrees: HashMap<UserId, u64>,
    hidden_profiles: HashSet<UserId>,
    invalid_tokens: HashSet<String>,
    limited_tokens: HashSet<String>,
    script: Mutex<Script>,
}

impl MemoryTransport {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `user` with the given friend list.
    pub fn with_user(mut self, user: u64, friends: &[u64]) -> Self {
        self.friends
            .insert(UserId(user), friends.iter().copied().map(UserId).collect());
        self
    }

    /// Reports `degree` for `user` on the profile endpoint instead of the
    /// length of its friend list.
    pub fn with_degree(mut self, user: u64, degree: u64) -> Self {
        self.degrees.insert(UserId(user), degree);
        self
    }

    /// Makes the profile of `user` unavailable while keeping its friends.
    pub fn with_hidden_profile(mut self, user: u64) -> Self {
        self.hidden_profiles.insert(UserId(user));
        self
    }

    /// Rejects `token` as invalid on every call.
    pub fn with_invalid_token(mut self, token: &str) -> Self {
        self.invalid_tokens.insert(token.to_string());
        self
    }

    /// Reports `token` as over its invocation limit on every call.
    pub fn with_limited_token(mut self, token: &str) -> Self {
        self.limited_tokens.insert(token.to_string());
        self
    }

    /// Fails the next unscripted call with `err`. Calls queue in order.
    pub fn fail_next(&self, err: TransportError) {
        self.script.lock().queued.push_back(err);
    }

    /// Fails every call with `err` until cleared with `None`.
    pub fn fail_always(&self, err: Option<TransportError>) {
        self.script.lock().always = err;
    }

    /// Requests observed so far.
    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    /// Friend-list requests observed so far, in order.
    pub fn friend_list_requests(&self) -> Vec<UserId> {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| call.endpoint == Endpoint::FriendList)
            .map(|call| call.user)
            .collect()
    }

    fn begin(
        &self,
        endpoint: Endpoint,
        credential: &Credential,
        user: UserId,
    ) -> Result<(), TransportError> {
        let mut script = self.script.lock();
        script.calls.push(Call {
            endpoint,
            user,
            token: credential.secret().to_string(),
        });
        if let Some(err) = script.always.clone() {
            return Err(err);
        }
        if let Some(err) = script.queued.pop_front() {
            return Err(err);
        }
        if self.invalid_tokens.contains(credential.secret()) {
            return Err(TransportError::InvalidCredential);
        }
        if self.limited_tokens.contains(credential.secret()) {
            return Err(TransportError::RateLimitExceeded);
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn get_friend_list(
        &self,
        credential: &Credential,
        user: UserId,
        page_size: u32,
    ) -> Result<String, TransportError> {
        self.begin(Endpoint::FriendList, credential, user)?;
        let friends = self
            .friends
            .get(&user)
            .ok_or(TransportError::ResourceNotFound)?;
        let page: Vec<u64> = friends
            .iter()
            .take(page_size as usize)
            .map(|id| id.0)
            .collect();
        Ok(json!({ "response": page }).to_string())
    }

    fn get_profile(
        &self,
        credential: &Credential,
        user: UserId,
    ) -> Result<String, TransportError> {
        self.begin(Endpoint::Profile, credential, user)?;
        if self.hidden_profiles.contains(&user) {
            return Err(TransportError::ResourceNotFound);
        }
        let friends = self
            .friends
            .get(&user)
            .ok_or(TransportError::ResourceNotFound)?;
        let degree = self
            .degrees
            .get(&user)
            .copied()
            .unwrap_or(friends.len() as u64);
        Ok(json!({ "response": { "id": user.0, "friendCount": degree } }).to_string())
    }
}
