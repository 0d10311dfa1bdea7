#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use osn_sampler::{
    client::{
        ClientError, ClientOptions, Credential, CredentialPool, Degree, ExhaustReason,
        FriendSource, Friends, GraphClient, TransportError,
    },
    sampler::{read_records, Bfs, SampleRecorder, Sampler},
    testkit::MemoryTransport,
    types::UserId,
    SamplerError,
};

fn options() -> ClientOptions {
    ClientOptions {
        transient_backoff: Duration::ZERO,
        ..ClientOptions::default()
    }
}

fn client<'a>(
    transport: &'a MemoryTransport,
    pool: &Arc<CredentialPool>,
) -> GraphClient<&'a MemoryTransport> {
    GraphClient::new(transport, Arc::clone(pool), options())
}

fn tokens_used(transport: &MemoryTransport) -> Vec<String> {
    transport.calls().into_iter().map(|call| call.token).collect()
}

#[test]
fn rate_limited_pool_rotates_once_per_credential_then_gives_up() {
    let transport = MemoryTransport::new().with_user(1, &[2]);
    transport.fail_always(Some(TransportError::RateLimitExceeded));
    let pool = Arc::new(CredentialPool::new(["a", "b", "c"]));
    let mut client = client(&transport, &pool);

    let err = client.fetch_friends(UserId(1)).unwrap_err();
    assert_eq!(err, ClientError::PoolExhausted(ExhaustReason::Capacity));
    assert_eq!(tokens_used(&transport), ["a", "b", "c", "a"]);
    assert_eq!(client.metrics().rotations, 3);
    assert_eq!(client.metrics().rate_limited, 4);
    // Rotation never drops credentials.
    assert_eq!(pool.len(), 3);
}

#[test]
fn rate_limit_then_success_records_exactly_once() {
    let transport = MemoryTransport::new().with_user(1, &[2, 3]);
    transport.fail_next(TransportError::RateLimitExceeded);
    let pool = Arc::new(CredentialPool::new(["a", "b"]));
    let mut bfs = Bfs::new(client(&transport, &pool), SampleRecorder::new(Vec::new()));

    let report = bfs.run(UserId(1), 1).unwrap();
    assert_eq!(report.recorded, 1);
    assert_eq!(report.final_counter, 2);
    assert_eq!(tokens_used(&transport), ["a", "b"]);
    assert_eq!(pool.current().map(|c| c.secret().to_string()), Some("b".into()));

    let (_, recorder) = bfs.into_parts();
    let records = read_records(recorder.into_inner().as_slice()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].to_string(), "1#2,3");
}

#[test]
fn invalid_credentials_are_discarded_until_one_works() {
    let transport = MemoryTransport::new()
        .with_user(1, &[2])
        .with_invalid_token("a");
    let pool = Arc::new(CredentialPool::new(["a", "b"]));
    let mut client = client(&transport, &pool);

    assert_eq!(
        client.fetch_friends(UserId(1)).unwrap(),
        Friends::Found(vec![UserId(2)])
    );
    assert_eq!(pool.len(), 1);
    assert_eq!(client.metrics().discards, 1);
}

#[test]
fn run_aborts_when_every_credential_is_invalid() {
    let transport = MemoryTransport::new()
        .with_user(1, &[2])
        .with_invalid_token("a")
        .with_invalid_token("b");
    let pool = Arc::new(CredentialPool::new(["a", "b"]));
    let mut bfs = Bfs::new(client(&transport, &pool), SampleRecorder::new(Vec::new()));

    let err = bfs.run(UserId(1), 5).unwrap_err();
    assert!(matches!(
        err,
        SamplerError::PoolExhausted {
            reason: ExhaustReason::NoCredentials,
            counter: 1,
        }
    ));
    assert!(pool.is_empty());
    assert_eq!(bfs.recorder().written(), 0);
}

/// Serves `budget` friend-list fetches, then behaves like a drained pool.
struct Budgeted<S> {
    inner: S,
    budget: usize,
}

impl<S: FriendSource> FriendSource for Budgeted<S> {
    fn fetch_friends(&mut self, user: UserId) -> Result<Friends, ClientError> {
        if self.budget == 0 {
            return Err(ClientError::PoolExhausted(ExhaustReason::Capacity));
        }
        self.budget -= 1;
        self.inner.fetch_friends(user)
    }

    fn fetch_degree(&mut self, user: UserId) -> Result<Degree, ClientError> {
        self.inner.fetch_degree(user)
    }
}

#[test]
fn abort_mid_run_keeps_earlier_records() {
    let transport = MemoryTransport::new()
        .with_user(1, &[2, 3])
        .with_user(2, &[1])
        .with_user(3, &[1]);
    let pool = Arc::new(CredentialPool::new(["a"]));
    let source = Budgeted {
        inner: client(&transport, &pool),
        budget: 2,
    };
    let mut bfs = Bfs::new(source, SampleRecorder::new(Vec::new()));

    let err = bfs.run(UserId(1), 5).unwrap_err();
    assert!(matches!(
        err,
        SamplerError::PoolExhausted {
            reason: ExhaustReason::Capacity,
            counter: 3,
        }
    ));
    assert_eq!(err.counter(), Some(3));
    assert_eq!(bfs.recorder().written(), 2);
}

#[test]
fn stale_rotation_from_a_shared_pool_is_ignored() {
    let pool = Arc::new(CredentialPool::new(["a", "b", "c"]));
    let seen_by_first = pool.current().unwrap();
    let seen_by_second = pool.current().unwrap();

    pool.rotate(&seen_by_first);
    // The second holder reports the same limit after the first one already
    // rotated; the pool must not skip over "b".
    let current = pool.rotate(&seen_by_second);
    assert_eq!(current, Some(Credential::new("b")));
    assert_eq!(
        pool.snapshot(),
        vec![Credential::new("b"), Credential::new("c"), Credential::new("a")]
    );
}

#[test]
fn clients_sharing_a_pool_see_each_others_discards() {
    let transport = MemoryTransport::new()
        .with_user(1, &[2])
        .with_invalid_token("a");
    let pool = Arc::new(CredentialPool::new(["a", "b"]));
    let mut first = client(&transport, &pool);
    let mut second = client(&transport, &pool);

    assert!(first.fetch_friends(UserId(1)).unwrap().is_found());
    assert!(second.fetch_friends(UserId(1)).unwrap().is_found());
    // Only the first client ever presented the invalid token.
    assert_eq!(tokens_used(&transport), ["a", "b", "b"]);
    assert_eq!(second.metrics().discards, 0);
}

#[test]
fn upstream_not_found_is_not_retried() {
    let transport = MemoryTransport::new();
    let pool = Arc::new(CredentialPool::new(["a", "b"]));
    let mut client = client(&transport, &pool);

    assert_eq!(client.fetch_friends(UserId(9)).unwrap(), Friends::Missing);
    assert_eq!(client.fetch_degree(UserId(9)).unwrap(), Degree::Missing);
    assert_eq!(transport.calls().len(), 2);
    assert_eq!(client.metrics().not_found, 2);
}
