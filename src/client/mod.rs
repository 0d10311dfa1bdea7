//! Access to the upstream social graph.
//!
//! [`GraphClient`] turns a raw [`Transport`] into the two queries samplers
//! need, rotating or discarding credentials from a shared [`CredentialPool`]
//! when the upstream reports rate limits or invalid tokens.

mod credentials;
mod graph_client;
mod http;
pub mod response;
mod transport;

/// Access tokens and the shared rotation pool.
pub use credentials::{Credential, CredentialPool};

/// Retrying client and the query interface samplers consume.
pub use graph_client::{
    ClientError, ClientMetrics, ClientOptions, Degree, ExhaustReason, FriendSource, Friends,
    GraphClient, DEFAULT_PAGE_SIZE,
};

/// Blocking HTTP transport for the live API.
pub use http::{HttpOptions, HttpTransport, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

/// Raw request interface and its error taxonomy.
pub use transport::{Endpoint, Transport, TransportError};
