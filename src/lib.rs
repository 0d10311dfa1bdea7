//! Sampling of online social networks through a rate-limited API.
//!
//! The crate explores the friendship graph behind a token-authenticated HTTP
//! API with one of four strategies (BFS, random walk, Metropolis-Hastings
//! random walk, uniform ID sampling) and appends every sampled user with its
//! friend list to a line-oriented output.
//!
//! Layers, bottom up:
//! - [`client`]: credential pool, raw transport and the retrying
//!   [`GraphClient`](client::GraphClient).
//! - [`sampler`]: the strategies and the record sink.
//! - [`cli`]: wiring used by the `osn-sample` binary.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod client;
mod error;
pub mod sampler;
pub mod testkit;
pub mod types;

pub use error::{Result, SamplerError};
