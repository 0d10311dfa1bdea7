//! Wiring used by the `osn-sample` binary.
//!
//! Builds the credential pool and client from user input and dispatches a
//! [`SamplingJob`] to the matching sampler.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::info;

use crate::client::{
    ClientOptions, CredentialPool, FriendSource, GraphClient, HttpOptions, HttpTransport,
};
use crate::error::{Result, SamplerError};
use crate::sampler::{
    Bfs, Mhrw, RandomWalk, SampleRecorder, SampleReport, Sampler, SamplerKind, StopSignal,
    UniformOptions, UniformProbe, UniformRange,
};
use crate::types::UserId;

/// Errors raised while preparing or running a job from the command line.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input.
    #[error("{0}")]
    Message(String),
    /// Reading a token file or opening the output failed.
    #[error("{path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    /// The run aborted.
    #[error(transparent)]
    Sampler(#[from] SamplerError),
}

/// Everything that selects and parameterizes one sampler run.
#[derive(Clone, Debug)]
pub struct SamplingJob {
    /// Strategy to run.
    pub sampler: SamplerKind,
    /// Start node; for UNI the first probed ID or the range start.
    pub root: UserId,
    /// Iteration target.
    pub iterations: u64,
    /// Inclusive range end; selects the bounded UNI variant.
    pub end: Option<UserId>,
    /// UNI counting behavior.
    pub uniform: UniformOptions,
    /// Seed for reproducible walks; entropy when absent.
    pub seed: Option<u64>,
}

/// Runs `job` against `graph`, writing records to `recorder`.
pub fn run_job<G, W>(
    job: &SamplingJob,
    graph: G,
    recorder: SampleRecorder<W>,
    stop: StopSignal,
) -> Result<SampleReport>
where
    G: FriendSource,
    W: Write,
{
    if job.end.is_some() && job.sampler != SamplerKind::Uni {
        return Err(SamplerError::InvalidArgument(format!(
            "a range end only applies to UNI, not {}",
            job.sampler
        )));
    }
    let rng = match job.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    info!(
        sampler = %job.sampler,
        root = %job.root,
        iterations = job.iterations,
        seeded = job.seed.is_some(),
        "cli.job.start"
    );
    match (job.sampler, job.end) {
        (SamplerKind::Bfs, _) => Bfs::new(graph, recorder)
            .with_stop(stop)
            .run(job.root, job.iterations),
        (SamplerKind::Rw, _) => RandomWalk::new(graph, recorder, rng)
            .with_stop(stop)
            .run(job.root, job.iterations),
        (SamplerKind::Mhrw, _) => Mhrw::new(graph, recorder, rng)
            .with_stop(stop)
            .run(job.root, job.iterations),
        (SamplerKind::Uni, None) => {
            UniformProbe::new(graph, recorder, rng, job.uniform.clone())
                .with_stop(stop)
                .run(job.root, job.iterations)
        }
        (SamplerKind::Uni, Some(end)) => {
            UniformRange::new(graph, recorder, rng, end, job.uniform.clone())
                .with_stop(stop)
                .run(job.root, job.iterations)
        }
    }
}

/// Reads tokens from a file, one per line; blank lines and `#` comments are
/// skipped.
pub fn load_tokens(path: &Path) -> std::result::Result<Vec<String>, CliError> {
    let contents = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Builds an HTTP-backed client over a fresh pool of `tokens`.
pub fn open_client(
    tokens: Vec<String>,
    http: HttpOptions,
    opts: ClientOptions,
) -> std::result::Result<GraphClient<HttpTransport>, CliError> {
    let pool = CredentialPool::new(tokens);
    if pool.is_empty() {
        return Err(CliError::Message(
            "no access tokens given; pass --tokens, --tokens-file or set them in the config"
                .into(),
        ));
    }
    info!(tokens = pool.len(), base_url = %http.base_url, "cli.client.open");
    let transport = HttpTransport::new(http)?;
    Ok(GraphClient::new(transport, Arc::new(pool), opts))
}

/// Opens the output file for recording.
pub fn open_recorder(
    path: &Path,
    append: bool,
) -> std::result::Result<SampleRecorder<std::io::BufWriter<fs::File>>, CliError> {
    SampleRecorder::create(path, append).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}
