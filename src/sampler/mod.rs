//! Graph sampling strategies.
//!
//! Every sampler shares the same contract: starting from a root it fetches
//! friend lists through a [`FriendSource`], appends one record per successful
//! fetch to a [`SampleRecorder`], and stops once the counter exceeds the
//! iteration target. The counter starts at 1 and every recorded sample
//! advances it, so a completed run reports `target + 1`.

mod bfs;
mod mhrw;
mod recorder;
mod rw;
mod uni;

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::client::{Degree, FriendSource, Friends};
use crate::error::{Result, SamplerError};
use crate::types::UserId;

/// Breadth-first search.
pub use bfs::Bfs;
/// Metropolis-Hastings random walk.
pub use mhrw::{acceptance_threshold, Mhrw};
/// Record format and the append-only sink.
pub use recorder::{read_records, RecordParseError, SampleRecord, SampleRecorder};
/// Simple random walk.
pub use rw::RandomWalk;
/// Uniform sampling over the ID space.
pub use uni::{UniformOptions, UniformProbe, UniformRange, MAX_PROBE_OFFSET};

/// Default iteration target.
pub const DEFAULT_ITERATIONS: u64 = 10_000;

/// A sampling strategy.
pub trait Sampler {
    /// Samples from `root` until the counter exceeds `target`.
    ///
    /// Fatal failures abort the run; records written before the abort stay
    /// in the sink.
    fn run(&mut self, root: UserId, target: u64) -> Result<SampleReport>;
}

/// Identifies a sampling strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    /// Breadth-first search.
    Bfs,
    /// Simple random walk.
    Rw,
    /// Metropolis-Hastings random walk.
    Mhrw,
    /// Uniform sampling over user IDs.
    Uni,
}

impl SamplerKind {
    /// Short upper-case name used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            SamplerKind::Bfs => "BFS",
            SamplerKind::Rw => "RW",
            SamplerKind::Mhrw => "MHRW",
            SamplerKind::Uni => "UNI",
        }
    }
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SamplerKind {
    type Err = SamplerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bfs" => Ok(SamplerKind::Bfs),
            "rw" => Ok(SamplerKind::Rw),
            "mhrw" => Ok(SamplerKind::Mhrw),
            "uni" => Ok(SamplerKind::Uni),
            other => Err(SamplerError::InvalidArgument(format!(
                "unknown sampler '{other}'"
            ))),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    /// Strategy that produced the run.
    pub sampler: SamplerKind,
    /// Root the run started from.
    pub root: UserId,
    /// Iteration target requested.
    pub target: u64,
    /// Counter value at termination.
    pub final_counter: u64,
    /// Records appended to the sink.
    pub recorded: u64,
    /// Fetches that returned no usable data.
    pub misses: u64,
    /// MHRW proposals that were declined.
    pub rejections: u64,
    /// Nodes skipped because they were already visited or drawn.
    pub duplicates_skipped: u64,
    /// Whether the run ended on an external stop request.
    pub stopped: bool,
    /// Wall time of the run in milliseconds.
    pub duration_ms: f64,
}

/// Cooperative cancellation flag checked between iterations.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// A signal that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks running samplers to stop after their current iteration.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Random choices made by the samplers.
///
/// Implemented for every [`Rng`]; tests substitute fixed draws.
pub trait RandomSource {
    /// Uniform index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;

    /// Uniform value in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform integer in `low..=high`.
    fn between(&mut self, low: u64, high: u64) -> u64;
}

impl<R: Rng> RandomSource for R {
    fn pick(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }

    fn unit(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn between(&mut self, low: u64, high: u64) -> u64 {
        self.gen_range(low..=high)
    }
}

/// Graph access, sink and bookkeeping shared by every sampler.
pub(crate) struct SampleContext<G, W: Write> {
    graph: G,
    recorder: SampleRecorder<W>,
    stop: StopSignal,
}

impl<G: FriendSource, W: Write> SampleContext<G, W> {
    pub(crate) fn new(graph: G, recorder: SampleRecorder<W>) -> Self {
        Self {
            graph,
            recorder,
            stop: StopSignal::new(),
        }
    }

    pub(crate) fn set_stop(&mut self, stop: StopSignal) {
        self.stop = stop;
    }

    pub(crate) fn graph(&self) -> &G {
        &self.graph
    }

    pub(crate) fn recorder(&self) -> &SampleRecorder<W> {
        &self.recorder
    }

    pub(crate) fn into_parts(self) -> (G, SampleRecorder<W>) {
        (self.graph, self.recorder)
    }

    /// Checks the stop signal, marking the tally when it is raised.
    pub(crate) fn should_stop(&self, tally: &mut Tally) -> bool {
        if self.stop.is_stopped() {
            if !tally.stopped {
                info!(sampler = %tally.kind, counter = tally.counter, "sampler.stop_requested");
            }
            tally.stopped = true;
        }
        tally.stopped
    }

    /// Fetches the friends of `user`, counting misses.
    pub(crate) fn fetch(&mut self, user: UserId, tally: &mut Tally) -> Result<Friends> {
        let friends = self
            .graph
            .fetch_friends(user)
            .map_err(|err| SamplerError::from_client(err, tally.counter))?;
        match &friends {
            Friends::Found(_) => {}
            Friends::NoFriends => {
                tally.misses += 1;
                info!(sampler = %tally.kind, %user, "sampler.no_friends");
            }
            Friends::Missing => {
                tally.misses += 1;
                info!(sampler = %tally.kind, %user, "sampler.user_missing");
            }
            Friends::Unavailable => {
                tally.misses += 1;
                warn!(sampler = %tally.kind, %user, counter = tally.counter, "sampler.user_unavailable");
            }
        }
        Ok(friends)
    }

    /// Degree of `user` for MHRW acceptance.
    pub(crate) fn degree(&mut self, user: UserId, tally: &Tally) -> Result<Degree> {
        self.graph
            .fetch_degree(user)
            .map_err(|err| SamplerError::from_client(err, tally.counter))
    }

    /// Appends a record and advances the counter.
    ///
    /// `via` is the 1-based position of `user` in its parent's friend list
    /// for walk steps.
    pub(crate) fn record(
        &mut self,
        user: UserId,
        friends: &[UserId],
        via: Option<usize>,
        tally: &mut Tally,
    ) -> Result<()> {
        self.recorder.append(user, friends)?;
        match via {
            Some(position) => info!(
                sampler = %tally.kind,
                iteration = tally.counter,
                %user,
                position,
                "sampler.recorded"
            ),
            None => info!(
                sampler = %tally.kind,
                iteration = tally.counter,
                %user,
                "sampler.recorded"
            ),
        }
        tally.counter += 1;
        tally.recorded += 1;
        Ok(())
    }

    /// Flushes the sink and builds the report.
    pub(crate) fn finish(&mut self, tally: Tally) -> Result<SampleReport> {
        self.recorder.flush()?;
        let report = tally.into_report();
        info!(
            sampler = %report.sampler,
            final_counter = report.final_counter,
            recorded = report.recorded,
            misses = report.misses,
            rejections = report.rejections,
            stopped = report.stopped,
            duration_ms = report.duration_ms,
            "sampler.completed"
        );
        Ok(report)
    }

    /// Flushes what was recorded before propagating a fatal error.
    pub(crate) fn abort(&mut self, err: SamplerError) -> SamplerError {
        if let Err(flush_err) = self.recorder.flush() {
            warn!(error = %flush_err, "sampler.abort.flush_failed");
        }
        err
    }
}

/// Per-run counters.
pub(crate) struct Tally {
    pub(crate) kind: SamplerKind,
    pub(crate) root: UserId,
    pub(crate) target: u64,
    pub(crate) counter: u64,
    pub(crate) recorded: u64,
    pub(crate) misses: u64,
    pub(crate) rejections: u64,
    pub(crate) duplicates_skipped: u64,
    pub(crate) stopped: bool,
    started: Instant,
}

impl Tally {
    pub(crate) fn new(kind: SamplerKind, root: UserId, target: u64) -> Self {
        info!(sampler = %kind, %root, target, "sampler.started");
        Self {
            kind,
            root,
            target,
            counter: 1,
            recorded: 0,
            misses: 0,
            rejections: 0,
            duplicates_skipped: 0,
            stopped: false,
            started: Instant::now(),
        }
    }

    /// Whether the counter is still within the target.
    pub(crate) fn pending(&self) -> bool {
        self.counter <= self.target
    }

    fn into_report(self) -> SampleReport {
        SampleReport {
            sampler: self.kind,
            root: self.root,
            target: self.target,
            final_counter: self.counter,
            recorded: self.recorded,
            misses: self.misses,
            rejections: self.rejections,
            duplicates_skipped: self.duplicates_skipped,
            stopped: self.stopped,
            duration_ms: self.started.elapsed().as_secs_f64() * 1_000.0,
        }
    }
}
