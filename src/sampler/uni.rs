use std::io::Write;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::client::{FriendSource, Friends};
use crate::error::{Result, SamplerError};
use crate::sampler::recorder::SampleRecorder;
use crate::sampler::{
    RandomSource, SampleContext, SampleReport, Sampler, SamplerKind, StopSignal, Tally,
};
use crate::types::UserId;

/// Largest step between two probes of [`UniformProbe`].
pub const MAX_PROBE_OFFSET: u64 = 500;

/// Options shared by the uniform samplers.
#[derive(Clone, Debug)]
pub struct UniformOptions {
    /// Advance the counter on probes that return no data, not just on
    /// recorded samples.
    pub count_misses: bool,
}

impl Default for UniformOptions {
    fn default() -> Self {
        Self { count_misses: true }
    }
}

impl Tally {
    fn probe_missed(&mut self, user: UserId, count_misses: bool) {
        if count_misses {
            debug!(sampler = %self.kind, %user, counter = self.counter, "sampler.uni.miss_counted");
            self.counter += 1;
        }
    }
}

/// Probes IDs upward from the root in random strides of `1..=500`.
///
/// Every probe moves on to the next ID whether or not the current one exists.
pub struct UniformProbe<G, W: Write, R> {
    ctx: SampleContext<G, W>,
    rng: R,
    opts: UniformOptions,
}

impl<G: FriendSource, W: Write, R: RandomSource> UniformProbe<G, W, R> {
    /// Creates a probe sampler drawing strides from `rng`.
    pub fn new(graph: G, recorder: SampleRecorder<W>, rng: R, opts: UniformOptions) -> Self {
        Self {
            ctx: SampleContext::new(graph, recorder),
            rng,
            opts,
        }
    }

    /// Stops the run early once `stop` is raised.
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.ctx.set_stop(stop);
        self
    }

    /// Sink the run writes to.
    pub fn recorder(&self) -> &SampleRecorder<W> {
        self.ctx.recorder()
    }

    /// Releases the graph source and the sink.
    pub fn into_parts(self) -> (G, SampleRecorder<W>) {
        self.ctx.into_parts()
    }

    fn probe(&mut self, root: UserId, tally: &mut Tally) -> Result<()> {
        let mut user = root;
        let mut probes = 0u64;
        while tally.pending() && !self.ctx.should_stop(tally) {
            probes += 1;
            match self.ctx.fetch(user, tally)? {
                Friends::Found(friends) => self.ctx.record(user, &friends, None, tally)?,
                _ => tally.probe_missed(user, self.opts.count_misses),
            }
            let stride = self.rng.between(1, MAX_PROBE_OFFSET);
            user = match user.checked_add(stride) {
                Some(next) => next,
                None if tally.pending() => {
                    warn!(%user, probes, "sampler.uni.id_space_exhausted");
                    return Err(SamplerError::RangeExhausted {
                        drawn: probes,
                        counter: tally.counter,
                    });
                }
                None => break,
            };
        }
        Ok(())
    }
}

impl<G: FriendSource, W: Write, R: RandomSource> Sampler for UniformProbe<G, W, R> {
    fn run(&mut self, root: UserId, target: u64) -> Result<SampleReport> {
        let mut tally = Tally::new(SamplerKind::Uni, root, target);
        match self.probe(root, &mut tally) {
            Ok(()) => self.ctx.finish(tally),
            Err(err) => Err(self.ctx.abort(err)),
        }
    }
}

/// Draws IDs uniformly from `[root, end]` without replacement.
///
/// An ID that was already drawn is redrawn without touching the counter.
/// Once every ID of the range has been drawn the run fails instead of
/// spinning.
pub struct UniformRange<G, W: Write, R> {
    ctx: SampleContext<G, W>,
    rng: R,
    end: UserId,
    opts: UniformOptions,
}

impl<G: FriendSource, W: Write, R: RandomSource> UniformRange<G, W, R> {
    /// Creates a sampler over IDs up to and including `end`.
    pub fn new(
        graph: G,
        recorder: SampleRecorder<W>,
        rng: R,
        end: UserId,
        opts: UniformOptions,
    ) -> Self {
        Self {
            ctx: SampleContext::new(graph, recorder),
            rng,
            end,
            opts,
        }
    }

    /// Stops the run early once `stop` is raised.
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.ctx.set_stop(stop);
        self
    }

    /// Sink the run writes to.
    pub fn recorder(&self) -> &SampleRecorder<W> {
        self.ctx.recorder()
    }

    /// Releases the graph source and the sink.
    pub fn into_parts(self) -> (G, SampleRecorder<W>) {
        self.ctx.into_parts()
    }

    fn draw(&mut self, start: UserId, tally: &mut Tally) -> Result<()> {
        // `None` when the range covers the whole u64 space.
        let span = (self.end.0 - start.0).checked_add(1);
        let mut visited: FxHashSet<UserId> = FxHashSet::default();
        while tally.pending() && !self.ctx.should_stop(tally) {
            if span == Some(visited.len() as u64) {
                warn!(start = %start, end = %self.end, counter = tally.counter, "sampler.uni.range_exhausted");
                return Err(SamplerError::RangeExhausted {
                    drawn: visited.len() as u64,
                    counter: tally.counter,
                });
            }
            let user = UserId(self.rng.between(start.0, self.end.0));
            if !visited.insert(user) {
                tally.duplicates_skipped += 1;
                continue;
            }
            match self.ctx.fetch(user, tally)? {
                Friends::Found(friends) => self.ctx.record(user, &friends, None, tally)?,
                _ => tally.probe_missed(user, self.opts.count_misses),
            }
        }
        Ok(())
    }
}

impl<G: FriendSource, W: Write, R: RandomSource> Sampler for UniformRange<G, W, R> {
    fn run(&mut self, root: UserId, target: u64) -> Result<SampleReport> {
        if root > self.end {
            return Err(SamplerError::InvalidArgument(format!(
                "range start {root} is past range end {}",
                self.end
            )));
        }
        let mut tally = Tally::new(SamplerKind::Uni, root, target);
        match self.draw(root, &mut tally) {
            Ok(()) => self.ctx.finish(tally),
            Err(err) => Err(self.ctx.abort(err)),
        }
    }
}
