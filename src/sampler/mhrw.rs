use std::io::Write;

use tracing::{debug, info};

use crate::client::{Degree, FriendSource, Friends};
use crate::error::Result;
use crate::sampler::recorder::SampleRecorder;
use crate::sampler::rw::WalkState;
use crate::sampler::{
    RandomSource, SampleContext, SampleReport, Sampler, SamplerKind, StopSignal, Tally,
};
use crate::types::UserId;

/// Metropolis-Hastings acceptance threshold for a proposed move.
///
/// A move from a node of degree `degree_parent` to one of degree
/// `degree_neighbour` is accepted when a uniform draw `p` satisfies
/// `p <= degree_parent / degree_neighbour`.
pub fn acceptance_threshold(degree_parent: usize, degree_neighbour: u64) -> f64 {
    degree_parent as f64 / degree_neighbour as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Moved,
    Rejected,
    Skipped,
}

/// Metropolis-Hastings random walk.
///
/// Proposals toward high-degree nodes are accepted with probability
/// `degree(parent) / degree(candidate)`, correcting the degree bias of the
/// simple walk. A rejected proposal leaves the walk in place and records
/// nothing.
pub struct Mhrw<G, W: Write, R> {
    ctx: SampleContext<G, W>,
    rng: R,
}

impl<G: FriendSource, W: Write, R: RandomSource> Mhrw<G, W, R> {
    /// Creates a walk drawing proposals and acceptance values from `rng`.
    pub fn new(graph: G, recorder: SampleRecorder<W>, rng: R) -> Self {
        Self {
            ctx: SampleContext::new(graph, recorder),
            rng,
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

    fn step(&mut self, state: &mut WalkState, tally: &mut Tally) -> Result<Step> {
        let degree_parent = state.friends.len();
        let (index, candidate) = state.candidate(&mut self.rng);
        let degree_neighbour = match self.ctx.degree(candidate, tally)? {
            Degree::Known(degree) if degree > 0 => degree,
            Degree::Unavailable => {
                debug!(parent = %state.position, %candidate, "sampler.mhrw.degree_unavailable");
                return Ok(Step::Skipped);
            }
            other => {
                debug!(parent = %state.position, %candidate, degree = ?other, "sampler.mhrw.degree_missing");
                state.reject_candidate(candidate, tally.counter)?;
                return Ok(Step::Skipped);
            }
        };
        let quotient = acceptance_threshold(degree_parent, degree_neighbour);
        // A single neighbour is always accepted, no draw needed.
        let p = if degree_parent == 1 {
            0.0
        } else {
            self.rng.unit()
        };
        if p > quotient {
            tally.rejections += 1;
            info!(parent = %state.position, %candidate, p, quotient, "sampler.mhrw.stay");
            return Ok(Step::Rejected);
        }
        match self.ctx.fetch(candidate, tally)? {
            Friends::Found(friends) => {
                self.ctx.record(candidate, &friends, Some(index + 1), tally)?;
                state.advance(candidate, friends);
                Ok(Step::Moved)
            }
            Friends::Unavailable => Ok(Step::Skipped),
            Friends::NoFriends | Friends::Missing => {
                state.reject_candidate(candidate, tally.counter)?;
                Ok(Step::Skipped)
            }
        }
    }

    fn walk(&mut self, root: UserId, tally: &mut Tally) -> Result<()> {
        let mut state = WalkState::start(&mut self.ctx, root, tally)?;
        while tally.pending() && !self.ctx.should_stop(tally) {
            self.step(&mut state, tally)?;
        }
        Ok(())
    }
}

impl<G: FriendSource, W: Write, R: RandomSource> Sampler for Mhrw<G, W, R> {
    fn run(&mut self, root: UserId, target: u64) -> Result<SampleReport> {
        let mut tally = Tally::new(SamplerKind::Mhrw, root, target);
        match self.walk(root, &mut tally) {
            Ok(()) => self.ctx.finish(tally),
            Err(err) => Err(self.ctx.abort(err)),
        }
    }
}
