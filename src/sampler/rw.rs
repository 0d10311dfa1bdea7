use std::io::Write;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::client::{FriendSource, Friends};
use crate::error::{Result, SamplerError};
use crate::sampler::recorder::SampleRecorder;
use crate::sampler::{
    RandomSource, SampleContext, SampleReport, Sampler, SamplerKind, StopSignal, Tally,
};
use crate::types::{FriendSet, UserId};

/// Position of a walk and the friend list it draws the next step from.
#[derive(Debug)]
pub(crate) struct WalkState {
    pub(crate) position: UserId,
    pub(crate) friends: FriendSet,
    distinct: usize,
    failed: FxHashSet<UserId>,
}

impl WalkState {
    /// Fetches and records the root.
    pub(crate) fn start<G: FriendSource, W: Write>(
        ctx: &mut SampleContext<G, W>,
        root: UserId,
        tally: &mut Tally,
    ) -> Result<Self> {
        match ctx.fetch(root, tally)? {
            Friends::Found(friends) => {
                ctx.record(root, &friends, None, tally)?;
                Ok(Self::at(root, friends))
            }
            Friends::NoFriends => Err(SamplerError::DeadEnd {
                user: root,
                counter: tally.counter,
            }),
            Friends::Missing | Friends::Unavailable => Err(SamplerError::RootUnavailable(root)),
        }
    }

    fn at(position: UserId, friends: FriendSet) -> Self {
        let distinct = friends.iter().collect::<FxHashSet<_>>().len();
        Self {
            position,
            friends,
            distinct,
            failed: FxHashSet::default(),
        }
    }

    /// Candidate at `index` of the current friend list.
    pub(crate) fn candidate<R: RandomSource>(&self, rng: &mut R) -> (usize, UserId) {
        let index = rng.pick(self.friends.len());
        (index, self.friends[index])
    }

    /// Moves the walk to `next`.
    pub(crate) fn advance(&mut self, next: UserId, friends: FriendSet) {
        *self = Self::at(next, friends);
    }

    /// Notes that `candidate` can never be stepped to.
    ///
    /// Only permanent failures belong here; a candidate that was merely
    /// unavailable is drawn again later.
    ///
    /// Fails with [`SamplerError::DeadEnd`] once every distinct friend of the
    /// current position has failed, since the walk could never move again.
    pub(crate) fn reject_candidate(&mut self, candidate: UserId, counter: u64) -> Result<()> {
        self.failed.insert(candidate);
        if self.failed.len() >= self.distinct {
            warn!(user = %self.position, counter, "sampler.walk.dead_end");
            return Err(SamplerError::DeadEnd {
                user: self.position,
                counter,
            });
        }
        Ok(())
    }
}

/// Simple random walk without visited memory.
///
/// Each step moves to a uniformly chosen friend of the current node. A
/// friend that cannot be fetched leaves the walk where it is and the same
/// list is drawn from again. Only friends that are gone for good count
/// toward a dead end.
pub struct RandomWalk<G, W: Write, R> {
    ctx: SampleContext<G, W>,
    rng: R,
}

impl<G: FriendSource, W: Write, R: RandomSource> RandomWalk<G, W, R> {
    /// Creates a walk drawing its steps from `rng`.
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

    fn walk(&mut self, root: UserId, tally: &mut Tally) -> Result<()> {
        let mut state = WalkState::start(&mut self.ctx, root, tally)?;
        while tally.pending() && !self.ctx.should_stop(tally) {
            let (index, next) = state.candidate(&mut self.rng);
            match self.ctx.fetch(next, tally)? {
                Friends::Found(friends) => {
                    self.ctx.record(next, &friends, Some(index + 1), tally)?;
                    state.advance(next, friends);
                }
                Friends::Unavailable => {
                    debug!(from = %state.position, candidate = %next, "sampler.rw.stall_transient");
                }
                Friends::NoFriends | Friends::Missing => {
                    debug!(from = %state.position, candidate = %next, "sampler.rw.stall");
                    state.reject_candidate(next, tally.counter)?;
                }
            }
        }
        Ok(())
    }
}

impl<G: FriendSource, W: Write, R: RandomSource> Sampler for RandomWalk<G, W, R> {
    fn run(&mut self, root: UserId, target: u64) -> Result<SampleReport> {
        let mut tally = Tally::new(SamplerKind::Rw, root, target);
        match self.walk(root, &mut tally) {
            Ok(()) => self.ctx.finish(tally),
            Err(err) => Err(self.ctx.abort(err)),
        }
    }
}
