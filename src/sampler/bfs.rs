use std::collections::VecDeque;
use std::io::Write;

use rustc_hash::FxHashSet;
use tracing::info;

use crate::client::{FriendSource, Friends};
use crate::error::Result;
use crate::sampler::recorder::SampleRecorder;
use crate::sampler::{SampleContext, SampleReport, Sampler, SamplerKind, StopSignal, Tally};
use crate::types::UserId;

/// Breadth-first search from the root.
///
/// Friends are enqueued without a visited check; duplicates are dropped when
/// dequeued. A node that cannot be fetched is still marked visited so the
/// run never asks for it twice.
pub struct Bfs<G, W: Write> {
    ctx: SampleContext<G, W>,
}

impl<G: FriendSource, W: Write> Bfs<G, W> {
    /// Creates a sampler reading from `graph` and writing to `recorder`.
    pub fn new(graph: G, recorder: SampleRecorder<W>) -> Self {
        Self {
            ctx: SampleContext::new(graph, recorder),
        }
    }

    /// Stops the run early once `stop` is raised.
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.ctx.set_stop(stop);
        self
    }

    /// Graph source.
    pub fn graph(&self) -> &G {
        self.ctx.graph()
    }

    /// Sink the run writes to.
    pub fn recorder(&self) -> &SampleRecorder<W> {
        self.ctx.recorder()
    }

    /// Releases the graph source and the sink.
    pub fn into_parts(self) -> (G, SampleRecorder<W>) {
        self.ctx.into_parts()
    }

    fn expand(&mut self, root: UserId, tally: &mut Tally) -> Result<()> {
        let mut visited: FxHashSet<UserId> = FxHashSet::default();
        let mut frontier = VecDeque::from([root]);
        while tally.pending() && !self.ctx.should_stop(tally) {
            let Some(user) = frontier.pop_front() else {
                info!(counter = tally.counter, visited = visited.len(), "sampler.bfs.frontier_exhausted");
                break;
            };
            if !visited.insert(user) {
                tally.duplicates_skipped += 1;
                continue;
            }
            if let Friends::Found(friends) = self.ctx.fetch(user, tally)? {
                self.ctx.record(user, &friends, None, tally)?;
                frontier.extend(friends);
            }
        }
        Ok(())
    }
}

impl<G: FriendSource, W: Write> Sampler for Bfs<G, W> {
    fn run(&mut self, root: UserId, target: u64) -> Result<SampleReport> {
        let mut tally = Tally::new(SamplerKind::Bfs, root, target);
        match self.expand(root, &mut tally) {
            Ok(()) => self.ctx.finish(tally),
            Err(err) => Err(self.ctx.abort(err)),
        }
    }
}
