//! The execution context of one party, and an in-process simulation of both parties.
//!
//! Each party runs the same operator calls on its own [`Context`], with its own shares. The
//! calls exchange messages over the context's [`Channel`] and draw correlated randomness from
//! its [`TripleSource`]. Since control flow depends only on public shapes, both parties execute
//! the exact same schedule of rounds and tags.

use std::{fmt, future::Future, sync::Arc};

use futures::future::try_join;
use tracing::{Level, instrument};

use crate::{
    Error,
    channel::{Channel, SimpleChannel},
    config::EngineConfig,
    dealer::{SeededDealer, TripleSource},
    share::Party,
};

/// Everything one party needs to run operators: its role, a channel to the other party, a
/// source of Beaver triples and the engine configuration.
pub struct Context<C> {
    party: Party,
    channel: C,
    dealer: Arc<dyn TripleSource>,
    config: EngineConfig,
}

impl<C> fmt::Debug for Context<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("party", &self.party)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Channel> Context<C> {
    /// Creates the context of `party`, rejecting invalid configurations.
    pub fn new(
        party: Party,
        channel: C,
        dealer: Arc<dyn TripleSource>,
        config: EngineConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            party,
            channel,
            dealer,
            config,
        })
    }

    /// The party this context belongs to.
    pub fn party(&self) -> Party {
        self.party
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn channel(&self) -> &C {
        &self.channel
    }

    pub(crate) fn dealer(&self) -> &dyn TripleSource {
        self.dealer.as_ref()
    }
}

/// Runs `run` for both parties concurrently, connected by a [`SimpleChannel`] and using a
/// [`SeededDealer`] derived from `seed`.
///
/// `run` is called once per party with that party's [`Context`]; it typically picks the
/// party's input shares via [`Context::party`] and then calls operators.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub async fn simulate<T, F, Fut>(config: EngineConfig, seed: u64, run: F) -> Result<(T, T), Error>
where
    F: Fn(Context<SimpleChannel>) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let (channel0, channel1) = SimpleChannel::pair();
    let (dealer0, dealer1) = SeededDealer::pair(seed);
    let ctx0 = Context::new(Party::P0, channel0, Arc::new(dealer0), config.clone())?;
    let ctx1 = Context::new(Party::P1, channel1, Arc::new(dealer1), config)?;
    try_join(run(ctx0), run(ctx1)).await
}
