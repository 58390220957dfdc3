use serde::{Deserialize, Serialize};

use crate::{impl_from_primitive, impl_money_ops};

pub mod trading;

/// Scalar learning signal handed back to the agent with every transition.
///
/// Measured in quote currency: realized profit, unrealized profit and the
/// opportunity cost of idle cash all add up in the same unit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Reward(pub f64);
impl_from_primitive!(Reward, f64);
impl_money_ops!(Reward, f64);

/// Lifecycle of a single episode.
///
/// ```md
/// Current State | Event                       | Next State
/// --------------|-----------------------------|-----------
/// `Init`        | account reset, t = 0 encoded | `Stepping`
/// `Stepping`    | t < trading_period          | `Stepping`
/// `Stepping`    | t == trading_period         | `Done`
/// ```
///
/// `Done` is terminal; the next episode starts again from `Init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeStatus {
    Init,
    Stepping,
    Done,
}

impl EpisodeStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Lifecycle of a whole training run.
///
/// Episodes are numbered from 1. `Finished` is reached after the last
/// episode and triggers final reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// No episode has started yet.
    Ready,

    /// The given episode is active.
    Episode(usize),

    /// All episodes have run.
    Finished,
}

impl RunStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}
