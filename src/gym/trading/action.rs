use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{AgentError, TraderResult};

// ================================================================================================
// Discrete Action
// ================================================================================================

/// The three execution semantics every agent decision resolves to.
///
/// The discriminant is the index of the action in a score vector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    EnumCount,
    Display,
)]
pub enum ActionKind {
    Hold = 0,
    Buy = 1,
    Sell = 2,
}

impl ActionKind {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> TraderResult<Self> {
        Self::iter().nth(index).ok_or_else(|| {
            AgentError::InvalidInput(format!(
                "Action index {index} outside 0..{}",
                Self::COUNT
            ))
            .into()
        })
    }
}

// ================================================================================================
// Action Scores
// ================================================================================================

/// One score per [`ActionKind`], indexed by discriminant.
///
/// For value-based agents these are Q-values; for policy agents they are
/// action preferences. Only their ranking matters to the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionScores(pub [f64; ActionKind::COUNT]);

impl ActionScores {
    pub fn get(&self, action: ActionKind) -> f64 {
        self.0[action.index()]
    }

    /// Actions ordered by ascending score. The sort is stable, so among
    /// equal scores the lower index ranks lower.
    pub fn ascending(&self) -> [ActionKind; ActionKind::COUNT] {
        let mut ranked = [ActionKind::Hold, ActionKind::Buy, ActionKind::Sell];
        ranked.sort_by(|a, b| self.get(*a).total_cmp(&self.get(*b)));
        ranked
    }

    /// Arg-max; the lowest index wins a tie.
    pub fn best(&self) -> ActionKind {
        let mut best = ActionKind::Hold;
        for action in [ActionKind::Buy, ActionKind::Sell] {
            if self.get(action) > self.get(best) {
                best = action;
            }
        }
        best
    }

    /// The middle of the ascending order.
    pub fn second_best(&self) -> ActionKind {
        self.ascending()[1]
    }

    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Raises `action` to the current maximum score.
    pub fn boosted(mut self, action: ActionKind) -> Self {
        self.0[action.index()] = self.max();
        self
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<&[f64]> for ActionScores {
    type Error = crate::error::TraderError;

    fn try_from(values: &[f64]) -> TraderResult<Self> {
        let scores: [f64; ActionKind::COUNT] = values.try_into().map_err(|_| {
            AgentError::InvalidInput(format!(
                "Expected {} action scores, got {}",
                ActionKind::COUNT,
                values.len()
            ))
        })?;
        Ok(Self(scores))
    }
}

// ================================================================================================
// Decision
// ================================================================================================

/// What an agent chose for one step: the discrete action to execute and the
/// score vector it was derived from.
///
/// The discrete action may differ from `scores.best()` when the agent
/// explores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: ActionKind,
    pub scores: ActionScores,
}

impl Decision {
    /// Greedy decision: the arg-max of `scores`.
    pub fn greedy(scores: ActionScores) -> Self {
        Self {
            action: scores.best(),
            scores,
        }
    }

    pub fn is_exploration(&self) -> bool {
        self.action != self.scores.best()
    }
}
