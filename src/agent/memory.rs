use std::collections::VecDeque;

use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};

use crate::gym::{
    Reward,
    trading::{action::Decision, observation::Observation},
};

/// One step of experience: `(state, decision, reward, next_state, done)`.
///
/// `decision` carries both the discrete action and the score vector, so a
/// value learner can train on the action index while a policy learner
/// trains on the scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Observation,
    pub decision: Decision,
    pub reward: Reward,
    pub next_state: Observation,
    pub done: bool,
}

/// Bounded FIFO replay buffer; the oldest transition is evicted when full.
#[derive(Debug, Clone)]
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Draws up to `size` distinct transitions uniformly at random.
    pub fn sample<R: Rng>(&self, rng: &mut R, size: usize) -> Vec<&Transition> {
        let amount = size.min(self.buffer.len());
        index::sample(rng, self.buffer.len(), amount)
            .into_iter()
            .map(|i| &self.buffer[i])
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::gym::trading::action::{ActionKind, ActionScores};

    fn transition(reward: f64) -> Transition {
        Transition {
            state: Observation::from(vec![0.0, 1.0]),
            decision: Decision {
                action: ActionKind::Hold,
                scores: ActionScores::default(),
            },
            reward: Reward(reward),
            next_state: Observation::from(vec![1.0, 0.0]),
            done: false,
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut memory = ReplayMemory::with_capacity(2);
        memory.push(transition(1.0));
        memory.push(transition(2.0));
        memory.push(transition(3.0));

        let rewards: Vec<f64> = memory.iter().map(|t| t.reward.0).collect();
        assert_eq!(rewards, vec![2.0, 3.0]);
    }

    #[test]
    fn sample_is_distinct_and_bounded() {
        let mut memory = ReplayMemory::with_capacity(10);
        for i in 0..5 {
            memory.push(transition(i as f64));
        }
        let mut rng = StdRng::seed_from_u64(3);

        let batch = memory.sample(&mut rng, 3);
        assert_eq!(batch.len(), 3);
        let mut rewards: Vec<i64> = batch.iter().map(|t| t.reward.0 as i64).collect();
        rewards.sort();
        rewards.dedup();
        assert_eq!(rewards.len(), 3);

        assert_eq!(memory.sample(&mut rng, 50).len(), 5);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut memory = ReplayMemory::with_capacity(0);
        memory.push(transition(1.0));
        assert!(memory.is_empty());
    }
}
