use std::fmt;

use crate::{
    data::domain::Price,
    gym::{
        Reward,
        trading::{
            action::{ActionKind, ActionScores, Decision},
            ledger::Account,
        },
    },
};

/// The effect of an action that changed the account.
///
/// A refused or idle action is represented by `None` at the call site, never
/// by an `Execution`.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// What actually happened to the account (`Buy` or `Sell`).
    pub executed: ActionKind,

    /// Price the lot traded at.
    pub price: Price,

    /// `price - purchase price` for a sale, zero for a purchase.
    pub realized_profit: Reward,

    /// Replacement scores when a hold was converted into a sale.
    pub scores: Option<ActionScores>,
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.executed {
            ActionKind::Sell => write!(
                f,
                "Sell: {} | Profit: ${:.2}",
                self.price, self.realized_profit.0
            ),
            other => write!(f, "{other}: {}", self.price),
        }
    }
}

/// Dispatches a decision to the matching execution semantics.
pub fn execute(account: &mut Account, decision: &Decision, price: Price) -> Option<Execution> {
    let outcome = match decision.action {
        ActionKind::Hold => hold(account, price, decision.scores),
        ActionKind::Buy => buy(account, price),
        ActionKind::Sell => sell(account, price),
    };

    match &outcome {
        Some(execution) => tracing::debug!(
            action = %decision.action,
            result = %execution,
            "Action Executed"
        ),
        None => tracing::debug!(action = %decision.action, "Action Had No Effect"),
    }

    outcome
}

/// Buys one lot at `price` if the balance strictly exceeds it.
pub fn buy(account: &mut Account, price: Price) -> Option<Execution> {
    if !account.balance().covers(price) {
        return None;
    }
    account.debit_lot(price);
    Some(Execution {
        executed: ActionKind::Buy,
        price,
        realized_profit: Reward(0.0),
        scores: None,
    })
}

/// Sells the oldest held lot at `price`.
pub fn sell(account: &mut Account, price: Price) -> Option<Execution> {
    let bought = account.credit_oldest_lot(price)?;
    Some(Execution {
        executed: ActionKind::Sell,
        price,
        realized_profit: Reward((price - bought).0),
        scores: None,
    })
}

/// Holds, unless selling is the runner-up choice and would be profitable.
///
/// The override fires iff the second-ranked action is `Sell`, the inventory
/// is non-empty and `price` exceeds the cheapest held lot. It then sells the
/// oldest lot and raises the `Sell` score to the maximum score. Otherwise
/// nothing is mutated.
pub fn hold(account: &mut Account, price: Price, scores: ActionScores) -> Option<Execution> {
    if scores.second_best() != ActionKind::Sell {
        return None;
    }

    let cheapest = account.cheapest_lot()?;
    if (price - cheapest).0 <= 0.0 {
        return None;
    }

    let mut execution = sell(account, price)?;
    execution.scores = Some(scores.boosted(ActionKind::Sell));
    Some(execution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::Cash;

    fn account_with_lots(balance: f64, lots: &[f64]) -> Account {
        let mut account = Account::new(Cash(balance + lots.iter().sum::<f64>()));
        for lot in lots {
            account.debit_lot(Price(*lot));
        }
        account
    }

    /// Scores ranking Buy first and Sell second.
    fn sell_runner_up() -> ActionScores {
        ActionScores([0.1, 0.6, 0.3])
    }

    // ========================================================================
    // Buy
    // ========================================================================

    #[test]
    fn buy_appends_lot_and_spends_balance() {
        let mut account = account_with_lots(100.0, &[]);
        let execution = buy(&mut account, Price(40.0)).expect("buy should execute");

        assert_eq!(execution.executed, ActionKind::Buy);
        assert_eq!(execution.realized_profit, Reward(0.0));
        assert_eq!(execution.to_string(), "Buy: $40.00");
        assert_eq!(account.balance(), Cash(60.0));
        assert_eq!(account.inventory().back(), Some(&Price(40.0)));
    }

    #[test]
    fn buy_is_refused_when_price_meets_balance() {
        let mut account = account_with_lots(40.0, &[]);
        assert!(buy(&mut account, Price(40.0)).is_none());
        assert!(buy(&mut account, Price(41.0)).is_none());
        assert_eq!(account.balance(), Cash(40.0));
        assert!(account.inventory().is_empty());
    }

    // ========================================================================
    // Sell
    // ========================================================================

    #[test]
    fn sell_pops_oldest_lot_and_reports_profit() {
        let mut account = account_with_lots(0.0, &[15.0, 8.0]);
        let execution = sell(&mut account, Price(12.0)).expect("sell should execute");

        assert_eq!(execution.realized_profit, Reward(-3.0));
        assert_eq!(execution.to_string(), "Sell: $12.00 | Profit: $-3.00");
        assert_eq!(account.holdings(), 1);
        assert_eq!(account.inventory().front(), Some(&Price(8.0)));
        assert_eq!(account.balance(), Cash(12.0));
    }

    #[test]
    fn sell_with_empty_inventory_is_a_no_op() {
        let mut account = account_with_lots(100.0, &[]);
        assert!(sell(&mut account, Price(12.0)).is_none());
        assert_eq!(account.balance(), Cash(100.0));
    }

    // ========================================================================
    // Hold
    // ========================================================================

    #[test]
    fn hold_overrides_into_profitable_sale() {
        // prices [10, 8, 12], bought at 8, now at t = 2
        let mut account = account_with_lots(100.0, &[8.0]);
        let execution =
            hold(&mut account, Price(12.0), sell_runner_up()).expect("override should fire");

        assert_eq!(execution.executed, ActionKind::Sell);
        assert_eq!(execution.realized_profit, Reward(4.0));
        assert_eq!(execution.scores, Some(ActionScores([0.1, 0.6, 0.6])));
        assert!(account.inventory().is_empty());
        assert_eq!(account.balance(), Cash(112.0));
    }

    #[test]
    fn hold_does_not_sell_at_a_loss() {
        let mut account = account_with_lots(100.0, &[15.0]);
        let before = account.clone();

        assert!(hold(&mut account, Price(12.0), sell_runner_up()).is_none());
        assert_eq!(account, before);
    }

    #[test]
    fn hold_does_not_sell_at_break_even() {
        let mut account = account_with_lots(100.0, &[12.0]);
        assert!(hold(&mut account, Price(12.0), sell_runner_up()).is_none());
        assert_eq!(account.holdings(), 1);
    }

    #[test]
    fn hold_requires_sell_as_runner_up() {
        let mut account = account_with_lots(100.0, &[8.0]);
        let before = account.clone();

        // Sell ranked first
        assert!(hold(&mut account, Price(12.0), ActionScores([0.3, 0.1, 0.6])).is_none());
        // Sell ranked last
        assert!(hold(&mut account, Price(12.0), ActionScores([0.6, 0.3, 0.1])).is_none());
        assert_eq!(account, before);
    }

    #[test]
    fn one_hot_hold_treats_tied_sell_as_runner_up() {
        let mut account = account_with_lots(100.0, &[8.0]);
        let execution = hold(&mut account, Price(12.0), ActionScores([1.0, 0.0, 0.0]))
            .expect("override should fire");

        assert_eq!(execution.scores, Some(ActionScores([1.0, 0.0, 1.0])));
        assert!(account.inventory().is_empty());

        // Sell tied with Hold at the top: Hold ranks lower and sits in the middle.
        let mut account = account_with_lots(100.0, &[8.0]);
        assert!(hold(&mut account, Price(12.0), ActionScores([0.6, 0.1, 0.6])).is_none());
    }

    #[test]
    fn hold_with_empty_inventory_is_a_no_op() {
        let mut account = account_with_lots(100.0, &[]);
        assert!(hold(&mut account, Price(12.0), sell_runner_up()).is_none());
        assert_eq!(account.balance(), Cash(100.0));
    }

    #[test]
    fn hold_compares_cheapest_but_sells_oldest() {
        let mut account = account_with_lots(0.0, &[15.0, 8.0]);
        let execution =
            hold(&mut account, Price(12.0), sell_runner_up()).expect("override should fire");

        // cheapest lot (8) makes it profitable, FIFO sells the 15 lot
        assert_eq!(execution.realized_profit, Reward(-3.0));
        assert_eq!(account.inventory().front(), Some(&Price(8.0)));
    }

    #[test]
    fn execute_dispatches_on_action() {
        let mut account = account_with_lots(100.0, &[]);
        let buy_decision = Decision {
            action: ActionKind::Buy,
            scores: ActionScores([0.0, 1.0, 0.0]),
        };
        assert!(execute(&mut account, &buy_decision, Price(10.0)).is_some());
        assert_eq!(account.holdings(), 1);

        let sell_decision = Decision {
            action: ActionKind::Sell,
            scores: ActionScores([0.0, 0.0, 1.0]),
        };
        let execution = execute(&mut account, &sell_decision, Price(11.0)).unwrap();
        assert_eq!(execution.realized_profit, Reward(1.0));
        assert_eq!(account.holdings(), 0);
    }
}
