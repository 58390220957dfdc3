use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::data::domain::{Cash, Price};

/// The trading state of one agent within an episode.
///
/// The `Account` holds the cash balance, the FIFO inventory of purchase
/// prices, and the episode statistics read by reporting. It is reset at the
/// start of every episode; learned agent parameters live elsewhere and are
/// never touched by a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    balance: Cash,
    inventory: VecDeque<Price>,
    initial_portfolio_value: Cash,
    portfolio_values: Vec<Cash>,
    return_rates: Vec<f64>,
}

impl Account {
    pub fn new(initial_funding: Cash) -> Self {
        Self {
            balance: initial_funding,
            inventory: VecDeque::new(),
            initial_portfolio_value: initial_funding,
            portfolio_values: Vec::new(),
            return_rates: Vec::new(),
        }
    }

    /// Restores the freshly funded state and clears episode statistics.
    pub fn reset(&mut self, initial_funding: Cash) {
        self.balance = initial_funding;
        self.initial_portfolio_value = initial_funding;
        self.inventory.clear();
        self.portfolio_values.clear();
        self.return_rates.clear();
    }

    pub fn balance(&self) -> Cash {
        self.balance
    }

    /// Held lots, oldest first.
    pub fn inventory(&self) -> &VecDeque<Price> {
        &self.inventory
    }

    pub fn holdings(&self) -> usize {
        self.inventory.len()
    }

    pub fn initial_portfolio_value(&self) -> Cash {
        self.initial_portfolio_value
    }

    pub fn portfolio_values(&self) -> &[Cash] {
        &self.portfolio_values
    }

    pub fn return_rates(&self) -> &[f64] {
        &self.return_rates
    }

    /// Cheapest lot ever bought among those still held.
    pub fn cheapest_lot(&self) -> Option<Price> {
        self.inventory
            .iter()
            .copied()
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// `holdings * price + balance`.
    pub fn portfolio_value(&self, price: Price) -> Cash {
        Cash::marked(price, self.holdings()) + self.balance
    }

    // ============================================================================
    // Mutation (execution engine and episode bookkeeping only)
    // ============================================================================

    pub(crate) fn debit_lot(&mut self, price: Price) {
        self.balance = self.balance - price;
        self.inventory.push_back(price);
    }

    /// Sells the oldest lot at `price`, returning its purchase price.
    pub(crate) fn credit_oldest_lot(&mut self, price: Price) -> Option<Price> {
        let bought = self.inventory.pop_front()?;
        self.balance = self.balance + price;
        Some(bought)
    }

    pub(crate) fn record_step(&mut self, portfolio_value: Cash, return_rate: f64) {
        self.portfolio_values.push(portfolio_value);
        self.return_rates.push(return_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_funding_and_clears_state() {
        let mut account = Account::new(Cash(1000.0));
        account.debit_lot(Price(100.0));
        account.record_step(Cash(1000.0), 0.0);

        account.reset(Cash(500.0));

        assert_eq!(account.balance(), Cash(500.0));
        assert_eq!(account.initial_portfolio_value(), Cash(500.0));
        assert!(account.inventory().is_empty());
        assert!(account.portfolio_values().is_empty());
        assert!(account.return_rates().is_empty());
    }

    #[test]
    fn lots_leave_in_purchase_order() {
        let mut account = Account::new(Cash(1000.0));
        account.debit_lot(Price(15.0));
        account.debit_lot(Price(8.0));

        assert_eq!(account.cheapest_lot(), Some(Price(8.0)));
        assert_eq!(account.credit_oldest_lot(Price(12.0)), Some(Price(15.0)));
        assert_eq!(account.credit_oldest_lot(Price(12.0)), Some(Price(8.0)));
        assert_eq!(account.credit_oldest_lot(Price(12.0)), None);
        assert_eq!(account.balance(), Cash(1001.0));
    }

    #[test]
    fn portfolio_value_marks_inventory_at_price() {
        let mut account = Account::new(Cash(100.0));
        account.debit_lot(Price(10.0));
        account.debit_lot(Price(20.0));
        assert_eq!(account.portfolio_value(Price(30.0)), Cash(130.0));
    }
}
