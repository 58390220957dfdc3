use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{impl_from_primitive, impl_money_ops};

// ================================================================================================
// Domain Strong Types (NewTypes)
// ================================================================================================

/// Represents a market price level in the quote currency.
///
/// Used for: daily close prices and the purchase price of every held lot.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Price(pub f64);
impl_from_primitive!(Price, f64);
impl_money_ops!(Price, f64);

/// Represents an amount of quote currency held by an account.
///
/// Used for: the cash balance, portfolio valuations and episode returns.
/// Buying a lot spends `Cash`, selling a lot earns it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Cash(pub f64);
impl_from_primitive!(Cash, f64);
impl_money_ops!(Cash, f64);

impl From<Price> for Cash {
    fn from(price: Price) -> Self {
        Self(price.0)
    }
}

impl std::ops::Add<Price> for Cash {
    type Output = Self;

    fn add(self, rhs: Price) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub<Price> for Cash {
    type Output = Self;

    fn sub(self, rhs: Price) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Cash {
    /// Value of `lots` units marked at `price`.
    pub fn marked(price: Price, lots: usize) -> Self {
        Self(price.0 * lots as f64)
    }

    /// `true` if this amount strictly exceeds `price`.
    pub fn covers(self, price: Price) -> bool {
        self.0 > price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl fmt::Display for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
