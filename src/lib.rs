pub mod ai;
pub mod config;
pub mod contract;
pub mod controller;
pub mod error;
pub mod plan;
pub mod portfolio;
pub mod render;
pub mod server;
pub mod strategy;
pub mod wallet;

use derive_more::{Add, AddAssign, Mul, Sum};
use serde::Serialize;

pub type Percent = f64;

/// A US dollar amount. Estimates only, derived from the price table.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, PartialOrd, Add, AddAssign, Mul, Sum, Serialize,
)]
pub struct Usd(pub f64);

impl Usd {
    pub fn share_of(self, total: Usd) -> Percent {
        if total.0 == 0.0 {
            return 0.0;
        }
        self.0 / total.0 * 100.0
    }
}

impl std::fmt::Display for Usd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
