//! Order payloads and per-city order statistics

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TypesError};

/// A single order as read from the orders topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub city: String,
    pub price: f64,
}

impl Order {
    pub fn new<S: Into<String>>(city: S, price: f64) -> Self {
        Self {
            city: city.into(),
            price,
        }
    }

    /// Reject orders that cannot be aggregated meaningfully
    pub fn validate(&self) -> Result<()> {
        if self.city.trim().is_empty() {
            return Err(TypesError::Validation("city must not be empty".to_string()));
        }
        if !self.price.is_finite() {
            return Err(TypesError::Validation(format!(
                "price must be finite, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

/// Running count and total of orders for one city
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityStats {
    pub order_count: u64,
    pub total_amount: f64,
}

impl CityStats {
    /// Statistics after one more order of `amount`
    pub fn record(self, amount: f64) -> Self {
        Self {
            order_count: self.order_count + 1,
            total_amount: self.total_amount + amount,
        }
    }
}

/// City statistics as published downstream, with the city spelled out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityStatsOutput {
    pub city: String,
    pub order_count: u64,
    pub total_amount: f64,
}

impl CityStatsOutput {
    pub fn new<S: Into<String>>(city: S, stats: CityStats) -> Self {
        Self {
            city: city.into(),
            order_count: stats.order_count,
            total_amount: stats.total_amount,
        }
    }
}
