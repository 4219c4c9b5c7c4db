//! Transaction payloads and the enrichments applied by the monitoring topology

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, TypesError};

/// Cities the generator draws from
pub const CITIES: [&str; 6] = ["Mumbai", "Pune", "Delhi", "Chennai", "Bangalore", "Hyderabad"];

/// Channels the generator draws from
pub const CHANNELS: [&str; 4] = ["ATM", "ONLINE", "BRANCH", "MOBILE"];

/// Reason attached to transactions flagged for scrutiny
pub const SCRUTINY_REASON: &str = "High-value transaction on ONLINE or MOBILE channel";

const SCRUTINY_THRESHOLD: f64 = 8000.0;
const MEDIUM_RISK_THRESHOLD: f64 = 1000.0;
const HIGH_RISK_THRESHOLD: f64 = 5000.0;

/// A payment transaction
///
/// Only the fields the monitoring steps read are required. The id is an opaque
/// string, and fields this type does not know are kept in `extra` and written
/// back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub transaction_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub channel: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    /// Event time in epoch milliseconds, when the payload carries one
    pub fn event_time_ms(&self) -> Option<i64> {
        self.timestamp.map(|timestamp| timestamp.timestamp_millis())
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_amount(self.amount)
    }

    /// High-value transaction on a remote channel
    pub fn needs_scrutiny(&self) -> bool {
        self.amount >= SCRUTINY_THRESHOLD
            && (self.channel.eq_ignore_ascii_case("ONLINE") || self.channel.eq_ignore_ascii_case("MOBILE"))
    }

    /// Copy with every digit of the customer id replaced by `*`
    pub fn masked(&self) -> Transaction {
        Transaction {
            customer_id: mask_digits(&self.customer_id),
            ..self.clone()
        }
    }

    pub fn scrutinized(mut self) -> ScrutinizedTransaction {
        self.extra.remove("HIGH_RISK");
        self.extra.remove("reason");
        ScrutinizedTransaction {
            transaction: self,
            high_risk: true,
            reason: SCRUTINY_REASON.to_string(),
        }
    }

    pub fn enriched(mut self) -> EnrichedTransaction {
        self.extra.remove("riskLevel");
        let risk_level = self.risk_level();
        EnrichedTransaction {
            transaction: self,
            risk_level,
        }
    }
}

/// Risk bucket derived from the transaction amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// LOW below 1000, MEDIUM below 5000, HIGH otherwise
    pub fn from_amount(amount: f64) -> Self {
        if amount < MEDIUM_RISK_THRESHOLD {
            RiskLevel::Low
        } else if amount < HIGH_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(TypesError::InvalidValue {
                field: "riskLevel",
                value: s.to_string(),
            }),
        }
    }
}

/// Transaction flagged for manual review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrutinizedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(rename = "HIGH_RISK")]
    pub high_risk: bool,
    pub reason: String,
}

/// Transaction annotated with its risk level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub risk_level: RiskLevel,
}

/// Replace every ASCII digit with `*`
pub fn mask_digits(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_digit() { '*' } else { c })
        .collect()
}
