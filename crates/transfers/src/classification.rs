use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl TransferPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPriority::Low => "low",
            TransferPriority::Normal => "normal",
            TransferPriority::High => "high",
            TransferPriority::Urgent => "urgent",
        }
    }
}

/// Business reason the stock is being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    Replenishment,
    Emergency,
    Seasonal,
    Promotion,
    Rebalancing,
    SlowMoving,
    Other,
}

impl TransferReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferReason::Replenishment => "replenishment",
            TransferReason::Emergency => "emergency",
            TransferReason::Seasonal => "seasonal",
            TransferReason::Promotion => "promotion",
            TransferReason::Rebalancing => "rebalancing",
            TransferReason::SlowMoving => "slow_moving",
            TransferReason::Other => "other",
        }
    }
}
