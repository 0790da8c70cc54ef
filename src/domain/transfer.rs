use serde::Deserialize;

/// A single requested movement of funds. Produced and consumed within one
/// engine call, never persisted.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: i64,
}

impl TransferRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: i64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }
}
