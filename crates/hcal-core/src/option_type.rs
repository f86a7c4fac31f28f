//! Option side (call / put).

use serde::{Deserialize, Serialize};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    /// Right to buy at the strike.
    Call,
    /// Right to sell at the strike.
    Put,
}

impl OptionType {
    /// Return the payoff sign (+1 for Call, -1 for Put).
    pub fn sign(&self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }

    /// Side conventionally quoted for a given forward moneyness `K/F`:
    /// calls at or above the forward, puts below it.
    pub fn from_moneyness(moneyness: f64) -> Self {
        if moneyness >= 1.0 {
            OptionType::Call
        } else {
            OptionType::Put
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "Call"),
            OptionType::Put => write!(f, "Put"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_from_moneyness() {
        assert_eq!(OptionType::from_moneyness(1.0), OptionType::Call);
        assert_eq!(OptionType::from_moneyness(1.2), OptionType::Call);
        assert_eq!(OptionType::from_moneyness(0.999), OptionType::Put);
    }

    #[test]
    fn sign() {
        assert_eq!(OptionType::Call.sign(), 1.0);
        assert_eq!(OptionType::Put.sign(), -1.0);
    }
}
