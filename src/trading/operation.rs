//! Operation specifications and builder payloads
//!
//! A `BuildRequest` is assembled from an `OperationSpec` and a public address
//! string. It never sees a `Wallet`, so secret material has no path into it.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::balance::AssetId;
use crate::error::{Error, Result};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Fixed decimal amount or a percentage of the holding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amount {
    Fixed(f64),
    Percent(f64),
}

impl Amount {
    pub fn is_percent(&self) -> bool {
        matches!(self, Amount::Percent(_))
    }
}

impl FromStr for Amount {
    type Err = Error;

    /// Accepts "0.25" or "50%"
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (number, is_percent) = match s.strip_suffix('%') {
            Some(n) => (n.trim(), true),
            None => (s, false),
        };
        let value: f64 = number
            .parse()
            .map_err(|_| Error::InvalidAmount(s.to_string()))?;

        if !value.is_finite() || value <= 0.0 {
            return Err(Error::InvalidAmount(s.to_string()));
        }
        if is_percent {
            if value > 100.0 {
                return Err(Error::InvalidPercent(value));
            }
            Ok(Amount::Percent(value))
        } else {
            Ok(Amount::Fixed(value))
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Fixed(v) => write!(f, "{}", v),
            Amount::Percent(v) => write!(f, "{}%", v),
        }
    }
}

/// Venue trade parameters
#[derive(Debug, Clone, PartialEq)]
pub struct VenueTrade {
    /// Builder-side pool name ("pump", "raydium", "pump-amm", ...)
    pub pool: String,
    pub side: TradeSide,
    /// Token mint address
    pub token: String,
    /// SOL for buys, percentage of holding for sells
    pub amount: Amount,
    /// Slippage percentage (e.g. 25 for 25%)
    pub slippage_pct: u32,
    /// Priority fee in SOL
    pub priority_fee: f64,
}

/// Logical operation to run through the signing pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum OperationSpec {
    /// Burn tokens of `asset` held by the source wallet
    Burn { asset: AssetId, amount: Amount },
    /// Send SOL (no asset) or tokens to `destination`
    Transfer {
        destination: String,
        asset: Option<AssetId>,
        amount: Amount,
    },
    /// Sweep the whole SOL or asset balance to `destination`
    Consolidate {
        destination: String,
        asset: Option<AssetId>,
    },
    /// Buy or sell on a trading venue
    VenueTrade(VenueTrade),
}

impl OperationSpec {
    /// Action name sent to the builder
    pub fn action(&self) -> &'static str {
        match self {
            OperationSpec::Burn { .. } => "burn",
            OperationSpec::Transfer { .. } => "transfer",
            OperationSpec::Consolidate { .. } => "consolidate",
            OperationSpec::VenueTrade(t) => match t.side {
                TradeSide::Buy => "buy",
                TradeSide::Sell => "sell",
            },
        }
    }

    /// Builder payload for one source wallet, from public data only
    pub fn build_request(&self, source_address: &str) -> BuildRequest {
        let mut request = BuildRequest {
            action: self.action(),
            public_key: source_address.to_string(),
            mint: None,
            destination: None,
            amount: None,
            denominated_in_sol: None,
            slippage: None,
            priority_fee: None,
            pool: None,
        };

        match self {
            OperationSpec::Burn { asset, amount } => {
                request.mint = Some(asset.to_string());
                request.amount = Some(amount.to_string());
            }
            OperationSpec::Transfer {
                destination,
                asset,
                amount,
            } => {
                request.mint = asset.as_ref().map(|a| a.to_string());
                request.destination = Some(destination.clone());
                request.amount = Some(amount.to_string());
                request.denominated_in_sol = Some(asset.is_none().to_string());
            }
            OperationSpec::Consolidate { destination, asset } => {
                request.mint = asset.as_ref().map(|a| a.to_string());
                request.destination = Some(destination.clone());
                request.amount = Some("100%".to_string());
                request.denominated_in_sol = Some(asset.is_none().to_string());
            }
            OperationSpec::VenueTrade(trade) => {
                request.mint = Some(trade.token.clone());
                request.amount = Some(trade.amount.to_string());
                request.denominated_in_sol =
                    Some((trade.side == TradeSide::Buy && !trade.amount.is_percent()).to_string());
                request.slippage = Some(trade.slippage_pct);
                request.priority_fee = Some(trade.priority_fee);
                request.pool = Some(trade.pool.clone());
            }
        }

        request
    }
}

impl fmt::Display for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationSpec::Burn { asset, amount } => write!(f, "burn {} of {}", amount, asset),
            OperationSpec::Transfer {
                destination,
                asset,
                amount,
            } => write!(
                f,
                "transfer {} {} to {}",
                amount,
                asset.as_ref().map(|a| a.as_str()).unwrap_or("SOL"),
                destination
            ),
            OperationSpec::Consolidate { destination, asset } => write!(
                f,
                "consolidate {} to {}",
                asset.as_ref().map(|a| a.as_str()).unwrap_or("SOL"),
                destination
            ),
            OperationSpec::VenueTrade(t) => {
                write!(f, "{} {} of {} on {}", t.side, t.amount, t.token, t.pool)
            }
        }
    }
}

/// Request body sent to the transaction builder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    /// "buy", "sell", "transfer", "consolidate" or "burn"
    pub action: &'static str,
    /// Source wallet address (fee payer and signer)
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Decimal amount or percentage ("0.5", "100%")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denominated_in_sol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parsing() {
        assert_eq!("0.5".parse::<Amount>().unwrap(), Amount::Fixed(0.5));
        assert_eq!("50%".parse::<Amount>().unwrap(), Amount::Percent(50.0));
        assert!(matches!("0%".parse::<Amount>(), Err(Error::InvalidAmount(_))));
        assert!(matches!("101%".parse::<Amount>(), Err(Error::InvalidPercent(_))));
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn test_trade_request_serialization() {
        let op = OperationSpec::VenueTrade(VenueTrade {
            pool: "pump".to_string(),
            side: TradeSide::Buy,
            token: "DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK".to_string(),
            amount: Amount::Fixed(0.01),
            slippage_pct: 25,
            priority_fee: 0.0005,
        });

        let json = serde_json::to_string(&op.build_request("Payer111")).unwrap();
        assert!(json.contains("\"action\":\"buy\""));
        assert!(json.contains("\"publicKey\":\"Payer111\""));
        assert!(json.contains("\"denominatedInSol\":\"true\""));
        assert!(!json.contains("destination"));
    }

    #[test]
    fn test_sell_percentage() {
        let op = OperationSpec::VenueTrade(VenueTrade {
            pool: "pump".to_string(),
            side: TradeSide::Sell,
            token: "test".to_string(),
            amount: Amount::Percent(100.0),
            slippage_pct: 25,
            priority_fee: 0.0005,
        });

        let json = serde_json::to_string(&op.build_request("Payer111")).unwrap();
        assert!(json.contains("\"amount\":\"100%\""));
        assert!(json.contains("\"denominatedInSol\":\"false\""));
    }

    #[test]
    fn test_consolidate_sweeps_everything() {
        let op = OperationSpec::Consolidate {
            destination: "Vault111".to_string(),
            asset: None,
        };
        let request = op.build_request("Src111");
        assert_eq!(request.amount.as_deref(), Some("100%"));
        assert_eq!(request.destination.as_deref(), Some("Vault111"));
        assert_eq!(request.mint, None);
    }
}
