//! Trade intents

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Buy or sell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeMode {
    Buy,
    Sell,
}

impl FromStr for TradeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeMode::Buy),
            "sell" => Ok(TradeMode::Sell),
            other => Err(Error::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeMode::Buy => write!(f, "buy"),
            TradeMode::Sell => write!(f, "sell"),
        }
    }
}

/// Which venue should execute the trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueSelection {
    /// Operator picked a venue id
    Explicit(String),
    /// Let the recommender decide; `recommended` is its annotation, if any
    Auto { recommended: Option<String> },
}

impl VenueSelection {
    pub fn auto() -> Self {
        VenueSelection::Auto { recommended: None }
    }

    /// Attach the recommender's venue to an `Auto` selection.
    /// Explicit selections are left alone.
    pub fn recommend(self, venue_id: impl Into<String>) -> Self {
        match self {
            VenueSelection::Auto { .. } => VenueSelection::Auto {
                recommended: Some(venue_id.into()),
            },
            explicit => explicit,
        }
    }
}

impl fmt::Display for VenueSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueSelection::Explicit(id) => write!(f, "{}", id),
            VenueSelection::Auto {
                recommended: Some(id),
            } => write!(f, "auto ({})", id),
            VenueSelection::Auto { recommended: None } => write!(f, "auto"),
        }
    }
}

/// One operator trade action across a set of wallets
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    /// Token mint address
    pub token: String,
    pub mode: TradeMode,
    /// SOL per wallet for buys, percentage of holding for sells
    pub amount: f64,
    pub venue: VenueSelection,
    /// Wallet addresses to trade from
    pub wallets: Vec<String>,
}

impl TradeIntent {
    pub fn buy(token: impl Into<String>, amount_sol: f64, venue: VenueSelection, wallets: Vec<String>) -> Self {
        Self {
            token: token.into(),
            mode: TradeMode::Buy,
            amount: amount_sol,
            venue,
            wallets,
        }
    }

    pub fn sell(token: impl Into<String>, percent: f64, venue: VenueSelection, wallets: Vec<String>) -> Self {
        Self {
            token: token.into(),
            mode: TradeMode::Sell,
            amount: percent,
            venue,
            wallets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("BUY".parse::<TradeMode>().unwrap(), TradeMode::Buy);
        assert_eq!("sell".parse::<TradeMode>().unwrap(), TradeMode::Sell);
        assert!(matches!(
            "swap".parse::<TradeMode>(),
            Err(Error::UnsupportedMode(m)) if m == "swap"
        ));
    }

    #[test]
    fn test_recommend_only_touches_auto() {
        let auto = VenueSelection::auto().recommend("raydium");
        assert_eq!(
            auto,
            VenueSelection::Auto {
                recommended: Some("raydium".to_string())
            }
        );

        let explicit = VenueSelection::Explicit("pump".to_string()).recommend("raydium");
        assert_eq!(explicit, VenueSelection::Explicit("pump".to_string()));
    }
}
