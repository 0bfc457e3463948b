//! Price wizard
//!
//! The price itself is computed locally; the provider only suggests combos
//! and a short sales strategy.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::provider::GenerationProvider;

const FALLBACK_STRATEGY: &str = "Focus on quality.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingInput {
    pub product_name: String,
    pub ingredients_cost: f64,
    pub operational_cost: f64,
    /// Desired margin in percent.
    pub margin_percent: f64,
}

/// Price from total cost and a margin fraction.
///
/// Margins below 1 are taken as a share of the sale price; anything from 1 up
/// is treated as a markup on cost.
pub fn ideal_price(total_cost: f64, margin: f64) -> f64 {
    if margin >= 1.0 {
        total_cost * (1.0 + margin)
    } else {
        total_cost / (1.0 - margin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBreakdown {
    pub total_cost: f64,
    pub ideal_price: f64,
    pub net_profit: f64,
}

impl PricingInput {
    pub fn breakdown(&self) -> PriceBreakdown {
        let sanitize = |v: f64| if v.is_finite() { v } else { 0.0 };
        let total_cost = sanitize(self.ingredients_cost) + sanitize(self.operational_cost);
        let margin = sanitize(self.margin_percent) / 100.0;
        let ideal = ideal_price(total_cost, margin);
        PriceBreakdown {
            total_cost,
            ideal_price: ideal,
            net_profit: ideal - total_cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingStrategy {
    #[serde(skip)]
    pub ideal_price: f64,
    #[serde(skip)]
    pub net_profit: f64,
    #[serde(default)]
    pub combos: Vec<String>,
    #[serde(default)]
    pub strategy: String,
}

pub fn strategy_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "combos": { "type": "ARRAY", "items": { "type": "STRING" } },
            "strategy": { "type": "STRING" }
        },
        "required": ["combos", "strategy"]
    })
}

pub fn strategy_prompt(input: &PricingInput, breakdown: &PriceBreakdown) -> String {
    format!(
        "Act as a food business consultant.\n\
         Product: {}\n\
         Ingredient cost: {:.2}\n\
         Operational cost: {:.2}\n\
         Margin: {}%\n\
         Computed price: {:.2}, profit: {:.2}\n\
         Suggest 3 combos and a short sales strategy.",
        input.product_name,
        input.ingredients_cost,
        input.operational_cost,
        input.margin_percent,
        breakdown.ideal_price,
        breakdown.net_profit
    )
}

/// Compute the price and ask for combos. Provider failure only drops the
/// suggestions.
pub async fn pricing_strategy(provider: &dyn GenerationProvider, input: &PricingInput) -> PricingStrategy {
    let breakdown = input.breakdown();
    let suggestions = match provider
        .generate_structured(&strategy_prompt(input, &breakdown), &strategy_schema())
        .await
    {
        Ok(value) => serde_json::from_value::<PricingStrategy>(value).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let (combos, strategy) = match suggestions {
        Ok(s) => (s.combos, s.strategy),
        Err(e) => {
            tracing::warn!(error = %e, "pricing suggestions unavailable");
            (Vec::new(), FALLBACK_STRATEGY.to_string())
        }
    };

    PricingStrategy {
        ideal_price: breakdown.ideal_price,
        net_profit: breakdown.net_profit,
        combos,
        strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OfflineProvider;

    #[test]
    fn test_margin_as_share_of_price() {
        let price = ideal_price(10.0, 0.5);
        assert!((price - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_margin_as_markup() {
        let price = ideal_price(10.0, 1.5);
        assert!((price - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_from_percent() {
        let input = PricingInput {
            product_name: "Burger".into(),
            ingredients_cost: 8.0,
            operational_cost: 2.0,
            margin_percent: 60.0,
        };
        let b = input.breakdown();
        assert!((b.ideal_price - 25.0).abs() < 1e-9);
        assert!((b.net_profit - 15.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_offline_strategy_falls_back() {
        let input = PricingInput {
            product_name: "Burger".into(),
            ingredients_cost: 5.0,
            operational_cost: 5.0,
            margin_percent: 0.0,
        };
        let strategy = pricing_strategy(&OfflineProvider::new(), &input).await;
        assert_eq!(strategy.strategy, FALLBACK_STRATEGY);
        assert!(strategy.combos.is_empty());
        assert!((strategy.ideal_price - 10.0).abs() < 1e-9);
    }
}
