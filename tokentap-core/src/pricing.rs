//! Model price table and cost estimation.
//!
//! Prices are per 1K tokens. A table is built once, wrapped in an `Arc` and
//! shared read-only by every instrumented call. Tables can be loaded from
//! JSON so that price changes need no code change:
//!
//! ```json
//! {
//!   "models": {
//!     "gpt-4o": { "input_per_1k": 0.0025, "output_per_1k": 0.01 }
//!   },
//!   "default_price": { "input_per_1k": 0.001, "output_per_1k": 0.002 }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::PricingError;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub const fn per_1k(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    fn validate(&self, model: &str) -> Result<(), PricingError> {
        for (side, price) in [("input", self.input_per_1k), ("output", self.output_per_1k)] {
            if !price.is_finite() || price < 0.0 {
                return Err(PricingError::InvalidPrice {
                    model: model.to_string(),
                    reason: format!("{side} price must be a non-negative number, got {price}"),
                });
            }
        }
        Ok(())
    }
}

/// How a model name was resolved against the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum PriceMatch {
    Exact,
    /// Longest table key contained in the model name, e.g. `gpt-4o` for
    /// `gpt-4o-2024-08-06`.
    Partial(String),
    Default,
    /// No price known; the estimate is zero.
    Unpriced,
}

impl PriceMatch {
    pub fn is_priced(&self) -> bool {
        !matches!(self, PriceMatch::Unpriced)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceMatch::Exact => "exact",
            PriceMatch::Partial(_) => "partial",
            PriceMatch::Default => "default",
            PriceMatch::Unpriced => "unpriced",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CostEstimate {
    pub model: String,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub pricing: PriceMatch,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PriceTable {
    #[serde(default)]
    models: BTreeMap<String, ModelPrice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_price: Option<ModelPrice>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// OpenAI list prices.
    pub fn openai() -> Self {
        let models = OPENAI_PRICES
            .iter()
            .map(|(model, input, output)| (model.to_string(), ModelPrice::per_1k(*input, *output)))
            .collect();
        Self {
            models,
            default_price: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, PricingError> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PricingError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_price(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.models.insert(model.into(), price);
        self
    }

    pub fn with_default_price(mut self, price: ModelPrice) -> Self {
        self.default_price = Some(price);
        self
    }

    /// Entries of `overrides` replace or extend this table.
    pub fn merge(mut self, overrides: PriceTable) -> Self {
        self.models.extend(overrides.models);
        if overrides.default_price.is_some() {
            self.default_price = overrides.default_price;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &ModelPrice)> {
        self.models.iter().map(|(model, price)| (model.as_str(), price))
    }

    /// Resolves `model` to a price: exact key, then the longest key contained
    /// in `model` (ties go to the alphabetically first key), then the
    /// default price.
    pub fn lookup(&self, model: &str) -> Option<(ModelPrice, PriceMatch)> {
        if let Some(price) = self.models.get(model) {
            return Some((*price, PriceMatch::Exact));
        }
        let partial = self
            .models
            .iter()
            .filter(|(key, _)| !key.is_empty() && model.contains(key.as_str()))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)));
        if let Some((key, price)) = partial {
            return Some((*price, PriceMatch::Partial(key.clone())));
        }
        self.default_price.map(|price| (price, PriceMatch::Default))
    }

    pub fn estimate(&self, model: &str, input_tokens: u64, output_tokens: u64) -> CostEstimate {
        let Some((price, pricing)) = self.lookup(model) else {
            return CostEstimate {
                model: model.to_string(),
                input_cost: 0.0,
                output_cost: 0.0,
                total_cost: 0.0,
                pricing: PriceMatch::Unpriced,
            };
        };
        let input_cost = (input_tokens as f64 / 1000.0) * price.input_per_1k;
        let output_cost = (output_tokens as f64 / 1000.0) * price.output_per_1k;
        CostEstimate {
            model: model.to_string(),
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
            pricing,
        }
    }

    fn validate(&self) -> Result<(), PricingError> {
        for (model, price) in &self.models {
            price.validate(model)?;
        }
        if let Some(price) = &self.default_price {
            price.validate("<default>")?;
        }
        Ok(())
    }
}

// (model, input per 1K, output per 1K)
const OPENAI_PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4.1", 0.002, 0.008),
    ("gpt-4.1-mini", 0.0004, 0.0016),
    ("gpt-4.1-nano", 0.0001, 0.0004),
    ("gpt-4.5-preview", 0.075, 0.15),
    ("gpt-4o", 0.0025, 0.01),
    ("gpt-4o-mini", 0.00015, 0.0006),
    ("o1", 0.015, 0.06),
    ("o1-pro", 0.15, 0.6),
    ("o1-mini", 0.0011, 0.0044),
    ("o3", 0.01, 0.04),
    ("o3-mini", 0.0011, 0.0044),
    ("o4-mini", 0.0011, 0.0044),
    ("gpt-4", 0.03, 0.06),
    ("gpt-4-32k", 0.06, 0.12),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-4-turbo-2024-04-09", 0.01, 0.03),
    ("gpt-4-0613", 0.03, 0.06),
    ("gpt-3.5-turbo", 0.0005, 0.0015),
    ("gpt-3.5-turbo-0125", 0.0005, 0.0015),
    ("gpt-3.5-turbo-16k", 0.003, 0.004),
    ("gpt-3.5-turbo-16k-0613", 0.003, 0.004),
    ("gpt-3.5-turbo-instruct", 0.0015, 0.002),
    ("davinci-002", 0.002, 0.002),
    ("babbage-002", 0.0004, 0.0004),
    ("ada", 0.0004, 0.0004),
    ("text-ada-001", 0.0004, 0.0004),
    ("babbage", 0.0004, 0.0004),
    ("text-babbage-001", 0.0004, 0.0004),
    ("curie", 0.002, 0.002),
    ("text-curie-001", 0.002, 0.002),
    ("davinci", 0.002, 0.002),
    ("text-davinci-001", 0.002, 0.002),
    ("text-davinci-002", 0.002, 0.002),
    ("text-davinci-003", 0.002, 0.002),
];
