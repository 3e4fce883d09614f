//! Token-cost estimation against tiered per-1000-token pricing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::tokenizer::{HfTokenizer, Tokenizer};

/// Pricing tier of a completion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineTier {
    Davinci,
    Curie,
    Babbage,
    Ada,
}

/// Price per 1000 tokens, most expensive tier first.
pub const PRICE_TABLE: [(EngineTier, f64); 4] = [
    (EngineTier::Davinci, EngineTier::Davinci.price_per_1000()),
    (EngineTier::Curie, EngineTier::Curie.price_per_1000()),
    (EngineTier::Babbage, EngineTier::Babbage.price_per_1000()),
    (EngineTier::Ada, EngineTier::Ada.price_per_1000()),
];

impl EngineTier {
    pub const ALL: [Self; 4] = [Self::Davinci, Self::Curie, Self::Babbage, Self::Ada];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Davinci => "davinci",
            Self::Curie => "curie",
            Self::Babbage => "babbage",
            Self::Ada => "ada",
        }
    }

    /// Price in dollars per 1000 tokens.
    pub const fn price_per_1000(&self) -> f64 {
        match self {
            Self::Davinci => 0.06,
            Self::Curie => 0.006,
            Self::Babbage => 0.0012,
            Self::Ada => 0.0008,
        }
    }

    /// Cost of `n_tokens` tokens on this tier.
    pub fn cost(&self, n_tokens: usize) -> f64 {
        n_tokens as f64 / 1000.0 * self.price_per_1000()
    }
}

impl FromStr for EngineTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(Self::as_str).collect();
                Error::InvalidArgument(format!(
                    "unknown engine tier {s:?}, expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

impl fmt::Display for EngineTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token total and price of a prompt batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub n_tokens_total: usize,
    pub engine: EngineTier,
    pub cost: f64,
}

/// Counts prompt tokens and prices them per engine tier.
pub struct TokenCostEstimator<T = HfTokenizer> {
    tokenizer: T,
}

impl TokenCostEstimator {
    /// Estimator backed by the GPT-2 BPE vocabulary from the Hub.
    pub fn gpt2() -> Result<Self> {
        Ok(Self::new(HfTokenizer::from_pretrained("gpt2", "main")?))
    }
}

impl<T: Tokenizer> TokenCostEstimator<T> {
    pub fn new(tokenizer: T) -> Self {
        Self { tokenizer }
    }

    /// Number of tokens in one prompt.
    pub fn count_tokens(&self, prompt: &str) -> Result<usize> {
        Ok(self.tokenizer.encode(prompt, true)?.len())
    }

    /// Tokenizes every prompt independently and prices the total.
    pub fn estimate<S: AsRef<str>>(
        &self,
        prompts: &[S],
        engine: EngineTier,
    ) -> Result<CostEstimate> {
        let n_tokens_total = prompts
            .iter()
            .map(|prompt| self.count_tokens(prompt.as_ref()))
            .sum::<Result<usize>>()?;
        let cost = engine.cost(n_tokens_total);

        info!("Total number of tokens: {n_tokens_total}");
        info!("Cost for engine {engine}: {cost}");

        Ok(CostEstimate {
            n_tokens_total,
            engine,
            cost,
        })
    }

    /// Cost of `prompts` on the tier named `engine`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unknown tier, raised before any
    /// prompt is tokenized.
    pub fn cost_approximation<S: AsRef<str>>(&self, prompts: &[S], engine: &str) -> Result<f64> {
        let engine: EngineTier = engine.parse()?;
        Ok(self.estimate(prompts, engine)?.cost)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// One token per whitespace-separated word.
    #[derive(Default)]
    struct WordTokenizer {
        calls: Cell<usize>,
    }

    impl Tokenizer for WordTokenizer {
        fn encode(&self, text: &str, _add_special_tokens: bool) -> Result<Vec<u32>> {
            self.calls.set(self.calls.get() + 1);
            Ok(text.split_whitespace().map(|w| w.len() as u32).collect())
        }

        fn decode(&self, _ids: &[u32], _skip_special_tokens: bool) -> Result<String> {
            Ok(String::new())
        }

        fn vocab_size(&self) -> usize {
            64
        }
    }

    const PROMPT: &str = "the quick brown fox jumps over the lazy dog while the cat sleeps soundly";

    #[test]
    fn test_thousand_prompts_on_davinci() {
        let estimator = TokenCostEstimator::new(WordTokenizer::default());
        assert_eq!(estimator.count_tokens(PROMPT).unwrap(), 14);

        let prompts = vec![PROMPT; 1000];
        let estimate = estimator.estimate(&prompts, EngineTier::Davinci).unwrap();
        assert_eq!(estimate.n_tokens_total, 14_000);
        assert!((estimate.cost - 0.84).abs() < 1e-9);
    }

    #[test]
    fn test_doubling_prompts_doubles_cost() {
        let estimator = TokenCostEstimator::new(WordTokenizer::default());
        let single = estimator.cost_approximation(&[PROMPT, "hello there"], "curie").unwrap();
        let double = estimator
            .cost_approximation(&[PROMPT, "hello there", PROMPT, "hello there"], "curie")
            .unwrap();
        assert!((double - 2.0 * single).abs() < 1e-12);
    }

    #[test]
    fn test_tier_ordering() {
        let estimator = TokenCostEstimator::new(WordTokenizer::default());
        let costs: Vec<f64> = EngineTier::ALL
            .iter()
            .map(|tier| estimator.estimate(&[PROMPT], *tier).unwrap().cost)
            .collect();
        assert!(costs.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_unknown_tier_fails_before_tokenizing() {
        let estimator = TokenCostEstimator::new(WordTokenizer::default());
        let err = estimator.cost_approximation(&[PROMPT], "claude").unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(estimator.tokenizer.calls.get(), 0);
    }

    #[test]
    fn test_price_table_covers_every_tier() {
        for (tier, (listed, price)) in EngineTier::ALL.iter().zip(PRICE_TABLE) {
            assert_eq!(*tier, listed);
            assert!(price > 0.0);
            assert_eq!(tier.price_per_1000(), price);
        }
    }

    #[test]
    fn test_tier_parse_and_display() {
        for tier in EngineTier::ALL {
            assert_eq!(tier.to_string().parse::<EngineTier>().unwrap(), tier);
        }
        assert!("Davinci".parse::<EngineTier>().is_err());
    }
}
