//! Stopping criteria for multi-step generation.
//!
//! A criterion is a predicate over the tokens generated so far, queried
//! once per produced token. Criteria compose into a
//! [`StoppingCriteriaList`] that halts as soon as any member fires.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;

/// One caller-supplied stop token, either a raw id or text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopToken {
    /// A vocabulary id used as-is.
    Id(u32),
    /// Text resolved to the id of its first sub-token.
    Text(String),
}

impl From<u32> for StopToken {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for StopToken {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for StopToken {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Set of token ids that end generation.
///
/// Built once per generation call and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopSet {
    ids: HashSet<u32>,
}

impl StopSet {
    /// An empty set: only the token budget stops generation.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set from raw ids.
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Resolves caller stop tokens against a tokenizer.
    ///
    /// Text entries map to the first id of their encoding without special
    /// tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for text that encodes to nothing.
    pub fn resolve<T: Tokenizer + ?Sized>(
        stop_tokens: &[StopToken],
        tokenizer: &T,
    ) -> Result<Self> {
        let mut ids = HashSet::with_capacity(stop_tokens.len());
        for stop_token in stop_tokens {
            let id = match stop_token {
                StopToken::Id(id) => *id,
                StopToken::Text(text) => tokenizer
                    .encode(text, false)?
                    .first()
                    .copied()
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "stop token {text:?} does not encode to any token"
                        ))
                    })?,
            };
            ids.insert(id);
        }
        Ok(Self { ids })
    }

    /// True if `id` is a stop token.
    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    /// True if no stop tokens were given.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of distinct stop ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// A single-step predicate over the generated tokens.
pub trait StoppingCriterion {
    /// Returns true if generation should halt after the latest token.
    fn should_stop(&self, generated: &[u32]) -> bool;
}

/// Halts when the most recently generated token is in a [`StopSet`].
#[derive(Debug, Clone)]
pub struct StopTokenCriterion {
    stop_set: StopSet,
}

impl StopTokenCriterion {
    pub fn new(stop_set: StopSet) -> Self {
        Self { stop_set }
    }

    pub fn stop_set(&self) -> &StopSet {
        &self.stop_set
    }
}

impl StoppingCriterion for StopTokenCriterion {
    fn should_stop(&self, generated: &[u32]) -> bool {
        generated
            .last()
            .is_some_and(|token| self.stop_set.contains(*token))
    }
}

/// Ordered list of criteria; stops when any member fires.
#[derive(Default)]
pub struct StoppingCriteriaList {
    criteria: Vec<Box<dyn StoppingCriterion>>,
}

impl StoppingCriteriaList {
    /// Create an empty list that never fires.
    pub fn new() -> Self {
        Self::default()
    }

    /// The list used for a generation call: one stop-token criterion,
    /// or nothing when the stop set is empty.
    pub fn for_stop_set(stop_set: &StopSet) -> Self {
        let mut list = Self::new();
        if !stop_set.is_empty() {
            list.push(StopTokenCriterion::new(stop_set.clone()));
        }
        list
    }

    /// Add a criterion to the end of the list.
    pub fn push(&mut self, criterion: impl StoppingCriterion + 'static) {
        self.criteria.push(Box::new(criterion));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, criterion: impl StoppingCriterion + 'static) -> Self {
        self.push(criterion);
        self
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

impl StoppingCriterion for StoppingCriteriaList {
    fn should_stop(&self, generated: &[u32]) -> bool {
        self.criteria
            .iter()
            .any(|criterion| criterion.should_stop(generated))
    }
}
