//! Advisory token preindex built on cold start.
//!
//! On a session's first pass over a page with no cached state, a cheap
//! inverted index is built over the descriptor set: per token, per word
//! bigram, and per element hash. It is advisory only: the ranker's
//! scores always win, and the preindex is consulted just to break
//! near-ties toward elements whose literal tokens overlap the query.
//! Construction is bounded by an element budget so pathological pages
//! cannot blow it up.

use std::collections::{HashMap, HashSet};

/// Elements considered during preindex construction.
pub const DEFAULT_PREINDEX_BUDGET: usize = 5000;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn bigrams(tokens: &[String]) -> Vec<String> {
    tokens
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect()
}

/// Inverted token/bigram index over element hashes.
pub struct TokenPreindex {
    token_to_hashes: HashMap<String, HashSet<String>>,
    bigram_to_hashes: HashMap<String, HashSet<String>>,
    indexed: HashSet<String>,
}

impl TokenPreindex {
    /// Build from `(element_hash, searchable_text)` pairs, stopping at
    /// `budget` elements.
    pub fn build<I>(entries: I, budget: usize) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut token_to_hashes: HashMap<String, HashSet<String>> = HashMap::new();
        let mut bigram_to_hashes: HashMap<String, HashSet<String>> = HashMap::new();
        let mut indexed = HashSet::new();

        for (hash, text) in entries.into_iter().take(budget.max(1)) {
            let tokens = tokenize(&text);
            for bigram in bigrams(&tokens) {
                bigram_to_hashes
                    .entry(bigram)
                    .or_default()
                    .insert(hash.clone());
            }
            for token in tokens {
                token_to_hashes.entry(token).or_default().insert(hash.clone());
            }
            indexed.insert(hash);
        }

        Self {
            token_to_hashes,
            bigram_to_hashes,
            indexed,
        }
    }

    pub fn len(&self) -> usize {
        self.indexed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty()
    }

    pub fn contains(&self, element_hash: &str) -> bool {
        self.indexed.contains(element_hash)
    }

    /// How strongly an element's literal tokens overlap a query: one
    /// point per shared token, two per shared bigram.
    pub fn hits(&self, query: &str, element_hash: &str) -> usize {
        let tokens = tokenize(query);
        let mut score = 0usize;
        for token in &tokens {
            if self
                .token_to_hashes
                .get(token)
                .is_some_and(|set| set.contains(element_hash))
            {
                score += 1;
            }
        }
        for bigram in bigrams(&tokens) {
            if self
                .bigram_to_hashes
                .get(&bigram)
                .is_some_and(|set| set.contains(element_hash))
            {
                score += 2;
            }
        }
        score
    }
}
