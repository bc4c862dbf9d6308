// Token vocabulary for storyscore.
//
// A generation run works over integer token ids; the vocabulary is the
// bidirectional id <-> symbol map that ties those ids to the musical token
// text the duration parser and the corpus files speak. It is loaded once
// from a JSON object (`{"symbol": id, ...}`, the format the training
// pipeline exports) and stays fixed for the whole run — every component
// shares it read-only.
//
// Ids must be dense (`0..len`): the language model oracle returns one
// probability per id, so a gap in the id space would silently misalign
// distributions against symbols.

pub mod duration;

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Integer token id. Indexes into language-model distributions.
pub type TokenId = u32;

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("failed to read vocabulary file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse vocabulary JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("vocabulary ids are not dense: id {id} out of range for {len} symbols")]
    SparseIds { id: TokenId, len: usize },
    #[error("vocabulary id {id} assigned to both {first:?} and {second:?}")]
    DuplicateId { id: TokenId, first: String, second: String },
    #[error("unknown token symbol {0:?}")]
    UnknownSymbol(String),
    #[error("token id {0} out of vocabulary range")]
    UnknownId(TokenId),
}

/// Bidirectional token-id <-> symbol map, fixed for a generation run.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    symbol_to_id: BTreeMap<String, TokenId>,
    id_to_symbol: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from (symbol, id) pairs, validating that ids are
    /// dense and unique.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, TokenId)>,
    ) -> Result<Self, VocabError> {
        let symbol_to_id: BTreeMap<String, TokenId> = entries.into_iter().collect();
        let len = symbol_to_id.len();
        let mut id_to_symbol: Vec<Option<String>> = vec![None; len];

        for (symbol, &id) in &symbol_to_id {
            let slot = id_to_symbol
                .get_mut(id as usize)
                .ok_or(VocabError::SparseIds { id, len })?;
            if let Some(first) = slot.take() {
                return Err(VocabError::DuplicateId {
                    id,
                    first,
                    second: symbol.clone(),
                });
            }
            *slot = Some(symbol.clone());
        }

        // Dense + unique + len slots means every slot is filled.
        let id_to_symbol = id_to_symbol.into_iter().flatten().collect();
        Ok(Vocabulary {
            symbol_to_id,
            id_to_symbol,
        })
    }

    /// Load from a JSON file containing a `{"symbol": id}` object.
    pub fn load(path: &Path) -> Result<Self, VocabError> {
        let data = std::fs::read_to_string(path)?;
        let map: BTreeMap<String, TokenId> = serde_json::from_str(&data)?;
        Self::from_entries(map)
    }

    /// Number of tokens. Language-model distributions must have this length.
    pub fn len(&self) -> usize {
        self.id_to_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_symbol.is_empty()
    }

    pub fn id(&self, symbol: &str) -> Option<TokenId> {
        self.symbol_to_id.get(symbol).copied()
    }

    pub fn symbol(&self, id: TokenId) -> Option<&str> {
        self.id_to_symbol.get(id as usize).map(String::as_str)
    }

    /// Encode whitespace-separated token text into ids. Empty input encodes
    /// to an empty sequence.
    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>, VocabError> {
        text.split_whitespace()
            .map(|symbol| {
                self.id(symbol)
                    .ok_or_else(|| VocabError::UnknownSymbol(symbol.to_string()))
            })
            .collect()
    }

    /// Decode ids into space-joined token text.
    pub fn decode(&self, tokens: &[TokenId]) -> Result<String, VocabError> {
        let symbols: Vec<&str> = tokens
            .iter()
            .map(|&id| self.symbol(id).ok_or(VocabError::UnknownId(id)))
            .collect::<Result<_, _>>()?;
        Ok(symbols.join(" "))
    }
}
