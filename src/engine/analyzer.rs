//! Text analyzer
//!
//! Splits field text into lowercase word tokens and caps the number of tokens
//! taken from any single field value. The same pipeline tokenizes documents
//! at index time and query strings at search time.

use tantivy::tokenizer::{
    LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer, Token, TokenFilter, TokenStream,
    Tokenizer,
};

/// Default per-field token cap
pub const DEFAULT_MAX_FIELD_TOKENS: usize = 10_000;

/// Name the analyzer is registered under on every opened index
pub const ANALYZER_NAME: &str = "weblog";

/// Tokens of this many bytes or more are dropped
const MAX_TOKEN_BYTES: usize = 40;

/// Lowercasing word tokenizer with a per-field token limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analyzer {
    max_field_tokens: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FIELD_TOKENS)
    }
}

impl Analyzer {
    /// Create an analyzer taking at most `max_field_tokens` tokens per field
    pub fn new(max_field_tokens: usize) -> Self {
        Self { max_field_tokens }
    }

    /// Per-field token cap
    pub fn max_field_tokens(&self) -> usize {
        self.max_field_tokens
    }

    /// Build the tantivy pipeline for this configuration
    pub fn text_analyzer(&self) -> TextAnalyzer {
        TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
            .filter(LowerCaser)
            .filter(TokenLimit::new(self.max_field_tokens))
            .build()
    }

    /// Tokenize one field
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.text_analyzer();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }
}

// =============================================================================
// Token limit filter
// =============================================================================

/// Passes through at most `limit` tokens of each field value
#[derive(Debug, Clone, Copy)]
pub struct TokenLimit {
    limit: usize,
}

impl TokenLimit {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl TokenFilter for TokenLimit {
    type Tokenizer<T: Tokenizer> = TokenLimitWrapper<T>;

    fn transform<T: Tokenizer>(self, tokenizer: T) -> TokenLimitWrapper<T> {
        TokenLimitWrapper {
            limit: self.limit,
            inner: tokenizer,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenLimitWrapper<T> {
    limit: usize,
    inner: T,
}

impl<T: Tokenizer> Tokenizer for TokenLimitWrapper<T> {
    type TokenStream<'a> = TokenLimitStream<T::TokenStream<'a>>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        TokenLimitStream {
            remaining: self.limit,
            tail: self.inner.token_stream(text),
        }
    }
}

pub struct TokenLimitStream<T> {
    remaining: usize,
    tail: T,
}

impl<T: TokenStream> TokenStream for TokenLimitStream<T> {
    fn advance(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        if !self.tail.advance() {
            return false;
        }
        self.remaining -= 1;
        true
    }

    fn token(&self) -> &Token {
        self.tail.token()
    }

    fn token_mut(&mut self) -> &mut Token {
        self.tail.token_mut()
    }
}
