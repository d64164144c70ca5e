//! Centralized constants shared across crates.
//!
//! Values that multiple subsystems must agree on live here so a drift in
//! one crate cannot silently change behavior in another.

/// Retrieval defaults
pub mod retrieval {
    /// Maximum clauses returned by a single-document search
    pub const DEFAULT_TOP_K: usize = 5;
    /// Per-document ceiling when a chat session spans multiple documents
    pub const MULTI_DOC_TOP_K: usize = 3;
    /// Minimum cosine similarity for a clause to count as relevant
    pub const MIN_SIMILARITY: f64 = 0.2;
}

/// Risk fusion thresholds and weights
pub mod risk {
    /// Score at or above which a clause is flagged for review
    pub const REVIEW_SCORE_THRESHOLD: f64 = 0.8;
    /// Distinct keyword count at or above which a clause is flagged
    pub const REVIEW_KEYWORD_COUNT: usize = 3;
    /// Keyword/LLM disagreement above which a clause is flagged
    pub const REVIEW_DISAGREEMENT: f64 = 0.4;
    /// Keyword weight when keywords were detected
    pub const KEYWORD_HEAVY_WEIGHT: f64 = 0.7;
    /// Keyword weight when no keywords were detected
    pub const KEYWORD_LIGHT_WEIGHT: f64 = 0.3;
    /// Score at or above which a risk_detected event is emitted
    pub const EVENT_SCORE_THRESHOLD: f64 = 0.7;
}

/// LLM batching
pub mod llm {
    /// Fraction of the prompt-token budget a batch may consume
    pub const BATCH_TOKEN_BUFFER: f64 = 0.7;
    /// Characters per token in the rough estimator
    pub const CHARS_PER_TOKEN: usize = 4;
    /// Clause text is truncated to this many characters inside a batch prompt
    pub const CLAUSE_PROMPT_CHARS: usize = 2000;
}

/// Clause cache
pub mod cache {
    use std::time::Duration;

    /// Default TTL for cached per-document clause sets
    pub const DEFAULT_TTL: Duration = Duration::from_secs(1800);
    /// Interval between sweeper passes that evict expired entries
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
}

/// Document store limits
pub mod store {
    /// Maximum writes per batch transaction (conservative; the store caps at 500)
    pub const MAX_WRITES_PER_BATCH: usize = 50;
}

/// Citation formatting
pub mod citation {
    /// Maximum characters of original clause text included in a snippet
    pub const SNIPPET_CHARS: usize = 300;
}

/// Conversation memory
pub mod memory {
    /// Recent-history window returned on reads
    pub const MAX_MESSAGES: usize = 10;
    /// Messages included verbatim in the prompt transcript
    pub const TRANSCRIPT_MESSAGES: usize = 5;
}

/// Language detection
pub mod language {
    /// Detection confidence required before a detected language overrides the default
    pub const OVERRIDE_CONFIDENCE: f64 = 0.8;
}
