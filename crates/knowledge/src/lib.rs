//! Retrieval engine for rolerag.
//!
//! Everything here operates on an immutable [`KnowledgeSnapshot`]:
//! - `record`: loading pre-computed embedding snapshots from JSON
//! - `similarity`: cosine scoring and stable top-k ranking
//! - `roles`: the declarative role → FAQ tier table
//! - `sections`: the role-filtered section hierarchy and its name index
//! - `fuzzy`: finding section names mentioned in generated answers
//! - `cache`: the snapshot, its loader, and the atomic-swap cache
//! - `reembed`: offline re-embedding of snapshot files

pub mod cache;
pub mod fuzzy;
pub mod record;
pub mod reembed;
pub mod roles;
pub mod sections;
pub mod similarity;

pub use cache::{KnowledgeCache, KnowledgeLoader, KnowledgeSnapshot, Rankings, SectionVector};
pub use fuzzy::{FuzzyMatcher, FuzzyReference};
pub use record::EmbeddingRecord;
pub use reembed::{ReembedSummary, reembed_file, reembed_records};
pub use roles::{FaqCollection, FaqScope, RoleTier, RoleTierTable};
pub use sections::{RenderedHierarchy, RenderedSection, SectionForest, SectionIndex};
pub use similarity::{RankedMatch, cosine_similarity};
