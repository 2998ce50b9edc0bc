//! Prompt context assembly.
//!
//! | Layer | Source | Included when |
//! |-------|--------|---------------|
//! | Framing | fixed text | always |
//! | Sections | rendered hierarchy | caller sees at least one section |
//! | Policies | top-k policy passages | any policy loaded |
//! | FAQ | best scoped FAQ | score passed the gate |
//! | History | trailing conversation window | always |

pub mod assembler;
pub mod token;

pub use assembler::{
    AssembledPrompt, FaqPair, LayerStats, PolicyPassage, PromptAssembler, PromptInput, PromptMetadata,
};
