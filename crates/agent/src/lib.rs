//! The chat pipeline: the heart of rolerag.
//!
//! Each request follows a fixed **Embed → Rank → Prompt → Answer → Link**
//! sequence:
//!
//! 1. **Embed** the caller's last message
//! 2. **Rank** policies, role-scoped FAQs and visible sections against one
//!    captured knowledge snapshot
//! 3. **Assemble** the prompt (framing, hierarchy, policies, FAQ, history)
//! 4. **Ask** the language model once
//! 5. **Link** the sections the answer names, for the caller's roles
//!
//! There are no retries and no tool loops; any failing step fails the request.

pub mod context;
pub mod pipeline;
pub mod related;

#[cfg(test)]
mod test_helpers;

pub use context::{AssembledPrompt, PromptAssembler, PromptInput, PromptMetadata};
pub use pipeline::{ChatPipeline, ChatReply, ChatRequest, PipelineState};
pub use related::RelatedSection;
