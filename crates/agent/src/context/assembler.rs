//! Prompt assembly for one chat turn.
//!
//! The system message is built from up to four layers, always in this order:
//!
//! 1. **Framing**: who the assistant is and what it answers from
//! 2. **Sections**: the hierarchy the caller can see, for naming pages
//! 3. **Policies**: the top-ranked passages, truncated and labelled by source
//! 4. **FAQ**: one question/answer pair, only when it passed the score gate
//!
//! The last few conversation turns follow the system message. Empty layers
//! are left out entirely.
//!
//! # Determinism
//!
//! Identical inputs always produce identical prompts; nothing here reads
//! the clock or any shared state.

use crate::context::token;
use rolerag_config::RankingConfig;
use rolerag_core::message::{Message, Role};
use serde::{Deserialize, Serialize};

/// Default system framing.
pub const SYSTEM_FRAMING: &str = "You are the HRMS assistant. Answer from policies and FAQs. \
When pointing the employee to a page, use the section names exactly as listed.";

// ── Types ─────────────────────────────────────────────────────────────────

/// A policy passage chosen for the prompt.
#[derive(Debug, Clone, Copy)]
pub struct PolicyPassage<'a> {
    /// Label shown to the model (document name or record id).
    pub source: &'a str,
    pub text: &'a str,
    pub score: f32,
}

/// The FAQ pair that passed the score gate.
#[derive(Debug, Clone, Copy)]
pub struct FaqPair<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub score: f32,
}

/// Everything the assembler needs for one turn.
pub struct PromptInput<'a> {
    /// Rendered section hierarchy for the caller's roles.
    pub hierarchy: &'a str,
    /// Policy passages, best first.
    pub policies: &'a [PolicyPassage<'a>],
    pub faq: Option<FaqPair<'a>>,
    /// Conversation turns, oldest first. Only the trailing window is used.
    pub history: &'a [Message],
}

/// The assembled prompt, ready for a provider call.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub system_message: String,
    /// System message first, then the history window.
    pub messages: Vec<Message>,
    pub metadata: PromptMetadata,
}

/// What went into the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMetadata {
    pub estimated_tokens: usize,
    pub per_layer: Vec<LayerStats>,
    pub faq_included: bool,
    pub history_turns: usize,
}

/// Statistics for a single prompt layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub tokens: usize,
    pub items: usize,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// Builds prompts. Stateless; create one and reuse it.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    framing: String,
    excerpt_chars: usize,
    history_window: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::from_config(&RankingConfig::default())
    }
}

impl PromptAssembler {
    pub fn new(excerpt_chars: usize, history_window: usize) -> Self {
        Self {
            framing: SYSTEM_FRAMING.into(),
            excerpt_chars,
            history_window,
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.policy_excerpt_chars, config.history_window)
    }

    pub fn assemble(&self, input: &PromptInput<'_>) -> AssembledPrompt {
        let mut stats = vec![LayerStats {
            name: "framing".into(),
            tokens: token::estimate_tokens(&self.framing),
            items: 1,
        }];
        let mut layers = vec![self.framing.clone()];

        let hierarchy = input.hierarchy.trim_end();
        if !hierarchy.is_empty() {
            let layer = format!("Sections available to this employee:\n{hierarchy}");
            stats.push(LayerStats {
                name: "sections".into(),
                tokens: token::estimate_tokens(&layer),
                items: hierarchy.lines().count(),
            });
            layers.push(layer);
        }

        if !input.policies.is_empty() {
            let passages: Vec<String> = input
                .policies
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    format!(
                        "Policy {} ({}): {}",
                        i + 1,
                        p.source,
                        excerpt(p.text.trim(), self.excerpt_chars)
                    )
                })
                .collect();
            let layer = format!("Policies:\n{}", passages.join("\n\n"));
            stats.push(LayerStats {
                name: "policies".into(),
                tokens: token::estimate_tokens(&layer),
                items: passages.len(),
            });
            layers.push(layer);
        }

        if let Some(faq) = input.faq {
            let layer = format!("FAQ:\nQ: {}\nA: {}", faq.question.trim(), faq.answer.trim());
            stats.push(LayerStats {
                name: "faq".into(),
                tokens: token::estimate_tokens(&layer),
                items: 1,
            });
            layers.push(layer);
        }

        let system_message = layers.join("\n\n");

        let start = input.history.len().saturating_sub(self.history_window);
        let history: Vec<Message> = input.history[start..]
            .iter()
            .map(|m| match m.role {
                Role::User => Message::user(&m.content),
                // Caller-supplied system turns are not trusted as framing.
                Role::Assistant | Role::System => Message::assistant(&m.content),
            })
            .collect();
        stats.push(LayerStats {
            name: "history".into(),
            tokens: token::estimate_messages_tokens(&history),
            items: history.len(),
        });

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(&system_message));
        messages.extend(history);

        AssembledPrompt {
            metadata: PromptMetadata {
                estimated_tokens: token::estimate_messages_tokens(&messages),
                per_layer: stats,
                faq_included: input.faq.is_some(),
                history_turns: messages.len() - 1,
            },
            system_message,
            messages,
        }
    }
}

/// The first `max_chars` characters of `text`.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
