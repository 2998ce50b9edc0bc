//! The role-aware chat pipeline.
//!
//! One request moves through a fixed sequence of states:
//!
//! ```text
//! idle → embedding_query → ranking → prompt_building → awaiting_llm
//!      → postprocessing → done
//! ```
//!
//! Any step may end in `failed`. The knowledge snapshot is captured once in
//! `idle`, so a reload that lands mid-request never changes its results.

use crate::context::{AssembledPrompt, FaqPair, PolicyPassage, PromptAssembler, PromptInput, PromptMetadata};
use crate::related::{RelatedSection, append_related, join_url};
use futures::future::try_join_all;
use rolerag_config::{AppConfig, RankingConfig};
use rolerag_core::error::{Error, KnowledgeError, ProviderError};
use rolerag_core::provider::{ProviderRequest, embed_one};
use rolerag_core::{Conversation, Directory, Provider, RoleSet, SectionLink};
use rolerag_knowledge::{FuzzyMatcher, KnowledgeCache, KnowledgeSnapshot, Rankings, RenderedHierarchy, RoleTierTable};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where a request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    EmbeddingQuery,
    Ranking,
    PromptBuilding,
    AwaitingLlm,
    Postprocessing,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::EmbeddingQuery => "embedding_query",
            Self::Ranking => "ranking",
            Self::PromptBuilding => "prompt_building",
            Self::AwaitingLlm => "awaiting_llm",
            Self::Postprocessing => "postprocessing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A chat turn to answer.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub conversation: Conversation,
    pub roles: RoleSet,
    /// Overrides the configured platform base URL for links.
    pub base_url: Option<String>,
}

impl ChatRequest {
    pub fn new(conversation: Conversation, roles: RoleSet) -> Self {
        Self {
            conversation,
            roles,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// The answer plus what produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub request_id: Uuid,
    /// The answer with the related-sections block, if any.
    pub text: String,
    /// The model's answer alone.
    pub answer: String,
    pub related: Vec<RelatedSection>,
    /// Source labels of the policy passages in the prompt.
    pub policy_sources: Vec<String>,
    pub faq_used: bool,
    pub prompt: PromptMetadata,
    /// States visited, in order.
    pub trace: Vec<PipelineState>,
}

/// Tracks and logs state transitions for one request.
struct Transitions {
    request_id: Uuid,
    trace: Vec<PipelineState>,
}

impl Transitions {
    fn start() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            trace: vec![PipelineState::Idle],
        }
    }

    fn current(&self) -> PipelineState {
        self.trace.last().copied().unwrap_or(PipelineState::Idle)
    }

    fn advance(&mut self, next: PipelineState) {
        debug!(request_id = %self.request_id, from = %self.current(), to = %next, "Pipeline transition");
        self.trace.push(next);
    }

    fn fail(&mut self, err: &Error) {
        let at = self.current();
        if err.is_client_error() {
            debug!(request_id = %self.request_id, state = %at, error = %err, "Chat request rejected");
        } else {
            error!(request_id = %self.request_id, state = %at, error = %err, "Chat request failed");
        }
        self.trace.push(PipelineState::Failed);
    }
}

/// Answers chat turns against the current knowledge snapshot.
pub struct ChatPipeline {
    provider: Arc<dyn Provider>,
    directory: Arc<dyn Directory>,
    cache: Arc<KnowledgeCache>,
    tiers: RoleTierTable,
    matcher: FuzzyMatcher,
    assembler: PromptAssembler,
    ranking: RankingConfig,
    chat_model: String,
    embed_model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    base_url: String,
    faq_answer_field: String,
}

impl ChatPipeline {
    pub fn new(
        provider: Arc<dyn Provider>,
        directory: Arc<dyn Directory>,
        cache: Arc<KnowledgeCache>,
        config: &AppConfig,
    ) -> Self {
        Self {
            provider,
            directory,
            cache,
            tiers: RoleTierTable::from_config(&config.roles),
            matcher: FuzzyMatcher::from_config(&config.fuzzy),
            assembler: PromptAssembler::from_config(&config.ranking),
            ranking: config.ranking.clone(),
            chat_model: config.provider.chat_model.clone(),
            embed_model: config.provider.embed_model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            base_url: config.gateway.platform_base_url.clone(),
            faq_answer_field: config.knowledge.faq_answer_field.clone(),
        }
    }

    pub fn cache(&self) -> &Arc<KnowledgeCache> {
        &self.cache
    }

    pub fn tiers(&self) -> &RoleTierTable {
        &self.tiers
    }

    /// Answer the last user message in `request.conversation`.
    pub async fn run(&self, request: ChatRequest) -> Result<ChatReply, Error> {
        let mut transitions = Transitions::start();
        let snapshot = self.cache.snapshot();

        match self.execute(&request, &snapshot, &mut transitions).await {
            Ok(mut reply) => {
                transitions.advance(PipelineState::Done);
                info!(
                    request_id = %transitions.request_id,
                    roles = %request.roles,
                    policies = reply.policy_sources.len(),
                    faq = reply.faq_used,
                    related = reply.related.len(),
                    "Chat request answered"
                );
                reply.request_id = transitions.request_id;
                reply.trace = transitions.trace;
                Ok(reply)
            }
            Err(e) => {
                transitions.fail(&e);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &ChatRequest,
        snapshot: &KnowledgeSnapshot,
        transitions: &mut Transitions,
    ) -> Result<ChatReply, Error> {
        let query = request
            .conversation
            .last_user_message()
            .map(|m| m.content.trim().to_lowercase())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| Error::ClientInput("No user message in conversation".into()))?;

        // ── Embed the query ──
        transitions.advance(PipelineState::EmbeddingQuery);
        let vector = embed_one(self.provider.as_ref(), &self.embed_model, &query).await?;
        if let Some(expected) = snapshot.dimension().filter(|d| *d != vector.len()) {
            return Err(KnowledgeError::DimensionMismatch {
                source_name: "query".into(),
                index: 0,
                expected,
                found: vector.len(),
            }
            .into());
        }

        // ── Rank against the captured snapshot ──
        transitions.advance(PipelineState::Ranking);
        let hierarchy = snapshot.render_sections(&request.roles);
        let rankings = snapshot.rank(&vector, &request.roles, &self.tiers, &hierarchy, &self.ranking);
        debug!(
            policies = rankings.policies.len(),
            faq = ?rankings.faq.map(|m| m.score),
            sections = rankings.sections.len(),
            "Rankings computed"
        );

        // ── Build the prompt ──
        transitions.advance(PipelineState::PromptBuilding);
        let prompt = self.build_prompt(request, &hierarchy, &rankings);

        // ── One model call ──
        transitions.advance(PipelineState::AwaitingLlm);
        let response = self
            .provider
            .complete(ProviderRequest {
                model: self.chat_model.clone(),
                messages: prompt.messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .await?;
        let answer = response.message.content.trim().to_string();
        if answer.is_empty() {
            return Err(ProviderError::MalformedResponse("Empty completion".into()).into());
        }

        // ── Link the sections the answer mentions ──
        transitions.advance(PipelineState::Postprocessing);
        let base_url = request
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.base_url);
        let related = self
            .related_sections(&answer, &hierarchy, &rankings, &request.roles, base_url)
            .await?;

        Ok(ChatReply {
            request_id: transitions.request_id,
            text: append_related(&answer, &related),
            answer,
            related,
            policy_sources: rankings
                .policies
                .iter()
                .map(|m| policy_source(m.item).to_string())
                .collect(),
            faq_used: prompt.metadata.faq_included,
            prompt: prompt.metadata,
            trace: Vec::new(),
        })
    }

    fn build_prompt(
        &self,
        request: &ChatRequest,
        hierarchy: &RenderedHierarchy,
        rankings: &Rankings<'_>,
    ) -> AssembledPrompt {
        let policies: Vec<PolicyPassage<'_>> = rankings
            .policies
            .iter()
            .map(|m| PolicyPassage {
                source: policy_source(m.item),
                text: &m.item.text,
                score: m.score,
            })
            .collect();

        let faq = rankings.faq.and_then(|m| match m.item.field(&self.faq_answer_field) {
            Some(answer) => Some(FaqPair {
                question: &m.item.text,
                answer,
                score: m.score,
            }),
            None => {
                warn!(
                    faq = %m.item.source_id,
                    field = %self.faq_answer_field,
                    "Matched FAQ has no answer; omitted from prompt"
                );
                None
            }
        });

        let prompt = self.assembler.assemble(&PromptInput {
            hierarchy: &hierarchy.text,
            policies: &policies,
            faq,
            history: &request.conversation.messages,
        });
        debug!(
            tokens = prompt.metadata.estimated_tokens,
            turns = prompt.metadata.history_turns,
            "Prompt assembled"
        );
        prompt
    }

    /// Sections mentioned in the answer (or, failing that, the best-ranked
    /// ones) that resolve to a link for these roles.
    async fn related_sections(
        &self,
        answer: &str,
        hierarchy: &RenderedHierarchy,
        rankings: &Rankings<'_>,
        roles: &RoleSet,
        base_url: &str,
    ) -> Result<Vec<RelatedSection>, Error> {
        let names = hierarchy.names();
        let mut candidates: Vec<String> = self
            .matcher
            .find_references(answer, &names)
            .into_iter()
            .map(|r| r.name.to_string())
            .collect();
        if candidates.is_empty() {
            candidates = RenderedHierarchy::distinct(rankings.sections.iter().map(|m| m.item.text.as_str()))
                .into_iter()
                .map(str::to_string)
                .collect();
            debug!(count = candidates.len(), "No sections named in answer; using ranked sections");
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let links = try_join_all(
            candidates
                .iter()
                .map(|name| self.directory.resolve_section_link(name, roles)),
        )
        .await?;

        Ok(candidates
            .into_iter()
            .zip(links)
            .filter_map(|(name, link)| match link {
                SectionLink::Available { url } => Some(RelatedSection {
                    url: join_url(base_url, &url),
                    name,
                }),
                SectionLink::Unavailable { reason } => {
                    warn!(section = %name, %reason, "No link for related section");
                    None
                }
            })
            .collect())
    }
}

/// Label for a policy record: its `source` field, else its id.
fn policy_source(record: &rolerag_knowledge::EmbeddingRecord) -> &str {
    record.field("source").unwrap_or(&record.source_id)
}
