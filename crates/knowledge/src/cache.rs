//! The knowledge snapshot and its atomically swapped cache.
//!
//! A [`KnowledgeSnapshot`] is built completely (files parsed, section names
//! embedded, hierarchy validated) before it is published. Requests clone the
//! current `Arc` once and work against it for their whole lifetime, so a
//! reload never changes what an in-flight request sees.

use crate::record::{EmbeddingRecord, load_records};
use crate::roles::{FaqCollection, RoleTierTable};
use crate::sections::{RenderedHierarchy, SectionForest};
use crate::similarity::{self, RankedMatch};
use chrono::{DateTime, Utc};
use rolerag_config::{KnowledgeConfig, RankingConfig};
use rolerag_core::error::{Error, KnowledgeError};
use rolerag_core::provider::EmbeddingRequest;
use rolerag_core::{Directory, Provider, RoleId, RoleSet};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// A section name with its embedding.
#[derive(Debug, Clone)]
pub struct SectionVector {
    pub node_id: i64,
    pub record: EmbeddingRecord,
}

/// Everything the ranking engine reads. Immutable once built.
#[derive(Debug)]
pub struct KnowledgeSnapshot {
    pub policies: Vec<EmbeddingRecord>,
    pub faqs: FaqCollection,
    pub sections: SectionForest,
    pub section_vectors: Vec<SectionVector>,
    pub role_names: HashMap<RoleId, String>,
    pub loaded_at: DateTime<Utc>,
}

/// Ranking results for one query, borrowed from a snapshot.
#[derive(Debug, Clone)]
pub struct Rankings<'a> {
    pub policies: Vec<RankedMatch<'a>>,
    /// Present only when the best FAQ passed the threshold.
    pub faq: Option<RankedMatch<'a>>,
    pub sections: Vec<RankedMatch<'a>>,
}

impl KnowledgeSnapshot {
    /// Assemble a snapshot, checking every vector shares one dimension.
    pub fn new(
        policies: Vec<EmbeddingRecord>,
        faqs: FaqCollection,
        sections: SectionForest,
        section_vectors: Vec<SectionVector>,
        role_names: HashMap<RoleId, String>,
    ) -> Result<Self, KnowledgeError> {
        let groups: [(&str, Box<dyn Iterator<Item = &EmbeddingRecord> + '_>); 5] = [
            ("policies", Box::new(policies.iter())),
            ("faq_general", Box::new(faqs.general.iter())),
            ("faq_managerial", Box::new(faqs.managerial.iter())),
            ("faq_hr", Box::new(faqs.hr.iter())),
            ("sections", Box::new(section_vectors.iter().map(|s| &s.record))),
        ];

        let mut expected: Option<usize> = None;
        for (source_name, records) in groups {
            for (index, record) in records.enumerate() {
                match expected {
                    None => expected = Some(record.dimension()),
                    Some(dim) if dim != record.dimension() => {
                        return Err(KnowledgeError::DimensionMismatch {
                            source_name: source_name.to_string(),
                            index,
                            expected: dim,
                            found: record.dimension(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Self {
            policies,
            faqs,
            sections,
            section_vectors,
            role_names,
            loaded_at: Utc::now(),
        })
    }

    /// A snapshot with nothing in it.
    pub fn empty() -> Self {
        Self {
            policies: Vec::new(),
            faqs: FaqCollection::default(),
            sections: SectionForest::default(),
            section_vectors: Vec::new(),
            role_names: HashMap::new(),
            loaded_at: Utc::now(),
        }
    }

    /// The shared vector dimension, if any record is loaded.
    pub fn dimension(&self) -> Option<usize> {
        self.policies
            .first()
            .or_else(|| self.faqs.general.first())
            .or_else(|| self.faqs.managerial.first())
            .or_else(|| self.faqs.hr.first())
            .or_else(|| self.section_vectors.first().map(|s| &s.record))
            .map(EmbeddingRecord::dimension)
    }

    /// The section hierarchy as `roles` sees it.
    pub fn render_sections(&self, roles: &RoleSet) -> RenderedHierarchy {
        self.sections.render(roles, &self.role_names)
    }

    /// Run the policy, FAQ and section rankings for one query vector.
    ///
    /// The three rankings share nothing mutable and run on the rayon pool.
    /// Sections are ranked only among those in `visible`.
    pub fn rank<'a>(
        &'a self,
        query: &[f32],
        roles: &RoleSet,
        tiers: &RoleTierTable,
        visible: &RenderedHierarchy,
        limits: &RankingConfig,
    ) -> Rankings<'a> {
        let faq_scope = self.faqs.resolve_faq_scope(tiers, roles);

        let sections = || {
            similarity::above_floor(
                query,
                self.section_vectors
                    .iter()
                    .filter(|sv| visible.contains_id(sv.node_id))
                    .map(|sv| &sv.record),
                limits.section_min_score,
                limits.section_limit,
            )
        };
        let ((policies, faq), sections) = rayon::join(
            || {
                rayon::join(
                    || similarity::top_k(query, &self.policies, limits.policy_top_k),
                    || similarity::best_above(query, faq_scope.records(), limits.faq_min_score),
                )
            },
            sections,
        );

        Rankings {
            policies,
            faq,
            sections,
        }
    }
}

/// Holds the current snapshot and swaps it atomically on reload.
pub struct KnowledgeCache {
    current: RwLock<Arc<KnowledgeSnapshot>>,
}

impl KnowledgeCache {
    pub fn new(snapshot: KnowledgeSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot to use for one request.
    pub fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a new snapshot, returning the previous one.
    pub fn swap(&self, snapshot: KnowledgeSnapshot) -> Arc<KnowledgeSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Build a fresh snapshot and publish it. On failure the current
    /// snapshot stays in place.
    pub async fn reload(&self, loader: &KnowledgeLoader) -> Result<Arc<KnowledgeSnapshot>, Error> {
        let snapshot = loader.load().await?;
        self.swap(snapshot);
        Ok(self.snapshot())
    }
}

/// Builds snapshots from the configured files and collaborators.
pub struct KnowledgeLoader {
    config: KnowledgeConfig,
    embed_model: String,
    provider: Arc<dyn Provider>,
    directory: Arc<dyn Directory>,
}

impl KnowledgeLoader {
    pub fn new(
        config: KnowledgeConfig,
        embed_model: impl Into<String>,
        provider: Arc<dyn Provider>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            config,
            embed_model: embed_model.into(),
            provider,
            directory,
        }
    }

    pub async fn load(&self) -> Result<KnowledgeSnapshot, Error> {
        let cfg = &self.config;

        let policies = load_records(&cfg.policies, &cfg.policy_text_field).await?;
        if policies.is_empty() {
            warn!(path = %cfg.policies.display(), "Policy snapshot has no embedded records");
        }

        let faqs = FaqCollection {
            general: self.load_faq_tier("general", &cfg.faq_general).await?,
            managerial: self.load_faq_tier("managerial", &cfg.faq_managerial).await?,
            hr: self.load_faq_tier("hr", &cfg.faq_hr).await?,
        };

        let nodes = self.directory.sections().await?;
        let role_names = self.directory.role_names().await?;
        let sections = SectionForest::new(nodes)?;
        let section_vectors = self.embed_sections(&sections).await?;

        let snapshot =
            KnowledgeSnapshot::new(policies, faqs, sections, section_vectors, role_names)?;

        info!(
            policies = snapshot.policies.len(),
            faqs = snapshot.faqs.len(),
            sections = snapshot.sections.len(),
            dimension = ?snapshot.dimension(),
            "Knowledge snapshot loaded"
        );
        Ok(snapshot)
    }

    async fn load_faq_tier(&self, tier: &str, path: &Path) -> Result<Vec<EmbeddingRecord>, KnowledgeError> {
        match load_records(path, &self.config.faq_text_field).await {
            Ok(records) => {
                if records.is_empty() {
                    warn!(tier, path = %path.display(), "FAQ tier is empty");
                }
                Ok(records)
            }
            Err(KnowledgeError::Io { source, .. })
                if self.config.allow_missing_faqs && source.kind() == std::io::ErrorKind::NotFound =>
            {
                warn!(tier, path = %path.display(), "FAQ file not found; tier left empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn embed_sections(&self, sections: &SectionForest) -> Result<Vec<SectionVector>, Error> {
        let nodes: Vec<_> = sections
            .nodes()
            .iter()
            .filter(|n| !n.name.trim().is_empty())
            .collect();
        if nodes.is_empty() {
            warn!("Directory returned no sections");
            return Ok(Vec::new());
        }

        debug!(count = nodes.len(), model = %self.embed_model, "Embedding section names");
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.embed_model.clone(),
                inputs: nodes.iter().map(|n| n.name.to_lowercase()).collect(),
            })
            .await?;

        if response.embeddings.len() != nodes.len() {
            return Err(KnowledgeError::Embedding(format!(
                "expected {} section vectors, got {}",
                nodes.len(),
                response.embeddings.len()
            ))
            .into());
        }

        Ok(nodes
            .into_iter()
            .zip(response.embeddings)
            .map(|(node, vector)| SectionVector {
                node_id: node.id,
                record: EmbeddingRecord::new(node.id.to_string(), node.name.clone(), vector),
            })
            .collect())
    }
}
