//! Shared fixtures for pipeline tests.
//!
//! Every vector is 3-d and the scripted provider embeds every text as
//! `[1, 0, 0]`, so fixture scores are simply the first component of each
//! (unit) record vector.

use async_trait::async_trait;
use rolerag_core::error::{DirectoryError, ProviderError};
use rolerag_core::message::Message;
use rolerag_core::provider::{EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage};
use rolerag_core::{Directory, EmployeeStatus, RoleId, RoleSet, SectionLink, SectionNode};
use rolerag_directory::{DirectoryFixture, JsonDirectory, RoleRow};
use rolerag_knowledge::{EmbeddingRecord, FaqCollection, KnowledgeSnapshot, SectionForest, SectionVector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A provider with one fixed embedding and one scripted answer.
pub struct ScriptedProvider {
    answer: String,
    vector: Vec<f32>,
    embedded: Mutex<Vec<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.into(),
            vector: vec![1.0, 0.0, 0.0],
            embedded: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = vector;
        self
    }

    /// Texts passed to `embed`, in call order.
    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    /// Completion requests received, in call order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        Ok(ProviderResponse {
            message: Message::assistant(&self.answer),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let count = request.inputs.len();
        self.embedded.lock().unwrap().extend(request.inputs);
        Ok(EmbeddingResponse {
            embeddings: vec![self.vector.clone(); count],
            model: request.model,
        })
    }
}

/// A directory whose every lookup fails.
pub struct FailingDirectory;

#[async_trait]
impl Directory for FailingDirectory {
    fn name(&self) -> &str {
        "failing"
    }

    async fn sections(&self) -> Result<Vec<SectionNode>, DirectoryError> {
        Err(DirectoryError::QueryFailed("connection reset".into()))
    }

    async fn role_names(&self) -> Result<HashMap<RoleId, String>, DirectoryError> {
        Err(DirectoryError::QueryFailed("connection reset".into()))
    }

    async fn resolve_section_link(&self, _name: &str, _roles: &RoleSet) -> Result<SectionLink, DirectoryError> {
        Err(DirectoryError::QueryFailed("connection reset".into()))
    }

    async fn validate_employee(&self, _code: &str) -> Result<EmployeeStatus, DirectoryError> {
        Err(DirectoryError::QueryFailed("connection reset".into()))
    }
}

fn node(id: i64, parent: Option<i64>, name: &str, order: i64, roles: &[RoleId], link: Option<&str>) -> SectionNode {
    SectionNode {
        id,
        parent_id: parent,
        name: name.into(),
        order,
        visible_to_roles: roles.iter().copied().collect(),
        link: link.map(String::from),
    }
}

/// The HR menu used across pipeline tests.
pub fn sections() -> Vec<SectionNode> {
    vec![
        node(1, None, "Leave Management", 0, &[], Some("#")),
        node(2, Some(1), "Leave Application Form", 0, &[], Some("/leave/apply/")),
        node(3, Some(1), "Leave Register", 1, &[], Some("/leave/register/")),
        node(4, None, "Payroll", 1, &[7, 15], Some("#")),
        node(5, Some(4), "Salary Processing", 0, &[7, 15], Some("/payroll/salary/")),
        node(6, None, "Holiday Calendar", 2, &[], None),
    ]
}

pub fn role_names() -> HashMap<RoleId, String> {
    HashMap::from([
        (2, "Employee".to_string()),
        (7, "HR".to_string()),
        (10, "Manager".to_string()),
    ])
}

pub fn directory() -> Arc<dyn Directory> {
    let roles = role_names()
        .into_iter()
        .map(|(id, name)| RoleRow { id, name })
        .collect();
    Arc::new(JsonDirectory::new(DirectoryFixture {
        roles,
        sections: sections(),
        employees: Vec::new(),
    }))
}

/// A unit vector whose cosine with `[1, 0, 0]` is `score`.
fn scoring(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).sqrt(), 0.0]
}

/// A snapshot where the leave policy scores 0.9, the general FAQ scores
/// `faq_score`, and only "Leave Register" clears the section floor.
pub fn snapshot(faq_score: f32) -> KnowledgeSnapshot {
    let policies = vec![
        EmbeddingRecord::new(
            "leave-policy",
            "Employees accrue 1.5 days of paid leave per month, credited on the first working day.",
            scoring(0.9),
        ),
        EmbeddingRecord::new("travel-policy", "Travel must be approved in advance.", vec![0.0, 1.0, 0.0]),
        EmbeddingRecord::new("holiday-policy", "The holiday list is published each January.", vec![0.0, 0.0, 1.0]),
    ];

    let faqs = FaqCollection {
        general: vec![
            EmbeddingRecord::new("faq-1", "How many leaves do I get?", scoring(faq_score))
                .with_metadata("answer", "18 days per year."),
        ],
        managerial: Vec::new(),
        hr: Vec::new(),
    };

    let forest = SectionForest::new(sections()).unwrap();
    let section_vectors = forest
        .nodes()
        .iter()
        .map(|n| SectionVector {
            node_id: n.id,
            record: EmbeddingRecord::new(
                n.id.to_string(),
                n.name.clone(),
                if n.name == "Leave Register" { vec![1.0, 0.0, 0.0] } else { vec![0.0, 0.0, 1.0] },
            ),
        })
        .collect();

    KnowledgeSnapshot::new(policies, faqs, forest, section_vectors, role_names()).unwrap()
}
