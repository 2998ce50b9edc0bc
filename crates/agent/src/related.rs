//! The "Related sections" block appended to answers.

use serde::{Deserialize, Serialize};

/// A section the answer points to, with an absolute link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedSection {
    pub name: String,
    pub url: String,
}

/// Join a platform link onto the base URL. Absolute links pass through.
pub fn join_url(base: &str, link: &str) -> String {
    let link = link.trim();
    if link.starts_with("http://") || link.starts_with("https://") {
        return link.to_string();
    }
    let base = base.trim().trim_end_matches('/');
    if base.is_empty() {
        return link.to_string();
    }
    format!("{base}/{}", link.trim_start_matches('/'))
}

/// `answer` followed by a markdown link list, or `answer` alone when
/// nothing resolved.
pub fn append_related(answer: &str, related: &[RelatedSection]) -> String {
    if related.is_empty() {
        return answer.to_string();
    }
    let links: Vec<String> = related
        .iter()
        .map(|r| format!("- [{}]({})", r.name, r.url))
        .collect();
    format!("{answer}\n\nRelated sections:\n{}", links.join("\n"))
}
