//! The navigable section forest and its per-role rendering.
//!
//! The forest is validated once when a snapshot is built. Rendering for a
//! role set filters nodes by visibility, reattaches orphans to the root,
//! orders siblings by `order` (stable), and produces both the indented
//! text given to the model and a normalized-name index over the same
//! visible sections.

use rolerag_core::directory::normalize_section_name;
use rolerag_core::error::KnowledgeError;
use rolerag_core::{RoleId, RoleSet, SectionNode};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

/// A validated section forest.
#[derive(Debug, Clone, Default)]
pub struct SectionForest {
    nodes: Vec<SectionNode>,
    positions: HashMap<i64, usize>,
}

impl SectionForest {
    /// Validate and wrap the raw menu rows.
    ///
    /// Duplicate ids and parent cycles are rejected. A parent id that is not
    /// in the set is tolerated; such nodes render at the top level.
    pub fn new(nodes: Vec<SectionNode>) -> Result<Self, KnowledgeError> {
        let mut positions = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            if positions.insert(node.id, pos).is_some() {
                return Err(KnowledgeError::InvalidHierarchy(format!(
                    "duplicate section id {}",
                    node.id
                )));
            }
        }

        for node in &nodes {
            let mut seen = HashSet::from([node.id]);
            let mut parent = node.parent_id;
            while let Some(pid) = parent {
                let Some(&pos) = positions.get(&pid) else {
                    break;
                };
                if !seen.insert(pid) {
                    return Err(KnowledgeError::InvalidHierarchy(format!(
                        "section {} is part of a parent cycle",
                        node.id
                    )));
                }
                parent = nodes[pos].parent_id;
            }
        }

        Ok(Self { nodes, positions })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, in relation order.
    pub fn nodes(&self) -> &[SectionNode] {
        &self.nodes
    }

    pub fn get(&self, id: i64) -> Option<&SectionNode> {
        self.positions.get(&id).map(|&pos| &self.nodes[pos])
    }

    /// Render the sections visible to `roles`.
    pub fn render(&self, roles: &RoleSet, role_names: &HashMap<RoleId, String>) -> RenderedHierarchy {
        let visible: HashSet<i64> = self
            .nodes
            .iter()
            .filter(|n| n.is_visible_to(roles))
            .map(|n| n.id)
            .collect();

        // Children lists keep relation order, so the stable sort below only
        // reorders by `order`.
        let mut children: HashMap<Option<i64>, Vec<&SectionNode>> = HashMap::new();
        for node in self.nodes.iter().filter(|n| visible.contains(&n.id)) {
            let parent = node.parent_id.filter(|p| visible.contains(p));
            children.entry(parent).or_default().push(node);
        }
        for siblings in children.values_mut() {
            siblings.sort_by_key(|n| n.order);
        }

        let mut rendered = RenderedHierarchy::default();
        let mut stack: Vec<(&SectionNode, usize)> = children
            .get(&None)
            .map(|roots| roots.iter().rev().map(|n| (*n, 0)).collect())
            .unwrap_or_default();

        while let Some((node, depth)) = stack.pop() {
            let label = access_label(node, roles, role_names);
            let _ = writeln!(
                rendered.text,
                "{}- {}{}",
                "  ".repeat(depth),
                node.name,
                label
            );
            rendered.entries.push(RenderedSection {
                id: node.id,
                name: node.name.clone(),
                depth,
            });
            if let Some(kids) = children.get(&Some(node.id)) {
                stack.extend(kids.iter().rev().map(|k| (*k, depth + 1)));
            }
        }

        rendered.index = SectionIndex::build(&rendered.entries);
        rendered
    }
}

/// ` (Only for: A, B)` naming the caller's roles that grant a restricted node.
fn access_label(node: &SectionNode, roles: &RoleSet, role_names: &HashMap<RoleId, String>) -> String {
    if node.visible_to_roles.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = node
        .visible_to_roles
        .iter()
        .filter(|r| roles.contains(**r))
        .filter_map(|r| role_names.get(r).map(String::as_str))
        .collect();
    if names.is_empty() {
        String::new()
    } else {
        format!(" (Only for: {})", names.join(", "))
    }
}

/// One line of a rendered hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    pub id: i64,
    pub name: String,
    pub depth: usize,
}

/// The hierarchy as one caller sees it.
#[derive(Debug, Clone, Default)]
pub struct RenderedHierarchy {
    pub text: String,
    pub entries: Vec<RenderedSection>,
    pub index: SectionIndex,
}

impl RenderedHierarchy {
    /// Visible section names in hierarchy order, one per normalized name.
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(pos, e)| self.index.position(&e.name) == Some(*pos))
            .map(|(_, e)| e.name.as_str())
            .collect()
    }

    /// `names` with later repeats of a normalized name dropped.
    pub fn distinct<'n>(names: impl IntoIterator<Item = &'n str>) -> Vec<&'n str> {
        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|name| seen.insert(normalize_section_name(name)))
            .collect()
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.index.ids.contains(&id)
    }
}

/// Lookup of visible sections by normalized name.
///
/// When two visible sections share a name, the first in hierarchy order wins.
#[derive(Debug, Clone, Default)]
pub struct SectionIndex {
    by_name: HashMap<String, usize>,
    ids: HashSet<i64>,
}

impl SectionIndex {
    fn build(entries: &[RenderedSection]) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            by_name.entry(normalize_section_name(&entry.name)).or_insert(pos);
        }
        Self {
            by_name,
            ids: entries.iter().map(|e| e.id).collect(),
        }
    }

    /// Position of a section in hierarchy order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(&normalize_section_name(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
