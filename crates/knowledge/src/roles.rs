//! Role → FAQ tier resolution.
//!
//! Every caller sees the general tier. Additional tiers are unlocked by
//! specific role identifiers, listed in a declarative table built from
//! configuration.

use crate::record::EmbeddingRecord;
use rolerag_config::{FaqFallback, RolesConfig};
use rolerag_core::{RoleId, RoleSet};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Audience classification of an FAQ collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoleTier {
    General,
    Managerial,
    Hr,
}

impl RoleTier {
    pub const ALL: [RoleTier; 3] = [RoleTier::General, RoleTier::Managerial, RoleTier::Hr];
}

impl fmt::Display for RoleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoleTier::General => "general",
            RoleTier::Managerial => "managerial",
            RoleTier::Hr => "hr",
        })
    }
}

/// Declarative `roleId -> tier` mapping.
#[derive(Debug, Clone)]
pub struct RoleTierTable {
    tiers: HashMap<RoleId, RoleTier>,
    known_roles: BTreeSet<RoleId>,
    fallback: FaqFallback,
}

impl RoleTierTable {
    pub fn from_config(config: &RolesConfig) -> Self {
        let mut tiers = HashMap::new();
        for &role in &config.manager_roles {
            tiers.insert(role, RoleTier::Managerial);
        }
        for &role in &config.hr_roles {
            tiers.insert(role, RoleTier::Hr);
        }

        let mut known_roles: BTreeSet<RoleId> = config.known_roles.iter().copied().collect();
        known_roles.extend(tiers.keys().copied());

        Self {
            tiers,
            known_roles,
            fallback: config.faq_fallback,
        }
    }

    /// The tier a single role unlocks, if any.
    pub fn tier_of(&self, role: RoleId) -> Option<RoleTier> {
        self.tiers.get(&role).copied()
    }

    /// Tiers visible to a caller. Always contains `General`.
    pub fn tiers_for(&self, roles: &RoleSet) -> BTreeSet<RoleTier> {
        let mut tiers = BTreeSet::from([RoleTier::General]);
        tiers.extend(roles.iter().filter_map(|r| self.tier_of(r)));

        if self.fallback == FaqFallback::UnlistedRolesSeeAll
            && roles.iter().any(|r| !self.known_roles.contains(&r))
        {
            tiers.extend(RoleTier::ALL);
        }
        tiers
    }
}

impl Default for RoleTierTable {
    fn default() -> Self {
        Self::from_config(&RolesConfig::default())
    }
}

/// FAQ records, one collection per tier.
#[derive(Debug, Clone, Default)]
pub struct FaqCollection {
    pub general: Vec<EmbeddingRecord>,
    pub managerial: Vec<EmbeddingRecord>,
    pub hr: Vec<EmbeddingRecord>,
}

impl FaqCollection {
    pub fn tier(&self, tier: RoleTier) -> &[EmbeddingRecord] {
        match tier {
            RoleTier::General => &self.general,
            RoleTier::Managerial => &self.managerial,
            RoleTier::Hr => &self.hr,
        }
    }

    pub fn len(&self) -> usize {
        self.general.len() + self.managerial.len() + self.hr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The FAQ records a caller may be matched against.
    pub fn resolve_faq_scope(&self, table: &RoleTierTable, roles: &RoleSet) -> FaqScope<'_> {
        FaqScope {
            parts: table
                .tiers_for(roles)
                .into_iter()
                .map(|tier| (tier, self.tier(tier)))
                .collect(),
        }
    }
}

/// A borrowed union of FAQ tiers, in tier order.
#[derive(Debug, Clone)]
pub struct FaqScope<'a> {
    parts: Vec<(RoleTier, &'a [EmbeddingRecord])>,
}

impl<'a> FaqScope<'a> {
    pub fn tiers(&self) -> impl Iterator<Item = RoleTier> + '_ {
        self.parts.iter().map(|(tier, _)| *tier)
    }

    pub fn records(&self) -> impl Iterator<Item = &'a EmbeddingRecord> + '_ {
        self.parts.iter().flat_map(|&(_, records)| records.iter())
    }

    pub fn len(&self) -> usize {
        self.parts.iter().map(|(_, r)| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faqs() -> FaqCollection {
        FaqCollection {
            general: vec![EmbeddingRecord::new("g1", "How do I apply for leave?", vec![1.0, 0.0])],
            managerial: vec![EmbeddingRecord::new("m1", "How do I approve leave?", vec![0.0, 1.0])],
            hr: vec![
                EmbeddingRecord::new("h1", "How do I run payroll?", vec![1.0, 1.0]),
                EmbeddingRecord::new("h2", "How do I onboard someone?", vec![1.0, -1.0]),
            ],
        }
    }

    fn ids(scope: &FaqScope<'_>) -> Vec<String> {
        scope.records().map(|r| r.source_id.clone()).collect()
    }

    fn roles(ids: &[RoleId]) -> RoleSet {
        RoleSet::from(ids)
    }

    #[test]
    fn employee_sees_general_only() {
        let faqs = faqs();
        let scope = faqs.resolve_faq_scope(&RoleTierTable::default(), &roles(&[2]));
        assert_eq!(ids(&scope), vec!["g1"]);
    }

    #[test]
    fn manager_sees_general_and_managerial() {
        let faqs = faqs();
        let scope = faqs.resolve_faq_scope(&RoleTierTable::default(), &roles(&[2, 10]));
        assert_eq!(ids(&scope), vec!["g1", "m1"]);

        let scope = faqs.resolve_faq_scope(&RoleTierTable::default(), &roles(&[13]));
        assert_eq!(scope.tiers().collect::<Vec<_>>(), vec![RoleTier::General, RoleTier::Managerial]);
    }

    #[test]
    fn hr_sees_general_and_hr() {
        let faqs = faqs();
        let scope = faqs.resolve_faq_scope(&RoleTierTable::default(), &roles(&[2, 7]));
        assert_eq!(ids(&scope), vec!["g1", "h1", "h2"]);
        assert_eq!(scope.len(), 3);
    }

    #[test]
    fn default_roles_see_everything() {
        let faqs = faqs();
        let scope = faqs.resolve_faq_scope(&RoleTierTable::default(), &roles(&[2, 10, 7]));
        assert_eq!(scope.len(), faqs.len());
    }

    #[test]
    fn empty_role_set_degrades_to_general() {
        let faqs = faqs();
        let scope = faqs.resolve_faq_scope(&RoleTierTable::default(), &RoleSet::new());
        assert_eq!(ids(&scope), vec!["g1"]);
    }

    #[test]
    fn unlisted_role_is_inert_by_default() {
        let table = RoleTierTable::default();
        assert_eq!(table.tiers_for(&roles(&[99])), BTreeSet::from([RoleTier::General]));
    }

    #[test]
    fn unlisted_role_fallback_grants_all_tiers() {
        let config = RolesConfig {
            faq_fallback: FaqFallback::UnlistedRolesSeeAll,
            ..RolesConfig::default()
        };
        let table = RoleTierTable::from_config(&config);
        assert_eq!(table.tiers_for(&roles(&[99])).len(), 3);
        // Listed roles still follow the table.
        assert_eq!(table.tiers_for(&roles(&[2])), BTreeSet::from([RoleTier::General]));
    }

    #[test]
    fn empty_tier_yields_empty_part() {
        let faqs = FaqCollection {
            general: vec![],
            ..faqs()
        };
        let scope = faqs.resolve_faq_scope(&RoleTierTable::default(), &roles(&[2]));
        assert!(scope.is_empty());
    }
}
