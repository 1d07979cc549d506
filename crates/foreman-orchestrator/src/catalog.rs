use crate::types::{capability_set, CapabilitySet};
use foreman_core::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Capabilities and concurrency a role supports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleProfile {
    pub role: Role,
    pub capabilities: CapabilitySet,
    pub max_concurrent: u32,
}

/// Immutable lookup table from role to its [`RoleProfile`].
#[derive(Debug, Clone)]
pub struct CapabilityCatalog {
    profiles: HashMap<Role, RoleProfile>,
}

impl CapabilityCatalog {
    /// Build a catalog from custom profiles. Roles without a profile have no
    /// capabilities and a capacity of one.
    pub fn with_profiles(profiles: Vec<RoleProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.role, p)).collect(),
        }
    }

    pub fn capabilities_of(&self, role: Role) -> CapabilitySet {
        self.profiles
            .get(&role)
            .map(|p| p.capabilities.clone())
            .unwrap_or_default()
    }

    pub fn capacity_of(&self, role: Role) -> u32 {
        self.profiles.get(&role).map_or(1, |p| p.max_concurrent)
    }

    pub fn profile(&self, role: Role) -> Option<&RoleProfile> {
        self.profiles.get(&role)
    }

    /// All profiles in [`Role::ALL`] order.
    pub fn profiles(&self) -> Vec<&RoleProfile> {
        Role::ALL
            .iter()
            .filter_map(|r| self.profiles.get(r))
            .collect()
    }

    /// Roles whose capability set covers `required`.
    pub fn roles_covering(&self, required: &CapabilitySet) -> Vec<Role> {
        self.profiles()
            .into_iter()
            .filter(|p| required.is_subset(&p.capabilities))
            .map(|p| p.role)
            .collect()
    }
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        Self::with_profiles(default_profiles())
    }
}

/// The built-in role table.
pub fn default_profiles() -> Vec<RoleProfile> {
    vec![
        profile(Role::ProductManager, &["plan", "research", "analyze"], 2),
        profile(Role::MarketResearcher, &["research", "analyze", "report"], 2),
        profile(Role::UxDesigner, &["design", "prototype", "research"], 1),
        profile(Role::FrontendDeveloper, &["generate", "analyze", "ui", "test"], 1),
        profile(Role::BackendDeveloper, &["generate", "analyze", "database", "test"], 1),
        profile(Role::QaEngineer, &["test", "review", "analyze"], 2),
        profile(Role::DevopsEngineer, &["deploy", "monitor", "generate"], 2),
        profile(Role::SecurityAnalyst, &["audit", "analyze", "review"], 1),
        profile(Role::GrowthMarketer, &["market", "content", "analyze"], 2),
        profile(Role::DataAnalyst, &["analyze", "report", "database"], 2),
        profile(Role::SupportEngineer, &["support", "debug", "monitor"], 3),
    ]
}

fn profile(role: Role, capabilities: &[&str], max_concurrent: u32) -> RoleProfile {
    RoleProfile {
        role,
        capabilities: capability_set(capabilities.iter().copied()),
        max_concurrent,
    }
}
