use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job category an agent is registered under.
///
/// Each role maps to a fixed capability set in the capability catalog and to
/// exactly one workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owns scope and priorities during discovery.
    ProductManager,
    /// Researches the market and users.
    MarketResearcher,
    /// Produces flows, wireframes and prototypes.
    UxDesigner,
    /// Builds client-side code.
    FrontendDeveloper,
    /// Builds server-side code and data access.
    BackendDeveloper,
    /// Verifies builds before they ship.
    QaEngineer,
    /// Deploys and operates releases.
    DevopsEngineer,
    /// Audits for vulnerabilities.
    SecurityAnalyst,
    /// Runs acquisition and content campaigns.
    GrowthMarketer,
    /// Reports on product metrics.
    DataAnalyst,
    /// Handles incidents and user issues after launch.
    SupportEngineer,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 11] = [
        Role::ProductManager,
        Role::MarketResearcher,
        Role::UxDesigner,
        Role::FrontendDeveloper,
        Role::BackendDeveloper,
        Role::QaEngineer,
        Role::DevopsEngineer,
        Role::SecurityAnalyst,
        Role::GrowthMarketer,
        Role::DataAnalyst,
        Role::SupportEngineer,
    ];

    /// The wire tag of this role (`backend_developer`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ProductManager => "product_manager",
            Role::MarketResearcher => "market_researcher",
            Role::UxDesigner => "ux_designer",
            Role::FrontendDeveloper => "frontend_developer",
            Role::BackendDeveloper => "backend_developer",
            Role::QaEngineer => "qa_engineer",
            Role::DevopsEngineer => "devops_engineer",
            Role::SecurityAnalyst => "security_analyst",
            Role::GrowthMarketer => "growth_marketer",
            Role::DataAnalyst => "data_analyst",
            Role::SupportEngineer => "support_engineer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::ForemanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| crate::ForemanError::not_found("role", s))
    }
}
