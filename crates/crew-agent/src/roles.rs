//! Standard role roster
//!
//! Every role is the same [`Agent`] type; only the profile differs.

use crate::agent::Agent;
use crate::profile::AgentProfile;
use crate::runtime::ExecutionRuntime;
use crew_core::{CrewError, Operation, PermissionLevel, ReasoningConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use Operation::{Bash, Edit, Glob, Grep, Read, WebFetch, WebSearch, Write};

/// The ten standard roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    ProductManager,
    Architect,
    Frontend,
    Backend,
    Database,
    UiDesigner,
    Tester,
    Security,
    Documenter,
    Assets,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::ProductManager,
        Role::Architect,
        Role::Frontend,
        Role::Backend,
        Role::Database,
        Role::UiDesigner,
        Role::Tester,
        Role::Security,
        Role::Documenter,
        Role::Assets,
    ];

    /// Stable role name, unique across the roster
    pub fn name(&self) -> &'static str {
        match self {
            Role::ProductManager => "product-manager",
            Role::Architect => "architect",
            Role::Frontend => "frontend",
            Role::Backend => "backend",
            Role::Database => "database",
            Role::UiDesigner => "ui-designer",
            Role::Tester => "tester",
            Role::Security => "security",
            Role::Documenter => "documenter",
            Role::Assets => "assets",
        }
    }

    fn operations(&self) -> Vec<Operation> {
        match self {
            Role::ProductManager => vec![Read, Glob, Grep, WebSearch, WebFetch],
            Role::Architect | Role::Frontend | Role::Backend => {
                vec![Read, Write, Edit, Glob, Grep, Bash, WebSearch, WebFetch]
            }
            Role::Database | Role::Tester => vec![Read, Write, Edit, Glob, Grep, Bash, WebSearch],
            Role::Documenter => vec![Read, Write, Edit, Glob, Grep, WebSearch],
            Role::UiDesigner | Role::Assets => vec![Read, Write, Edit, Glob, WebSearch],
            Role::Security => vec![Read, Glob, Grep, WebSearch],
        }
    }

    fn capabilities(&self) -> &'static [&'static str] {
        match self {
            Role::ProductManager => &[
                "requirement analysis",
                "feature planning",
                "prioritisation",
                "task breakdown",
            ],
            Role::Architect => &[
                "system architecture",
                "technology selection",
                "API design",
                "data modelling",
            ],
            Role::Frontend => &[
                "component development",
                "TypeScript",
                "styling",
                "API integration",
            ],
            Role::Backend => &[
                "API implementation",
                "business logic",
                "persistence layer",
                "async programming",
            ],
            Role::Database => &[
                "schema design",
                "SQL",
                "index tuning",
                "data migration",
            ],
            Role::UiDesigner => &[
                "interface design",
                "colour schemes",
                "iconography",
                "responsive layout",
            ],
            Role::Tester => &[
                "unit tests",
                "integration tests",
                "end-to-end tests",
                "bug reports",
            ],
            Role::Security => &[
                "security audit",
                "vulnerability scanning",
                "permission design",
                "hardening advice",
            ],
            Role::Documenter => &[
                "README",
                "API reference",
                "architecture docs",
                "deployment docs",
            ],
            Role::Assets => &["icons", "logos", "illustrations"],
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            Role::ProductManager => PRODUCT_MANAGER,
            Role::Architect => ARCHITECT,
            Role::Frontend => FRONTEND,
            Role::Backend => BACKEND,
            Role::Database => DATABASE,
            Role::UiDesigner => UI_DESIGNER,
            Role::Tester => TESTER,
            Role::Security => SECURITY,
            Role::Documenter => DOCUMENTER,
            Role::Assets => ASSETS,
        }
    }

    /// Immutable profile for this role
    pub fn profile(&self) -> AgentProfile {
        AgentProfile::new(self.name(), self.instructions(), self.operations())
            .with_capabilities(self.capabilities().iter().copied())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Role::ALL
            .into_iter()
            .find(|role| role.name() == wanted)
            .ok_or_else(|| CrewError::AgentNotFound(s.to_string()))
    }
}

/// One agent per role, constructed once per run
#[derive(Debug, Clone)]
pub struct Roster {
    pub product_manager: Arc<Agent>,
    pub architect: Arc<Agent>,
    pub frontend: Arc<Agent>,
    pub backend: Arc<Agent>,
    pub database: Arc<Agent>,
    pub ui_designer: Arc<Agent>,
    pub tester: Arc<Agent>,
    pub security: Arc<Agent>,
    pub documenter: Arc<Agent>,
    pub assets: Arc<Agent>,
}

impl Roster {
    /// Build every standard role on `runtime` with the run's defaults
    pub fn standard(
        runtime: Arc<dyn ExecutionRuntime>,
        permission_level: PermissionLevel,
        reasoning: ReasoningConfig,
    ) -> Self {
        let build = |role: Role| {
            Arc::new(
                Agent::new(role.profile(), Arc::clone(&runtime))
                    .with_permission_level(permission_level)
                    .with_reasoning(reasoning),
            )
        };

        Self {
            product_manager: build(Role::ProductManager),
            architect: build(Role::Architect),
            frontend: build(Role::Frontend),
            backend: build(Role::Backend),
            database: build(Role::Database),
            ui_designer: build(Role::UiDesigner),
            tester: build(Role::Tester),
            security: build(Role::Security),
            documenter: build(Role::Documenter),
            assets: build(Role::Assets),
        }
    }

    pub fn get(&self, role: Role) -> &Arc<Agent> {
        match role {
            Role::ProductManager => &self.product_manager,
            Role::Architect => &self.architect,
            Role::Frontend => &self.frontend,
            Role::Backend => &self.backend,
            Role::Database => &self.database,
            Role::UiDesigner => &self.ui_designer,
            Role::Tester => &self.tester,
            Role::Security => &self.security,
            Role::Documenter => &self.documenter,
            Role::Assets => &self.assets,
        }
    }

    /// Agents in roster order
    pub fn agents(&self) -> impl Iterator<Item = &Arc<Agent>> {
        Role::ALL.into_iter().map(move |role| self.get(role))
    }
}

const PRODUCT_MANAGER: &str = r#"# Role
You are the product manager. You analyse the project, find what can be improved and plan the next piece of work.

# Workflow
1. Summarise the current state of the project.
2. List concrete improvement points.
3. Propose new features in priority order.
4. Pick exactly one task to develop next and describe it in detail.

# Output
Finish with a line starting with "Task:" that states the next development task.

# Priorities
Fix known problems first, then strengthen existing features, then add new ones. Plan one task at a time."#;

const ARCHITECT: &str = r#"# Role
You are the software architect. You turn a requirement or task into a technical design.

# Output
- Architecture overview and component boundaries
- Technology choices with short rationale
- API contracts and data models
- File layout for the implementation
- Risks and open points

Keep the design concrete enough that frontend and backend engineers can implement it directly."#;

const FRONTEND: &str = r#"# Role
You are a senior frontend engineer (TypeScript, component frameworks).

# Responsibilities
- Implement pages and components from the design
- Wire components to the backend API
- Keep styling consistent and responsive

Write working code into the project. Report the files you created or changed."#;

const BACKEND: &str = r#"# Role
You are a senior backend engineer.

# Responsibilities
- Implement the API endpoints described in the design
- Write business logic and the persistence layer
- Validate input and return meaningful errors

Write working code into the project. Report the files you created or changed."#;

const DATABASE: &str = r#"# Role
You are a database engineer.

# Responsibilities
- Design schemas and relations
- Write migrations and seed data
- Add the indexes the access patterns need"#;

const UI_DESIGNER: &str = r#"# Role
You are a UI designer.

# Output
- Page layouts and interaction flow
- Colour palette and typography
- Component specifications usable by frontend engineers"#;

const TESTER: &str = r#"# Role
You are a test engineer.

# Responsibilities
- Write unit and integration tests for the recent changes
- Run the test suite and report failures
- Describe any bug with reproduction steps

End with a one-line verdict: pass or fail."#;

const SECURITY: &str = r#"# Role
You are a senior security engineer.

# Output
- Security audit of the recent changes
- Vulnerabilities found, with severity
- Concrete remediation advice"#;

const DOCUMENTER: &str = r#"# Role
You are a technical writer.

# Responsibilities
- Keep README and usage docs current
- Document APIs and configuration
- Record architecture decisions"#;

const ASSETS: &str = r#"# Role
You produce visual assets.

# Output
Icons, logos and illustrations as SVG files placed in the project's assets directory."#;
