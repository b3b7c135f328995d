pub mod action_group;
pub mod agent;
pub mod bedrock;
pub mod config;
pub mod control_plane;
pub mod error;
pub mod guardrail;
pub mod session;
pub mod wait;
pub mod workflow;

pub use action_group::{ActionGroupDefinition, ActionGroupKind, FunctionDefinition};
pub use agent::{AgentDefinition, AgentSummary, AliasSummary, GuardrailRef, KnowledgeBaseSummary};
pub use bedrock::BedrockControlPlane;
pub use config::{ProvisionConfig, SupportSettings};
pub use control_plane::{ActionGroupSummary, ControlPlane, GuardrailSummary};
pub use error::ProvisionError;
pub use guardrail::GuardrailDefinition;
pub use session::{AgentReply, AgentSession, ReplyEvent};
pub use wait::WaitConfig;
pub use workflow::{Provisioner, SetupReport};
