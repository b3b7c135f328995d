use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ProvisionError;
use crate::action_group::ActionGroupDefinition;
use crate::agent::{AgentDefinition, AgentSummary, AliasSummary, GuardrailRef, KnowledgeBaseSummary};
use crate::guardrail::GuardrailDefinition;

/// アクショングループの状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGroupSummary {
    pub agent_id: String,
    pub action_group_id: String,
    pub name: String,
    pub state: String,
}

/// 作成したガードレール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailSummary {
    pub guardrail_id: String,
    pub guardrail_arn: String,
    /// 作成直後は "DRAFT"、バージョン発行後はその番号
    pub version: String,
}

impl GuardrailSummary {
    pub fn to_ref(&self) -> GuardrailRef {
        GuardrailRef {
            guardrail_id: self.guardrail_id.clone(),
            version: self.version.clone(),
        }
    }
}

/// Bedrock コントロールプレーンの操作
///
/// オーケストレーション層はこのトレイト越しに API を呼び出す。
/// 本番では [`crate::BedrockControlPlane`]、テストではスクリプト化した実装を使う。
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentSummary, ProvisionError>;

    async fn get_agent(&self, agent_id: &str) -> Result<AgentSummary, ProvisionError>;

    /// DRAFT バージョンを準備し、受理直後のステータスを返す
    async fn prepare_agent(&self, agent_id: &str) -> Result<String, ProvisionError>;

    /// 既存のエージェント設定を書き換える（ガードレールの付け外しを含む）
    async fn update_agent(
        &self,
        agent: &AgentSummary,
        guardrail: Option<&GuardrailRef>,
    ) -> Result<AgentSummary, ProvisionError>;

    async fn create_agent_alias(
        &self,
        agent_id: &str,
        alias_name: &str,
    ) -> Result<AliasSummary, ProvisionError>;

    async fn get_agent_alias(
        &self,
        agent_id: &str,
        alias_id: &str,
    ) -> Result<AliasSummary, ProvisionError>;

    /// エイリアスを最新の準備済みバージョンに向け直す
    async fn update_agent_alias(
        &self,
        agent_id: &str,
        alias_id: &str,
        alias_name: &str,
    ) -> Result<AliasSummary, ProvisionError>;

    async fn create_action_group(
        &self,
        agent_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError>;

    async fn get_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
    ) -> Result<ActionGroupSummary, ProvisionError>;

    async fn update_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError>;

    async fn associate_knowledge_base(
        &self,
        agent_id: &str,
        knowledge_base_id: &str,
        description: &str,
    ) -> Result<KnowledgeBaseSummary, ProvisionError>;

    async fn create_guardrail(
        &self,
        definition: &GuardrailDefinition,
    ) -> Result<GuardrailSummary, ProvisionError>;

    /// ガードレールの現行 DRAFT からバージョンを発行し、その番号を返す
    async fn create_guardrail_version(&self, guardrail_id: &str) -> Result<String, ProvisionError>;
}
