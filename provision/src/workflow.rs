//! エージェント構成手順のオーケストレーション
//!
//! 各手順は「API 呼び出し → リモートが目標ステータスに達するまで待機」の組で、
//! 前の手順の結果（ID）を次の手順に渡して順番に実行する。
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ProvisionError;
use crate::action_group::{
    ActionGroupDefinition, code_interpreter_action_group, initial_support_functions,
    support_action_group, support_functions,
};
use crate::agent::{AgentDefinition, AgentSummary, AliasSummary, KnowledgeBaseSummary, status};
use crate::config::SupportSettings;
use crate::control_plane::{ActionGroupSummary, ControlPlane, GuardrailSummary};
use crate::guardrail::{GuardrailDefinition, support_guardrail};
use crate::wait::{
    WaitConfig, wait_for_action_group_status, wait_for_agent_alias_status, wait_for_agent_status,
};

/// 一連の構成を実行した結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupReport {
    pub agent: AgentSummary,
    pub alias: AliasSummary,
    pub action_groups: Vec<ActionGroupSummary>,
    pub guardrail: GuardrailSummary,
}

/// コントロールプレーンに対して構成手順を実行する
pub struct Provisioner<C> {
    control_plane: C,
    wait: WaitConfig,
}

impl<C: ControlPlane> Provisioner<C> {
    pub fn new(control_plane: C, wait: WaitConfig) -> Self {
        Self {
            control_plane,
            wait,
        }
    }

    pub fn control_plane(&self) -> &C {
        &self.control_plane
    }

    /// エージェントを作成し、NOT_PREPARED になるまで待機する
    pub async fn create_agent(
        &self,
        definition: &AgentDefinition,
    ) -> Result<AgentSummary, ProvisionError> {
        info!(name = %definition.name, model = %definition.foundation_model, "creating agent");
        let created = self.control_plane.create_agent(definition).await?;
        wait_for_agent_status(
            &self.control_plane,
            &created.agent_id,
            status::NOT_PREPARED,
            &self.wait,
        )
        .await?;
        self.control_plane.get_agent(&created.agent_id).await
    }

    /// DRAFT バージョンを準備し、PREPARED になるまで待機する
    pub async fn prepare_agent(&self, agent_id: &str) -> Result<AgentSummary, ProvisionError> {
        info!(agent_id, "preparing agent");
        self.control_plane.prepare_agent(agent_id).await?;
        wait_for_agent_status(&self.control_plane, agent_id, status::PREPARED, &self.wait).await?;
        self.control_plane.get_agent(agent_id).await
    }

    /// エイリアスを作成し、PREPARED になるまで待機する
    pub async fn create_alias(
        &self,
        agent_id: &str,
        alias_name: &str,
    ) -> Result<AliasSummary, ProvisionError> {
        info!(agent_id, alias_name, "creating agent alias");
        let alias = self
            .control_plane
            .create_agent_alias(agent_id, alias_name)
            .await?;
        wait_for_agent_alias_status(
            &self.control_plane,
            agent_id,
            &alias.alias_id,
            status::PREPARED,
            &self.wait,
        )
        .await?;
        self.control_plane
            .get_agent_alias(agent_id, &alias.alias_id)
            .await
    }

    /// エージェントを再準備し、エイリアスを新しいバージョンに向け直す
    pub async fn refresh_alias(
        &self,
        agent_id: &str,
        alias_id: &str,
        alias_name: &str,
    ) -> Result<AliasSummary, ProvisionError> {
        self.prepare_agent(agent_id).await?;

        info!(agent_id, alias_id, alias_name, "updating agent alias");
        self.control_plane
            .update_agent_alias(agent_id, alias_id, alias_name)
            .await?;
        wait_for_agent_alias_status(
            &self.control_plane,
            agent_id,
            alias_id,
            status::PREPARED,
            &self.wait,
        )
        .await?;
        self.control_plane.get_agent_alias(agent_id, alias_id).await
    }

    /// アクショングループを作成し、ENABLED になるまで待機する
    pub async fn create_action_group(
        &self,
        agent_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        definition.validate()?;
        info!(
            agent_id,
            name = %definition.name,
            functions = ?definition.function_names(),
            "creating action group"
        );
        let group = self
            .control_plane
            .create_action_group(agent_id, definition)
            .await?;
        self.wait_for_action_group(agent_id, &group.action_group_id, definition)
            .await
    }

    /// 既存のアクショングループを定義で置き換え、ENABLED になるまで待機する
    pub async fn update_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        definition.validate()?;
        info!(
            agent_id,
            action_group_id,
            functions = ?definition.function_names(),
            "updating action group"
        );
        let group = self
            .control_plane
            .update_action_group(agent_id, action_group_id, definition)
            .await?;
        self.wait_for_action_group(agent_id, &group.action_group_id, definition)
            .await
    }

    async fn wait_for_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        let target = if definition.enabled {
            status::ENABLED
        } else {
            status::DISABLED
        };
        wait_for_action_group_status(
            &self.control_plane,
            agent_id,
            action_group_id,
            target,
            &self.wait,
        )
        .await?;
        self.control_plane
            .get_action_group(agent_id, action_group_id)
            .await
    }

    /// ガードレールを作成してバージョンを発行し、エージェントに適用する
    ///
    /// エージェントの名前・ロール・プロンプト・モデルは現在の値を引き継ぐ。
    /// 適用後の反映にはエージェントの再準備（[`Self::refresh_alias`]）が必要。
    pub async fn attach_guardrail(
        &self,
        agent_id: &str,
        definition: &GuardrailDefinition,
    ) -> Result<GuardrailSummary, ProvisionError> {
        definition.validate()?;

        info!(name = %definition.name, "creating guardrail");
        let mut guardrail = self.control_plane.create_guardrail(definition).await?;
        guardrail.version = self
            .control_plane
            .create_guardrail_version(&guardrail.guardrail_id)
            .await?;
        info!(
            guardrail_id = %guardrail.guardrail_id,
            version = %guardrail.version,
            "published guardrail version"
        );

        let agent = self.control_plane.get_agent(agent_id).await?;
        self.control_plane
            .update_agent(&agent, Some(&guardrail.to_ref()))
            .await?;
        info!(agent_id, "attached guardrail to agent");

        Ok(guardrail)
    }

    /// ナレッジベースを DRAFT バージョンに紐付ける
    pub async fn associate_knowledge_base(
        &self,
        agent_id: &str,
        knowledge_base_id: &str,
        description: &str,
    ) -> Result<KnowledgeBaseSummary, ProvisionError> {
        info!(agent_id, knowledge_base_id, "associating knowledge base");
        self.control_plane
            .associate_knowledge_base(agent_id, knowledge_base_id, description)
            .await
    }

    /// カスタマーサポートエージェントを一から構成する
    ///
    /// 1. エージェント作成・準備、エイリアス作成
    /// 2. サポート用アクショングループ（初版）を追加してエイリアス更新
    /// 3. アクショングループを purchaseSearch 入りの版に更新
    /// 4. コードインタープリタを追加してエイリアス更新
    /// 5. ガードレールを作成・適用してエイリアス更新
    pub async fn run_support_setup(
        &self,
        settings: &SupportSettings,
        role_arn: &str,
        lambda_arn: &str,
    ) -> Result<SetupReport, ProvisionError> {
        let agent = self
            .create_agent(&settings.agent_definition(role_arn))
            .await?;
        let agent_id = agent.agent_id.as_str();
        self.prepare_agent(agent_id).await?;
        let alias = self.create_alias(agent_id, &settings.alias_name).await?;

        let initial = support_action_group(
            &settings.action_group_name,
            lambda_arn,
            initial_support_functions(),
        );
        let support = self.create_action_group(agent_id, &initial).await?;
        self.refresh_alias(agent_id, &alias.alias_id, &settings.alias_name)
            .await?;

        let revised =
            support_action_group(&settings.action_group_name, lambda_arn, support_functions());
        let support = self
            .update_action_group(agent_id, &support.action_group_id, &revised)
            .await?;

        let code_interpreter = self
            .create_action_group(
                agent_id,
                &code_interpreter_action_group(&settings.code_interpreter_name),
            )
            .await?;
        self.refresh_alias(agent_id, &alias.alias_id, &settings.alias_name)
            .await?;

        let guardrail = self
            .attach_guardrail(agent_id, &support_guardrail(&settings.guardrail_name))
            .await?;
        let alias = self
            .refresh_alias(agent_id, &alias.alias_id, &settings.alias_name)
            .await?;

        let agent = self.control_plane.get_agent(agent_id).await?;
        info!(agent_id, alias_id = %alias.alias_id, "support agent setup complete");

        Ok(SetupReport {
            agent,
            alias,
            action_groups: vec![support, code_interpreter],
            guardrail,
        })
    }
}
