/// 構成手順の統合テスト
///
/// スクリプト化したコントロールプレーンに対して Provisioner を実行し、
/// 呼び出し順序・待機・エラー伝播を検証します。AWS 認証情報は不要です。
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use provision::action_group::{
    SUPPORT_ACTION_GROUP_NAME, code_interpreter_action_group, support_action_group,
    support_functions,
};
use provision::guardrail::support_guardrail;
use provision::{
    ActionGroupDefinition, ActionGroupKind, ActionGroupSummary, AgentDefinition, AgentSummary,
    AliasSummary, ControlPlane, GuardrailDefinition, GuardrailRef, GuardrailSummary,
    KnowledgeBaseSummary, ProvisionError, Provisioner, SupportSettings, WaitConfig,
};

const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/AmazonBedrockExecutionRoleForAgents";
const LAMBDA_ARN: &str = "arn:aws:lambda:us-west-2:123456789012:function:support";

/// get_* の呼び出しごとに先頭から払い出し、最後の1つは残し続けるステータス列
#[derive(Default)]
struct StatusScript(VecDeque<String>);

impl StatusScript {
    fn set(&mut self, statuses: &[&str]) {
        self.0 = statuses.iter().map(|s| s.to_string()).collect();
    }

    fn next(&mut self) -> String {
        if self.0.len() > 1 {
            self.0.pop_front().unwrap_or_default()
        } else {
            self.0.front().cloned().unwrap_or_default()
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    agent: Option<AgentSummary>,
    agent_status: StatusScript,
    aliases: HashMap<String, (AliasSummary, StatusScript)>,
    action_groups: HashMap<String, (ActionGroupDefinition, StatusScript)>,
    guardrails: Vec<GuardrailDefinition>,
    prepare_statuses: Vec<&'static str>,
    fail_on: Option<&'static str>,
}

struct ScriptedControlPlane {
    state: Mutex<State>,
}

impl ScriptedControlPlane {
    fn new() -> Self {
        let state = State {
            prepare_statuses: vec!["PREPARING", "PREPARED"],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn failing_on(operation: &'static str) -> Self {
        let plane = Self::new();
        plane.state.lock().unwrap().fail_on = Some(operation);
        plane
    }

    fn with_prepare_statuses(statuses: Vec<&'static str>) -> Self {
        let plane = Self::new();
        plane.state.lock().unwrap().prepare_statuses = statuses;
        plane
    }

    fn with_agent(agent: AgentSummary) -> Self {
        let plane = Self::new();
        {
            let mut state = plane.state.lock().unwrap();
            state.agent_status.set(&[agent.status.as_str()]);
            state.agent = Some(agent);
        }
        plane
    }

    /// get_* を除いた変更系の呼び出し履歴
    fn mutations(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| !c.starts_with("get_"))
            .cloned()
            .collect()
    }

    fn record(&self, call: &str) -> Result<std::sync::MutexGuard<'_, State>, ProvisionError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        if state.fail_on == Some(call) {
            return Err(ProvisionError::AwsSdkError(format!("{} rejected", call)));
        }
        Ok(state)
    }
}

fn current_agent(state: &mut State) -> Result<AgentSummary, ProvisionError> {
    let status = state.agent_status.next();
    let agent = state
        .agent
        .as_mut()
        .ok_or_else(|| ProvisionError::AwsSdkError("ResourceNotFoundException".to_string()))?;
    agent.status = status;
    Ok(agent.clone())
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentSummary, ProvisionError> {
        let mut state = self.record("create_agent")?;
        let agent = AgentSummary {
            agent_id: "AGENT0001".to_string(),
            agent_name: definition.name.clone(),
            status: "CREATING".to_string(),
            instruction: Some(definition.instruction.clone()),
            foundation_model: Some(definition.foundation_model.clone()),
            role_arn: definition.role_arn.clone(),
            guardrail: None,
        };
        state.agent = Some(agent.clone());
        state.agent_status.set(&["CREATING", "NOT_PREPARED"]);
        Ok(agent)
    }

    async fn get_agent(&self, _agent_id: &str) -> Result<AgentSummary, ProvisionError> {
        let mut state = self.record("get_agent")?;
        current_agent(&mut state)
    }

    async fn prepare_agent(&self, _agent_id: &str) -> Result<String, ProvisionError> {
        let mut state = self.record("prepare_agent")?;
        let statuses = state.prepare_statuses.clone();
        state.agent_status.set(&statuses);
        Ok(statuses[0].to_string())
    }

    async fn update_agent(
        &self,
        agent: &AgentSummary,
        guardrail: Option<&GuardrailRef>,
    ) -> Result<AgentSummary, ProvisionError> {
        let mut state = self.record("update_agent")?;
        let mut updated = agent.clone();
        updated.guardrail = guardrail.cloned();
        updated.status = "NOT_PREPARED".to_string();
        state.agent = Some(updated.clone());
        state.agent_status.set(&["UPDATING", "NOT_PREPARED"]);
        Ok(updated)
    }

    async fn create_agent_alias(
        &self,
        agent_id: &str,
        alias_name: &str,
    ) -> Result<AliasSummary, ProvisionError> {
        let mut state = self.record("create_agent_alias")?;
        let alias = AliasSummary {
            agent_id: agent_id.to_string(),
            alias_id: "ALIAS0001".to_string(),
            alias_name: alias_name.to_string(),
            status: "CREATING".to_string(),
        };
        let mut script = StatusScript::default();
        script.set(&["CREATING", "PREPARED"]);
        state
            .aliases
            .insert(alias.alias_id.clone(), (alias.clone(), script));
        Ok(alias)
    }

    async fn get_agent_alias(
        &self,
        _agent_id: &str,
        alias_id: &str,
    ) -> Result<AliasSummary, ProvisionError> {
        let mut state = self.record("get_agent_alias")?;
        let (alias, script) = state
            .aliases
            .get_mut(alias_id)
            .ok_or_else(|| ProvisionError::AwsSdkError("ResourceNotFoundException".to_string()))?;
        alias.status = script.next();
        Ok(alias.clone())
    }

    async fn update_agent_alias(
        &self,
        _agent_id: &str,
        alias_id: &str,
        alias_name: &str,
    ) -> Result<AliasSummary, ProvisionError> {
        let mut state = self.record("update_agent_alias")?;
        let (alias, script) = state
            .aliases
            .get_mut(alias_id)
            .ok_or_else(|| ProvisionError::AwsSdkError("ResourceNotFoundException".to_string()))?;
        alias.alias_name = alias_name.to_string();
        alias.status = "UPDATING".to_string();
        script.set(&["UPDATING", "PREPARED"]);
        Ok(alias.clone())
    }

    async fn create_action_group(
        &self,
        agent_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        let mut state = self.record("create_action_group")?;
        let id = format!("GROUP{:04}", state.action_groups.len() + 1);
        let mut script = StatusScript::default();
        script.set(&["DISABLED", "ENABLED"]);
        state
            .action_groups
            .insert(id.clone(), (definition.clone(), script));
        Ok(ActionGroupSummary {
            agent_id: agent_id.to_string(),
            action_group_id: id,
            name: definition.name.clone(),
            state: "DISABLED".to_string(),
        })
    }

    async fn get_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        let mut state = self.record("get_action_group")?;
        let (definition, script) = state
            .action_groups
            .get_mut(action_group_id)
            .ok_or_else(|| ProvisionError::AwsSdkError("ResourceNotFoundException".to_string()))?;
        Ok(ActionGroupSummary {
            agent_id: agent_id.to_string(),
            action_group_id: action_group_id.to_string(),
            name: definition.name.clone(),
            state: script.next(),
        })
    }

    async fn update_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        let mut state = self.record("update_action_group")?;
        let (stored, script) = state
            .action_groups
            .get_mut(action_group_id)
            .ok_or_else(|| ProvisionError::AwsSdkError("ResourceNotFoundException".to_string()))?;
        *stored = definition.clone();
        script.set(&["ENABLED"]);
        Ok(ActionGroupSummary {
            agent_id: agent_id.to_string(),
            action_group_id: action_group_id.to_string(),
            name: definition.name.clone(),
            state: "ENABLED".to_string(),
        })
    }

    async fn associate_knowledge_base(
        &self,
        agent_id: &str,
        knowledge_base_id: &str,
        _description: &str,
    ) -> Result<KnowledgeBaseSummary, ProvisionError> {
        self.record("associate_knowledge_base")?;
        Ok(KnowledgeBaseSummary {
            agent_id: agent_id.to_string(),
            knowledge_base_id: knowledge_base_id.to_string(),
            state: "ENABLED".to_string(),
        })
    }

    async fn create_guardrail(
        &self,
        definition: &GuardrailDefinition,
    ) -> Result<GuardrailSummary, ProvisionError> {
        let mut state = self.record("create_guardrail")?;
        state.guardrails.push(definition.clone());
        Ok(GuardrailSummary {
            guardrail_id: "gr-0001".to_string(),
            guardrail_arn: "arn:aws:bedrock:us-west-2:123456789012:guardrail/gr-0001".to_string(),
            version: "DRAFT".to_string(),
        })
    }

    async fn create_guardrail_version(&self, _guardrail_id: &str) -> Result<String, ProvisionError> {
        self.record("create_guardrail_version")?;
        Ok("1".to_string())
    }
}

fn fast_wait() -> WaitConfig {
    WaitConfig::new(Duration::from_millis(1), 5)
}

fn existing_agent() -> AgentSummary {
    AgentSummary {
        agent_id: "AGENT0001".to_string(),
        agent_name: "mugs-customer-support-agent".to_string(),
        status: "PREPARED".to_string(),
        instruction: Some("You are a support agent.".to_string()),
        foundation_model: Some("anthropic.claude-3-haiku-20240307-v1:0".to_string()),
        role_arn: ROLE_ARN.to_string(),
        guardrail: None,
    }
}

#[tokio::test]
async fn test_support_setup_runs_full_sequence() {
    let provisioner = Provisioner::new(ScriptedControlPlane::new(), fast_wait());

    let report = provisioner
        .run_support_setup(&SupportSettings::default(), ROLE_ARN, LAMBDA_ARN)
        .await
        .expect("構成手順が成功すること");

    let expected = vec![
        "create_agent",
        "prepare_agent",
        "create_agent_alias",
        "create_action_group",
        "prepare_agent",
        "update_agent_alias",
        "update_action_group",
        "create_action_group",
        "prepare_agent",
        "update_agent_alias",
        "create_guardrail",
        "create_guardrail_version",
        "update_agent",
        "prepare_agent",
        "update_agent_alias",
    ];
    assert_eq!(provisioner.control_plane().mutations(), expected);

    assert_eq!(report.agent.agent_id, "AGENT0001");
    assert_eq!(report.agent.status, "PREPARED");
    assert_eq!(
        report.agent.guardrail,
        Some(GuardrailRef {
            guardrail_id: "gr-0001".to_string(),
            version: "1".to_string(),
        })
    );
    assert_eq!(report.alias.status, "PREPARED");
    assert_eq!(report.alias.alias_name, "MyAgentAlias");
    assert_eq!(report.guardrail.version, "1");

    let names: Vec<&str> = report.action_groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["customer-support-actions", "CodeInterpreterAction"]);
    assert!(report.action_groups.iter().all(|g| g.state == "ENABLED"));
}

#[tokio::test]
async fn test_support_actions_updated_to_revised_functions() {
    let provisioner = Provisioner::new(ScriptedControlPlane::new(), fast_wait());

    provisioner
        .run_support_setup(&SupportSettings::default(), ROLE_ARN, LAMBDA_ARN)
        .await
        .expect("構成手順が成功すること");

    let state = provisioner.control_plane().state.lock().unwrap();
    let (support, _) = &state.action_groups["GROUP0001"];
    assert_eq!(
        support.function_names(),
        vec!["customerId", "sendToSupport", "purchaseSearch"]
    );
    match &support.kind {
        ActionGroupKind::Functions { lambda_arn, .. } => assert_eq!(lambda_arn, LAMBDA_ARN),
        other => panic!("Lambda 実行のアクショングループであるべき: {:?}", other),
    }

    let (interpreter, _) = &state.action_groups["GROUP0002"];
    assert_eq!(
        interpreter,
        &code_interpreter_action_group("CodeInterpreterAction")
    );
    assert_eq!(state.guardrails.len(), 1);
}

#[tokio::test]
async fn test_attach_guardrail_keeps_agent_fields() {
    let provisioner = Provisioner::new(
        ScriptedControlPlane::with_agent(existing_agent()),
        fast_wait(),
    );

    let guardrail = provisioner
        .attach_guardrail("AGENT0001", &support_guardrail("support-guardrails"))
        .await
        .expect("ガードレールの適用が成功すること");

    assert_eq!(guardrail.version, "1");

    let state = provisioner.control_plane().state.lock().unwrap();
    let agent = state.agent.as_ref().unwrap();
    let original = existing_agent();
    assert_eq!(agent.agent_name, original.agent_name);
    assert_eq!(agent.instruction, original.instruction);
    assert_eq!(agent.foundation_model, original.foundation_model);
    assert_eq!(agent.role_arn, original.role_arn);
    assert_eq!(agent.guardrail.as_ref().unwrap().guardrail_id, "gr-0001");
}

#[tokio::test]
async fn test_prepare_failure_stops_sequence() {
    let provisioner = Provisioner::new(
        ScriptedControlPlane::with_prepare_statuses(vec!["PREPARING", "FAILED"]),
        fast_wait(),
    );

    let result = provisioner
        .run_support_setup(&SupportSettings::default(), ROLE_ARN, LAMBDA_ARN)
        .await;

    match result {
        Err(ProvisionError::ResourceFailed { resource, status }) => {
            assert_eq!(resource, "agent AGENT0001");
            assert_eq!(status, "FAILED");
        }
        other => panic!("ResourceFailed が返されるべき: {:?}", other),
    }
    assert_eq!(
        provisioner.control_plane().mutations(),
        vec!["create_agent", "prepare_agent"]
    );
}

#[tokio::test]
async fn test_prepare_timeout_is_reported() {
    let provisioner = Provisioner::new(
        ScriptedControlPlane::with_prepare_statuses(vec!["PREPARING"]),
        WaitConfig::new(Duration::from_millis(1), 3),
    );
    provisioner
        .control_plane()
        .state
        .lock()
        .unwrap()
        .agent = Some(existing_agent());

    let error = provisioner
        .prepare_agent("AGENT0001")
        .await
        .expect_err("準備が終わらない場合はタイムアウトするべき");

    assert!(error.is_timeout());
    assert!(error.to_string().contains("PREPARED"));

    let polls = provisioner
        .control_plane()
        .state
        .lock()
        .unwrap()
        .calls
        .iter()
        .filter(|c| *c == "get_agent")
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn test_api_error_stops_sequence() {
    let provisioner = Provisioner::new(
        ScriptedControlPlane::failing_on("create_action_group"),
        fast_wait(),
    );

    let result = provisioner
        .run_support_setup(&SupportSettings::default(), ROLE_ARN, LAMBDA_ARN)
        .await;

    assert!(matches!(result, Err(ProvisionError::AwsSdkError(_))));
    let mutations = provisioner.control_plane().mutations();
    assert_eq!(mutations.last().map(String::as_str), Some("create_action_group"));
    assert!(!mutations.iter().any(|c| c == "update_agent_alias"));
}

#[tokio::test]
async fn test_invalid_definition_rejected_before_call() {
    let provisioner = Provisioner::new(
        ScriptedControlPlane::with_agent(existing_agent()),
        fast_wait(),
    );

    let invalid = support_action_group(SUPPORT_ACTION_GROUP_NAME, "", support_functions());
    let result = provisioner.create_action_group("AGENT0001", &invalid).await;
    assert!(matches!(result, Err(ProvisionError::InvalidDefinition(_))));

    let mut guardrail = support_guardrail("support-guardrails");
    guardrail.grounding_filters[0].threshold = 1.5;
    let result = provisioner.attach_guardrail("AGENT0001", &guardrail).await;
    assert!(matches!(result, Err(ProvisionError::InvalidDefinition(_))));

    assert!(provisioner.control_plane().mutations().is_empty());
}

#[tokio::test]
async fn test_refresh_alias_prepares_before_update() {
    let plane = ScriptedControlPlane::with_agent(existing_agent());
    let provisioner = Provisioner::new(plane, fast_wait());
    provisioner
        .create_alias("AGENT0001", "MyAgentAlias")
        .await
        .expect("エイリアス作成が成功すること");

    let alias = provisioner
        .refresh_alias("AGENT0001", "ALIAS0001", "test")
        .await
        .expect("エイリアス更新が成功すること");

    assert_eq!(alias.alias_name, "test");
    assert_eq!(alias.status, "PREPARED");
    assert_eq!(
        provisioner.control_plane().mutations(),
        vec!["create_agent_alias", "prepare_agent", "update_agent_alias"]
    );
}

#[tokio::test]
async fn test_associate_knowledge_base() {
    let provisioner = Provisioner::new(
        ScriptedControlPlane::with_agent(existing_agent()),
        fast_wait(),
    );

    let kb = provisioner
        .associate_knowledge_base("AGENT0001", "KB0001", "Mug product manuals")
        .await
        .expect("ナレッジベースの紐付けが成功すること");

    assert_eq!(kb.knowledge_base_id, "KB0001");
    assert_eq!(kb.state, "ENABLED");
}
