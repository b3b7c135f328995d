//! AWS SDK による [`ControlPlane`] の実装
use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_bedrock::types::{
    GuardrailContentFilterConfig, GuardrailContentFilterType, GuardrailContentPolicyConfig,
    GuardrailContextualGroundingFilterConfig, GuardrailContextualGroundingFilterType,
    GuardrailContextualGroundingPolicyConfig, GuardrailFilterStrength, GuardrailTopicConfig,
    GuardrailTopicPolicyConfig, GuardrailTopicType,
};
use aws_sdk_bedrockagent::types::{
    ActionGroupExecutor, ActionGroupSignature, ActionGroupState, Agent, AgentActionGroup,
    AgentAlias, Function, FunctionSchema, GuardrailConfiguration, KnowledgeBaseState,
    ParameterDetail, Type,
};
use tracing::debug;

use crate::ProvisionError;
use crate::action_group::{ActionGroupDefinition, ActionGroupKind, FunctionDefinition};
use crate::agent::{
    AgentDefinition, AgentSummary, AliasSummary, DRAFT_VERSION, GuardrailRef,
    KnowledgeBaseSummary, status,
};
use crate::control_plane::{ActionGroupSummary, ControlPlane, GuardrailSummary};
use crate::guardrail::GuardrailDefinition;

/// Bedrock のコントロールプレーンクライアント
///
/// エージェント系の操作は `bedrock-agent`、ガードレールは `bedrock` サービスを使う。
#[derive(Debug, Clone)]
pub struct BedrockControlPlane {
    agents: aws_sdk_bedrockagent::Client,
    guardrails: aws_sdk_bedrock::Client,
}

impl BedrockControlPlane {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            agents: aws_sdk_bedrockagent::Client::new(config),
            guardrails: aws_sdk_bedrock::Client::new(config),
        }
    }
}

fn agent_summary(agent: &Agent) -> AgentSummary {
    let guardrail = agent.guardrail_configuration().and_then(|g| {
        Some(GuardrailRef {
            guardrail_id: g.guardrail_identifier()?.to_string(),
            version: g.guardrail_version()?.to_string(),
        })
    });

    AgentSummary {
        agent_id: agent.agent_id().to_string(),
        agent_name: agent.agent_name().to_string(),
        status: agent.agent_status().as_str().to_string(),
        instruction: agent.instruction().map(str::to_string),
        foundation_model: agent.foundation_model().map(str::to_string),
        role_arn: agent.agent_resource_role_arn().to_string(),
        guardrail,
    }
}

fn alias_summary(alias: &AgentAlias) -> AliasSummary {
    AliasSummary {
        agent_id: alias.agent_id().to_string(),
        alias_id: alias.agent_alias_id().to_string(),
        alias_name: alias.agent_alias_name().to_string(),
        status: alias.agent_alias_status().as_str().to_string(),
    }
}

fn action_group_summary(group: &AgentActionGroup) -> ActionGroupSummary {
    ActionGroupSummary {
        agent_id: group.agent_id().to_string(),
        action_group_id: group.action_group_id().to_string(),
        name: group.action_group_name().to_string(),
        state: group.action_group_state().as_str().to_string(),
    }
}

fn action_group_state(enabled: bool) -> ActionGroupState {
    if enabled {
        ActionGroupState::from(status::ENABLED)
    } else {
        ActionGroupState::from(status::DISABLED)
    }
}

fn build_function(function: &FunctionDefinition) -> Result<Function, ProvisionError> {
    let mut parameters = HashMap::with_capacity(function.parameters.len());
    for (name, parameter) in &function.parameters {
        let detail = ParameterDetail::builder()
            .description(&parameter.description)
            .r#type(Type::from(parameter.param_type.as_str()))
            .required(parameter.required)
            .build()
            .map_err(|e| {
                ProvisionError::BuildError(format!(
                    "Failed to build parameter {}.{}: {}",
                    function.name, name, e
                ))
            })?;
        parameters.insert(name.clone(), detail);
    }

    Function::builder()
        .name(&function.name)
        .description(&function.description)
        .set_parameters(Some(parameters))
        .build()
        .map_err(|e| {
            ProvisionError::BuildError(format!("Failed to build function {}: {}", function.name, e))
        })
}

fn function_schema(functions: &[FunctionDefinition]) -> Result<FunctionSchema, ProvisionError> {
    let functions = functions
        .iter()
        .map(build_function)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FunctionSchema::Functions(functions))
}

fn topic_policy(
    definition: &GuardrailDefinition,
) -> Result<Option<GuardrailTopicPolicyConfig>, ProvisionError> {
    if definition.denied_topics.is_empty() {
        return Ok(None);
    }

    let topics = definition
        .denied_topics
        .iter()
        .map(|topic| {
            GuardrailTopicConfig::builder()
                .name(&topic.name)
                .definition(&topic.definition)
                .set_examples(Some(topic.examples.clone()))
                .r#type(GuardrailTopicType::Deny)
                .build()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProvisionError::BuildError(format!("Failed to build topic: {}", e)))?;

    GuardrailTopicPolicyConfig::builder()
        .set_topics_config(Some(topics))
        .build()
        .map(Some)
        .map_err(|e| ProvisionError::BuildError(format!("Failed to build topic policy: {}", e)))
}

fn content_policy(
    definition: &GuardrailDefinition,
) -> Result<Option<GuardrailContentPolicyConfig>, ProvisionError> {
    if definition.content_filters.is_empty() {
        return Ok(None);
    }

    let filters = definition
        .content_filters
        .iter()
        .map(|filter| {
            GuardrailContentFilterConfig::builder()
                .r#type(GuardrailContentFilterType::from(filter.category.as_str()))
                .input_strength(GuardrailFilterStrength::from(filter.input_strength.as_str()))
                .output_strength(GuardrailFilterStrength::from(filter.output_strength.as_str()))
                .build()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProvisionError::BuildError(format!("Failed to build content filter: {}", e)))?;

    GuardrailContentPolicyConfig::builder()
        .set_filters_config(Some(filters))
        .build()
        .map(Some)
        .map_err(|e| ProvisionError::BuildError(format!("Failed to build content policy: {}", e)))
}

fn grounding_policy(
    definition: &GuardrailDefinition,
) -> Result<Option<GuardrailContextualGroundingPolicyConfig>, ProvisionError> {
    if definition.grounding_filters.is_empty() {
        return Ok(None);
    }

    let filters = definition
        .grounding_filters
        .iter()
        .map(|filter| {
            GuardrailContextualGroundingFilterConfig::builder()
                .r#type(GuardrailContextualGroundingFilterType::from(
                    filter.kind.as_str(),
                ))
                .threshold(filter.threshold)
                .build()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            ProvisionError::BuildError(format!("Failed to build grounding filter: {}", e))
        })?;

    GuardrailContextualGroundingPolicyConfig::builder()
        .set_filters_config(Some(filters))
        .build()
        .map(Some)
        .map_err(|e| ProvisionError::BuildError(format!("Failed to build grounding policy: {}", e)))
}

#[async_trait]
impl ControlPlane for BedrockControlPlane {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentSummary, ProvisionError> {
        let response = self
            .agents
            .create_agent()
            .agent_name(&definition.name)
            .foundation_model(&definition.foundation_model)
            .instruction(&definition.instruction)
            .agent_resource_role_arn(&definition.role_arn)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        let agent = response.agent().ok_or(ProvisionError::MissingField("agent"))?;
        Ok(agent_summary(agent))
    }

    async fn get_agent(&self, agent_id: &str) -> Result<AgentSummary, ProvisionError> {
        let response = self
            .agents
            .get_agent()
            .agent_id(agent_id)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        let agent = response.agent().ok_or(ProvisionError::MissingField("agent"))?;
        Ok(agent_summary(agent))
    }

    async fn prepare_agent(&self, agent_id: &str) -> Result<String, ProvisionError> {
        let response = self
            .agents
            .prepare_agent()
            .agent_id(agent_id)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        Ok(response.agent_status().as_str().to_string())
    }

    async fn update_agent(
        &self,
        agent: &AgentSummary,
        guardrail: Option<&GuardrailRef>,
    ) -> Result<AgentSummary, ProvisionError> {
        let foundation_model = agent
            .foundation_model
            .as_deref()
            .ok_or(ProvisionError::MissingField("foundation_model"))?;

        let guardrail_configuration = guardrail.map(|g| {
            GuardrailConfiguration::builder()
                .guardrail_identifier(&g.guardrail_id)
                .guardrail_version(&g.version)
                .build()
        });

        let response = self
            .agents
            .update_agent()
            .agent_id(&agent.agent_id)
            .agent_name(&agent.agent_name)
            .agent_resource_role_arn(&agent.role_arn)
            .set_instruction(agent.instruction.clone())
            .foundation_model(foundation_model)
            .set_guardrail_configuration(guardrail_configuration)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        let updated = response.agent().ok_or(ProvisionError::MissingField("agent"))?;
        Ok(agent_summary(updated))
    }

    async fn create_agent_alias(
        &self,
        agent_id: &str,
        alias_name: &str,
    ) -> Result<AliasSummary, ProvisionError> {
        let response = self
            .agents
            .create_agent_alias()
            .agent_id(agent_id)
            .agent_alias_name(alias_name)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        let alias = response
            .agent_alias()
            .ok_or(ProvisionError::MissingField("agentAlias"))?;
        Ok(alias_summary(alias))
    }

    async fn get_agent_alias(
        &self,
        agent_id: &str,
        alias_id: &str,
    ) -> Result<AliasSummary, ProvisionError> {
        let response = self
            .agents
            .get_agent_alias()
            .agent_id(agent_id)
            .agent_alias_id(alias_id)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        let alias = response
            .agent_alias()
            .ok_or(ProvisionError::MissingField("agentAlias"))?;
        Ok(alias_summary(alias))
    }

    async fn update_agent_alias(
        &self,
        agent_id: &str,
        alias_id: &str,
        alias_name: &str,
    ) -> Result<AliasSummary, ProvisionError> {
        let response = self
            .agents
            .update_agent_alias()
            .agent_id(agent_id)
            .agent_alias_id(alias_id)
            .agent_alias_name(alias_name)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        let alias = response
            .agent_alias()
            .ok_or(ProvisionError::MissingField("agentAlias"))?;
        Ok(alias_summary(alias))
    }

    async fn create_action_group(
        &self,
        agent_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        let request = self
            .agents
            .create_agent_action_group()
            .agent_id(agent_id)
            .agent_version(DRAFT_VERSION)
            .action_group_name(&definition.name)
            .action_group_state(action_group_state(definition.enabled));

        let request = match &definition.kind {
            ActionGroupKind::Functions {
                lambda_arn,
                functions,
            } => request
                .action_group_executor(ActionGroupExecutor::Lambda(lambda_arn.clone()))
                .function_schema(function_schema(functions)?),
            ActionGroupKind::BuiltIn { signature } => request
                .parent_action_group_signature(ActionGroupSignature::from(signature.as_str())),
        };

        let response = request.send().await.map_err(ProvisionError::sdk)?;
        let group = response
            .agent_action_group()
            .ok_or(ProvisionError::MissingField("agentActionGroup"))?;
        Ok(action_group_summary(group))
    }

    async fn get_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        let response = self
            .agents
            .get_agent_action_group()
            .agent_id(agent_id)
            .agent_version(DRAFT_VERSION)
            .action_group_id(action_group_id)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        let group = response
            .agent_action_group()
            .ok_or(ProvisionError::MissingField("agentActionGroup"))?;
        Ok(action_group_summary(group))
    }

    async fn update_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
        definition: &ActionGroupDefinition,
    ) -> Result<ActionGroupSummary, ProvisionError> {
        let request = self
            .agents
            .update_agent_action_group()
            .agent_id(agent_id)
            .agent_version(DRAFT_VERSION)
            .action_group_id(action_group_id)
            .action_group_name(&definition.name)
            .action_group_state(action_group_state(definition.enabled));

        let request = match &definition.kind {
            ActionGroupKind::Functions {
                lambda_arn,
                functions,
            } => request
                .action_group_executor(ActionGroupExecutor::Lambda(lambda_arn.clone()))
                .function_schema(function_schema(functions)?),
            ActionGroupKind::BuiltIn { signature } => request
                .parent_action_group_signature(ActionGroupSignature::from(signature.as_str())),
        };

        let response = request.send().await.map_err(ProvisionError::sdk)?;
        let group = response
            .agent_action_group()
            .ok_or(ProvisionError::MissingField("agentActionGroup"))?;
        Ok(action_group_summary(group))
    }

    async fn associate_knowledge_base(
        &self,
        agent_id: &str,
        knowledge_base_id: &str,
        description: &str,
    ) -> Result<KnowledgeBaseSummary, ProvisionError> {
        let response = self
            .agents
            .associate_agent_knowledge_base()
            .agent_id(agent_id)
            .agent_version(DRAFT_VERSION)
            .knowledge_base_id(knowledge_base_id)
            .description(description)
            .knowledge_base_state(KnowledgeBaseState::from(status::ENABLED))
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        let kb = response
            .agent_knowledge_base()
            .ok_or(ProvisionError::MissingField("agentKnowledgeBase"))?;
        Ok(KnowledgeBaseSummary {
            agent_id: agent_id.to_string(),
            knowledge_base_id: kb.knowledge_base_id().to_string(),
            state: kb.knowledge_base_state().as_str().to_string(),
        })
    }

    async fn create_guardrail(
        &self,
        definition: &GuardrailDefinition,
    ) -> Result<GuardrailSummary, ProvisionError> {
        let response = self
            .guardrails
            .create_guardrail()
            .name(&definition.name)
            .description(&definition.description)
            .set_topic_policy_config(topic_policy(definition)?)
            .set_content_policy_config(content_policy(definition)?)
            .set_contextual_grounding_policy_config(grounding_policy(definition)?)
            .blocked_input_messaging(&definition.blocked_input_message)
            .blocked_outputs_messaging(&definition.blocked_output_message)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        debug!(guardrail_id = response.guardrail_id(), "guardrail created");
        Ok(GuardrailSummary {
            guardrail_id: response.guardrail_id().to_string(),
            guardrail_arn: response.guardrail_arn().to_string(),
            version: response.version().to_string(),
        })
    }

    async fn create_guardrail_version(&self, guardrail_id: &str) -> Result<String, ProvisionError> {
        let response = self
            .guardrails
            .create_guardrail_version()
            .guardrail_identifier(guardrail_id)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        Ok(response.version().to_string())
    }
}
