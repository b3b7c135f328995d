use serde::{Deserialize, Serialize};

/// エージェントのステータス文字列
pub mod status {
    pub const CREATING: &str = "CREATING";
    pub const NOT_PREPARED: &str = "NOT_PREPARED";
    pub const PREPARING: &str = "PREPARING";
    pub const PREPARED: &str = "PREPARED";
    pub const UPDATING: &str = "UPDATING";
    pub const FAILED: &str = "FAILED";
    pub const DELETING: &str = "DELETING";
    pub const DISSOCIATED: &str = "DISSOCIATED";
    pub const ENABLED: &str = "ENABLED";
    pub const DISABLED: &str = "DISABLED";
}

/// アクショングループやナレッジベースを紐付ける作業用バージョン
pub const DRAFT_VERSION: &str = "DRAFT";

/// 新規作成するエージェントの定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub foundation_model: String,
    /// システムプロンプト
    pub instruction: String,
    /// モデル呼び出しを許可する IAM ロール
    pub role_arn: String,
}

/// エージェントに適用するガードレールの参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailRef {
    pub guardrail_id: String,
    pub version: String,
}

/// リモートから取得したエージェントの状態
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub agent_name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foundation_model: Option<String>,
    pub role_arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrail: Option<GuardrailRef>,
}

/// エージェントエイリアスの状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasSummary {
    pub agent_id: String,
    pub alias_id: String,
    pub alias_name: String,
    pub status: String,
}

/// エージェントに紐付けたナレッジベース
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseSummary {
    pub agent_id: String,
    pub knowledge_base_id: String,
    pub state: String,
}
