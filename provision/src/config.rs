/// プロビジョニング設定
///
/// AWS 接続設定（リージョン・プロファイル）と、作成するエージェントの
/// 名前やモデルなどをまとめた `support-agent.json` の読み込みを提供します。
use std::path::PathBuf;
use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, SdkConfig};
use serde::{Deserialize, Serialize};

use crate::ProvisionError;
use crate::action_group::{CODE_INTERPRETER_ACTION_GROUP_NAME, SUPPORT_ACTION_GROUP_NAME};
use crate::agent::AgentDefinition;
use crate::guardrail::SUPPORT_GUARDRAIL_NAME;
use crate::wait::WaitConfig;

/// リージョンが指定されていない場合の既定値
pub const DEFAULT_REGION: &str = "us-west-2";

/// 既定で使用する基盤モデル
pub const DEFAULT_FOUNDATION_MODEL: &str = "anthropic.claude-3-haiku-20240307-v1:0";

/// AWS への接続設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// 使用する AWS プロファイル名（None の場合は既定の認証情報チェーン）
    pub profile: Option<String>,
    /// リージョン（None の場合はプロファイル設定、なければ us-west-2）
    pub region: Option<String>,
}

impl ProvisionConfig {
    pub fn new(profile: Option<String>, region: Option<String>) -> Self {
        Self { profile, region }
    }

    /// AWS SDK の共通設定を読み込む
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let region_provider =
            RegionProviderChain::first_try(self.region.clone().map(aws_config::Region::new))
                .or_default_provider()
                .or_else(aws_config::Region::new(DEFAULT_REGION));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }
}

/// ステータス待機の設定（ファイル表現）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    pub interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            interval_secs: WaitConfig::DEFAULT_INTERVAL.as_secs(),
            max_attempts: WaitConfig::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<&WaitSettings> for WaitConfig {
    fn from(settings: &WaitSettings) -> Self {
        WaitConfig::new(
            Duration::from_secs(settings.interval_secs),
            settings.max_attempts,
        )
    }
}

/// support-agent.json のルート構造
///
/// すべての項目が省略可能で、省略時はカスタマーサポート用の既定値を使う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportSettings {
    pub agent_name: String,
    pub foundation_model: String,
    /// システムプロンプト
    pub instruction: String,
    pub alias_name: String,
    pub action_group_name: String,
    pub code_interpreter_name: String,
    pub guardrail_name: String,
    pub wait: WaitSettings,
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            agent_name: "mugs-customer-support-agent".to_string(),
            foundation_model: DEFAULT_FOUNDATION_MODEL.to_string(),
            instruction:
                "You are an advanced AI agent acting as a front line customer support agent."
                    .to_string(),
            alias_name: "MyAgentAlias".to_string(),
            action_group_name: SUPPORT_ACTION_GROUP_NAME.to_string(),
            code_interpreter_name: CODE_INTERPRETER_ACTION_GROUP_NAME.to_string(),
            guardrail_name: SUPPORT_GUARDRAIL_NAME.to_string(),
            wait: WaitSettings::default(),
        }
    }
}

impl SupportSettings {
    /// 設定ファイルを読み込む
    ///
    /// # Errors
    /// ファイルの読み込みやパースに失敗した場合
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self, ProvisionError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ProvisionError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ProvisionError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// デフォルトの設定ファイルパスを取得
    ///
    /// 以下の順序で検索：
    /// 1. `.bedrock/support-agent.json`
    /// 2. `support-agent.json`（カレントディレクトリ）
    pub fn default_path() -> Option<PathBuf> {
        [".bedrock/support-agent.json", "support-agent.json"]
            .into_iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// 指定パス、なければデフォルトパスから読み込む。どちらもなければ既定値
    pub fn load(path: Option<PathBuf>) -> Result<Self, ProvisionError> {
        match path.or_else(Self::default_path) {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// IAM ロールを指定してエージェント定義を組み立てる
    pub fn agent_definition(&self, role_arn: &str) -> AgentDefinition {
        AgentDefinition {
            name: self.agent_name.clone(),
            foundation_model: self.foundation_model.clone(),
            instruction: self.instruction.clone(),
            role_arn: role_arn.to_string(),
        }
    }

    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig::from(&self.wait)
    }
}
