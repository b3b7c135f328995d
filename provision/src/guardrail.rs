//! ガードレール（入出力のトピック・コンテンツ・グラウンディング制限）の定義
use serde::{Deserialize, Serialize};

use crate::ProvisionError;

/// サポートエージェント用ガードレール名
pub const SUPPORT_GUARDRAIL_NAME: &str = "support-guardrails";

const BLOCKED_MESSAGE: &str = "Sorry, the model cannot answer this question.";

/// グラウンディング閾値の上限（API の制約）
pub const MAX_GROUNDING_THRESHOLD: f64 = 0.99;

/// 拒否するトピック
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeniedTopic {
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// コンテンツフィルタのカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentCategory {
    Sexual,
    Hate,
    Violence,
    Insults,
    Misconduct,
    PromptAttack,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Sexual => "SEXUAL",
            ContentCategory::Hate => "HATE",
            ContentCategory::Violence => "VIOLENCE",
            ContentCategory::Insults => "INSULTS",
            ContentCategory::Misconduct => "MISCONDUCT",
            ContentCategory::PromptAttack => "PROMPT_ATTACK",
        }
    }
}

/// フィルタの強度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterStrength {
    None,
    Low,
    Medium,
    High,
}

impl FilterStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterStrength::None => "NONE",
            FilterStrength::Low => "LOW",
            FilterStrength::Medium => "MEDIUM",
            FilterStrength::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFilter {
    pub category: ContentCategory,
    pub input_strength: FilterStrength,
    pub output_strength: FilterStrength,
}

/// コンテキストグラウンディングフィルタの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroundingKind {
    Grounding,
    Relevance,
}

impl GroundingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroundingKind::Grounding => "GROUNDING",
            GroundingKind::Relevance => "RELEVANCE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundingFilter {
    pub kind: GroundingKind,
    pub threshold: f64,
}

/// 作成するガードレールの定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub denied_topics: Vec<DeniedTopic>,
    #[serde(default)]
    pub content_filters: Vec<ContentFilter>,
    #[serde(default)]
    pub grounding_filters: Vec<GroundingFilter>,
    pub blocked_input_message: String,
    pub blocked_output_message: String,
}

impl GuardrailDefinition {
    /// API を呼び出す前に定義の整合性を検証する
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.name.trim().is_empty() {
            return Err(ProvisionError::InvalidDefinition(
                "guardrail name must not be empty".to_string(),
            ));
        }

        if self.denied_topics.is_empty()
            && self.content_filters.is_empty()
            && self.grounding_filters.is_empty()
        {
            return Err(ProvisionError::InvalidDefinition(format!(
                "guardrail {} has no policies",
                self.name
            )));
        }

        if let Some(topic) = self
            .denied_topics
            .iter()
            .find(|t| t.name.trim().is_empty() || t.definition.trim().is_empty())
        {
            return Err(ProvisionError::InvalidDefinition(format!(
                "denied topic {:?} needs both a name and a definition",
                topic.name
            )));
        }

        // プロンプト攻撃フィルタは入力側にしか適用できない
        if self.content_filters.iter().any(|f| {
            f.category == ContentCategory::PromptAttack && f.output_strength != FilterStrength::None
        }) {
            return Err(ProvisionError::InvalidDefinition(
                "PROMPT_ATTACK filter output strength must be NONE".to_string(),
            ));
        }

        for filter in &self.grounding_filters {
            if !(0.0..=MAX_GROUNDING_THRESHOLD).contains(&filter.threshold) {
                return Err(ProvisionError::InvalidDefinition(format!(
                    "{:?} threshold {} is outside 0.0..={}",
                    filter.kind, filter.threshold, MAX_GROUNDING_THRESHOLD
                )));
            }
        }

        if self.blocked_input_message.is_empty() || self.blocked_output_message.is_empty() {
            return Err(ProvisionError::InvalidDefinition(
                "blocked messaging must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// カスタマーサポート用のガードレール
///
/// 顧客の内部情報に関する話題を拒否し、主要カテゴリのコンテンツを最大強度で遮断する。
pub fn support_guardrail(name: &str) -> GuardrailDefinition {
    let high = |category| ContentFilter {
        category,
        input_strength: FilterStrength::High,
        output_strength: FilterStrength::High,
    };

    GuardrailDefinition {
        name: name.to_string(),
        description: "Guardrails for customer support agent.".to_string(),
        denied_topics: vec![DeniedTopic {
            name: "Internal Customer Information".to_string(),
            definition: "Information relating to this or other customers that is only available through internal systems.  Such as a customer ID. ".to_string(),
            examples: Vec::new(),
        }],
        content_filters: vec![
            high(ContentCategory::Sexual),
            high(ContentCategory::Hate),
            high(ContentCategory::Violence),
            high(ContentCategory::Insults),
            high(ContentCategory::Misconduct),
            ContentFilter {
                category: ContentCategory::PromptAttack,
                input_strength: FilterStrength::High,
                output_strength: FilterStrength::None,
            },
        ],
        grounding_filters: vec![
            GroundingFilter {
                kind: GroundingKind::Grounding,
                threshold: 0.7,
            },
            GroundingFilter {
                kind: GroundingKind::Relevance,
                threshold: 0.7,
            },
        ],
        blocked_input_message: BLOCKED_MESSAGE.to_string(),
        blocked_output_message: BLOCKED_MESSAGE.to_string(),
    }
}
