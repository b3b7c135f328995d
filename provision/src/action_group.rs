//! アクショングループ（エージェントが呼び出せるツール群）の定義
//!
//! カスタム関数を Lambda にルーティングするものと、
//! Bedrock 組み込みのシグネチャ（コードインタープリタ等）を使うものの2種類がある。
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ProvisionError;

/// カスタマーサポート用アクショングループ名
pub const SUPPORT_ACTION_GROUP_NAME: &str = "customer-support-actions";

/// コードインタープリタ用アクショングループ名
pub const CODE_INTERPRETER_ACTION_GROUP_NAME: &str = "CodeInterpreterAction";

/// 関数パラメータの型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
        }
    }
}

/// 関数パラメータの定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub required: bool,
}

impl ParameterDefinition {
    pub fn string(description: &str, required: bool) -> Self {
        Self {
            description: description.to_string(),
            param_type: ParameterType::String,
            required,
        }
    }
}

/// エージェントから呼び出される関数のスキーマ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, ParameterDefinition>,
}

impl FunctionDefinition {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    /// パラメータを追加する（同名のものは上書き）
    pub fn param(mut self, name: &str, parameter: ParameterDefinition) -> Self {
        self.parameters.insert(name.to_string(), parameter);
        self
    }
}

/// Bedrock 組み込みのアクショングループシグネチャ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltInSignature {
    #[serde(rename = "AMAZON.CodeInterpreter")]
    CodeInterpreter,
    #[serde(rename = "AMAZON.UserInput")]
    UserInput,
}

impl BuiltInSignature {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltInSignature::CodeInterpreter => "AMAZON.CodeInterpreter",
            BuiltInSignature::UserInput => "AMAZON.UserInput",
        }
    }
}

/// アクショングループの実体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionGroupKind {
    /// カスタム関数群を Lambda 関数で実行する
    Functions {
        lambda_arn: String,
        functions: Vec<FunctionDefinition>,
    },
    /// 組み込みシグネチャ（実行先は Bedrock 側）
    BuiltIn { signature: BuiltInSignature },
}

/// 作成・更新するアクショングループの定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGroupDefinition {
    pub name: String,
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ActionGroupKind,
}

impl ActionGroupDefinition {
    /// API を呼び出す前に定義の整合性を検証する
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.name.trim().is_empty() {
            return Err(ProvisionError::InvalidDefinition(
                "action group name must not be empty".to_string(),
            ));
        }

        if let ActionGroupKind::Functions {
            lambda_arn,
            functions,
        } = &self.kind
        {
            if lambda_arn.trim().is_empty() {
                return Err(ProvisionError::InvalidDefinition(format!(
                    "action group {} has no Lambda executor",
                    self.name
                )));
            }
            if functions.is_empty() {
                return Err(ProvisionError::InvalidDefinition(format!(
                    "action group {} has no functions",
                    self.name
                )));
            }
            for function in functions {
                if function.name.trim().is_empty() {
                    return Err(ProvisionError::InvalidDefinition(format!(
                        "action group {} contains a function without a name",
                        self.name
                    )));
                }
                if let Some(param) = function.parameters.keys().find(|k| k.trim().is_empty()) {
                    return Err(ProvisionError::InvalidDefinition(format!(
                        "function {} has an unnamed parameter {:?}",
                        function.name, param
                    )));
                }
            }
        }

        Ok(())
    }

    /// 関数名の一覧
    pub fn function_names(&self) -> Vec<&str> {
        match &self.kind {
            ActionGroupKind::Functions { functions, .. } => {
                functions.iter().map(|f| f.name.as_str()).collect()
            }
            ActionGroupKind::BuiltIn { .. } => Vec::new(),
        }
    }
}

fn customer_id_function() -> FunctionDefinition {
    FunctionDefinition::new(
        "customerId",
        "Get a customer ID given available details. At least one parameter must be sent to the function. This is private information and must not be given to the user.",
    )
    .param("email", ParameterDefinition::string("Email address", false))
    .param("name", ParameterDefinition::string("Customer name", false))
    .param("phone", ParameterDefinition::string("Phone number", false))
}

/// 初版のサポート用関数（customerId, sendToSupport）
pub fn initial_support_functions() -> Vec<FunctionDefinition> {
    vec![
        customer_id_function(),
        FunctionDefinition::new(
            "sendToSupport",
            "Send a message to the support team, used for service escalation. ",
        )
        .param("custId", ParameterDefinition::string("customer ID", true))
        .param(
            "supportSummary",
            ParameterDefinition::string("Summary of the support request", true),
        ),
    ]
}

/// 購入履歴検索を加えたサポート用関数（customerId, sendToSupport, purchaseSearch）
pub fn support_functions() -> Vec<FunctionDefinition> {
    vec![
        customer_id_function(),
        FunctionDefinition::new(
            "sendToSupport",
            "Send a message to the support team, used for service escalation. ",
        )
        .param("custId", ParameterDefinition::string("customer ID", true))
        .param(
            "purchaseId",
            ParameterDefinition::string(
                "the ID of the purchase, can be found using purchaseSearch",
                true,
            ),
        )
        .param(
            "supportSummary",
            ParameterDefinition::string("Summary of the support request", true),
        ),
        FunctionDefinition::new(
            "purchaseSearch",
            "Search for, and get details of a purchases made.  Details can be used for raising support requests. You can confirm you have this data, for example \"I found your purchase\" or \"I can't find your purchase\", but other details are private information and must not be given to the user.",
        )
        .param("custId", ParameterDefinition::string("customer ID", true))
        .param(
            "productDescription",
            ParameterDefinition::string(
                "a description of the purchased product to search for",
                true,
            ),
        )
        .param(
            "purchaseDate",
            ParameterDefinition::string(
                "date of purchase to start search from, in YYYY-MM-DD format",
                true,
            ),
        ),
    ]
}

/// Lambda にルーティングするサポート用アクショングループ
pub fn support_action_group(
    name: &str,
    lambda_arn: &str,
    functions: Vec<FunctionDefinition>,
) -> ActionGroupDefinition {
    ActionGroupDefinition {
        name: name.to_string(),
        enabled: true,
        kind: ActionGroupKind::Functions {
            lambda_arn: lambda_arn.to_string(),
            functions,
        },
    }
}

/// 組み込みコードインタープリタのアクショングループ
pub fn code_interpreter_action_group(name: &str) -> ActionGroupDefinition {
    ActionGroupDefinition {
        name: name.to_string(),
        enabled: true,
        kind: ActionGroupKind::BuiltIn {
            signature: BuiltInSignature::CodeInterpreter,
        },
    }
}
