/// プロビジョニング処理全体で使用するエラー型
///
/// AWS SDK のエラーは文字列化して保持する。
/// ステータス待機のタイムアウトと失敗ステータスの検出だけは
/// 呼び出し元が区別できるよう専用のバリアントを持つ。
#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    #[error("AWS SDK error: {0}")]
    AwsSdkError(String),

    #[error("Request building error: {0}")]
    BuildError(String),

    #[error("Response is missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Response stream error: {0}")]
    StreamError(String),

    #[error(
        "Timed out waiting for {resource} to reach {target} after {attempts} attempts (last status: {last_status})"
    )]
    WaitTimeout {
        resource: String,
        target: String,
        last_status: String,
        attempts: u32,
    },

    #[error("{resource} entered failure status {status}")]
    ResourceFailed { resource: String, status: String },
}

impl ProvisionError {
    /// SDK のエラーを詳細付きの文字列に変換して包む
    pub(crate) fn sdk<E>(err: E) -> Self
    where
        E: std::error::Error,
    {
        ProvisionError::AwsSdkError(
            aws_smithy_types::error::display::DisplayErrorContext(err).to_string(),
        )
    }

    /// ステータス待機のタイムアウトかどうか
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProvisionError::WaitTimeout { .. })
    }
}
