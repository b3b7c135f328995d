use aws_config::SdkConfig;
use aws_sdk_bedrockagentruntime::Client;
use aws_sdk_bedrockagentruntime::operation::invoke_agent::InvokeAgentOutput;
use aws_sdk_bedrockagentruntime::types::ResponseStream;
use tracing::debug;

use crate::ProvisionError;

/// エージェント応答ストリームのイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    /// 応答テキストの断片
    Text(String),
    /// トレース情報（デバッグ表示用）
    Trace(String),
}

/// エージェント呼び出しの応答ストリーム
pub struct AgentReply {
    output: InvokeAgentOutput,
}

impl AgentReply {
    /// 次のイベントを受信する。ストリームが終了した場合は `None`
    pub async fn next_event(&mut self) -> Result<Option<ReplyEvent>, ProvisionError> {
        loop {
            let event = self
                .output
                .completion
                .recv()
                .await
                .map_err(|e| {
                    ProvisionError::StreamError(
                        aws_smithy_types::error::display::DisplayErrorContext(e).to_string(),
                    )
                })?;

            match event {
                None => return Ok(None),
                Some(ResponseStream::Chunk(part)) => {
                    let text = part
                        .bytes()
                        .map(|b| String::from_utf8_lossy(b.as_ref()).into_owned())
                        .unwrap_or_default();
                    return Ok(Some(ReplyEvent::Text(text)));
                }
                Some(ResponseStream::Trace(part)) => {
                    return Ok(Some(ReplyEvent::Trace(format!("{:?}", part.trace()))));
                }
                Some(other) => {
                    debug!(event = ?other, "ignoring response stream event");
                }
            }
        }
    }

    /// ストリームを最後まで読み、応答テキストを連結して返す
    pub async fn collect_text(mut self) -> Result<String, ProvisionError> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await? {
            match event {
                ReplyEvent::Text(chunk) => text.push_str(&chunk),
                ReplyEvent::Trace(trace) => debug!(%trace, "agent trace"),
            }
        }
        Ok(text)
    }
}

/// デプロイ済みエージェントとの会話セッション
///
/// 会話履歴はセッション ID に紐付いてクラウド側に保存されるため、
/// ローカルではセッション ID のみを保持する。
pub struct AgentSession {
    client: Client,
    agent_id: String,
    alias_id: String,
    session_id: String,
    enable_trace: bool,
}

impl AgentSession {
    /// 新しいセッション ID でセッションを作成する
    pub fn new(config: &SdkConfig, agent_id: &str, alias_id: &str) -> Self {
        Self {
            client: Client::new(config),
            agent_id: agent_id.to_string(),
            alias_id: alias_id.to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
            enable_trace: false,
        }
    }

    /// トレースの有効・無効を切り替える
    pub fn with_trace(mut self, enable_trace: bool) -> Self {
        self.enable_trace = enable_trace;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn alias_id(&self) -> &str {
        &self.alias_id
    }

    /// メッセージを送信し、応答ストリームを返す
    pub async fn send_message(&self, input: &str) -> Result<AgentReply, ProvisionError> {
        self.invoke(input, false).await
    }

    /// セッションを終了する
    pub async fn end_session(&self) -> Result<(), ProvisionError> {
        let reply = self.invoke("Goodbye.", true).await?;
        reply.collect_text().await?;
        Ok(())
    }

    async fn invoke(&self, input: &str, end_session: bool) -> Result<AgentReply, ProvisionError> {
        debug!(
            agent_id = %self.agent_id,
            alias_id = %self.alias_id,
            session_id = %self.session_id,
            end_session,
            "invoking agent"
        );

        let output = self
            .client
            .invoke_agent()
            .agent_id(&self.agent_id)
            .agent_alias_id(&self.alias_id)
            .session_id(&self.session_id)
            .input_text(input)
            .enable_trace(self.enable_trace)
            .end_session(end_session)
            .send()
            .await
            .map_err(ProvisionError::sdk)?;

        Ok(AgentReply { output })
    }
}
