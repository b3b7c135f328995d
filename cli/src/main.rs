use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use provision::action_group::{
    code_interpreter_action_group, initial_support_functions, support_action_group,
    support_functions,
};
use provision::guardrail::support_guardrail;
use provision::{
    AgentSession, BedrockControlPlane, ControlPlane, ProvisionConfig, Provisioner, ReplyEvent,
    SupportSettings,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

// UI関連の設定
const USER_NAME: &str = "User";
const AGENT_NAME: &str = "Agent";
const LOADING_ANIMATION_INTERVAL: u64 = 200;
const LOADING_ANIMATION_CHARACTER: &str = ".";
// ローディングアニメーションをクリアするためのスペース文字列
const CLEAR_LINE_SPACES: &str = "                                     "; // 37 spaces

const DEFAULT_KB_DESCRIPTION: &str = "Knowledge base for the customer support agent.";

// CLIの引数構造体定義
#[derive(Parser)]
#[command(name = "support-agent")]
#[command(about = "Provision and talk to an AWS Bedrock customer support agent", long_about = None)]
struct Cli {
    /// 使用するAWSプロファイル名
    #[arg(long, global = true, env = "AWS_PROFILE")]
    aws_profile: Option<String>,

    /// リージョン (オプション: デフォルトはプロファイル設定またはus-west-2)
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// 設定ファイルのパス (省略時は .bedrock/support-agent.json, support-agent.json の順に検索)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// デバッグログを出力する
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// 対象エージェントの指定
#[derive(Args)]
struct AgentTarget {
    /// エージェントID
    #[arg(long, env = "BEDROCK_AGENT_ID")]
    agent_id: String,

    /// エージェントエイリアスID
    #[arg(long, env = "BEDROCK_AGENT_ALIAS_ID")]
    alias_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// エージェント作成からガードレール適用までを一括で実行します
    Setup {
        /// エージェントがモデルを呼び出すためのIAMロール
        #[arg(long, env = "BEDROCK_AGENT_ROLE_ARN")]
        role_arn: String,

        /// アクションを実行するLambda関数
        #[arg(long, env = "LAMBDA_FUNCTION_ARN")]
        lambda_arn: String,
    },

    /// エージェントを作成して準備し、エイリアスを作成します
    CreateAgent {
        #[arg(long, env = "BEDROCK_AGENT_ROLE_ARN")]
        role_arn: String,
    },

    /// サポート用アクショングループ (customerId, sendToSupport) を追加します
    AddActions {
        #[command(flatten)]
        target: AgentTarget,

        #[arg(long, env = "LAMBDA_FUNCTION_ARN")]
        lambda_arn: String,
    },

    /// サポート用アクショングループに purchaseSearch を追加します
    UpdateActions {
        #[command(flatten)]
        target: AgentTarget,

        #[arg(long, env = "ACTION_GROUP_ID")]
        action_group_id: String,

        #[arg(long, env = "LAMBDA_FUNCTION_ARN")]
        lambda_arn: String,
    },

    /// 組み込みのコードインタープリタを追加します
    AddCodeInterpreter {
        #[command(flatten)]
        target: AgentTarget,
    },

    /// ガードレールを作成してエージェントに適用します
    AddGuardrail {
        #[command(flatten)]
        target: AgentTarget,
    },

    /// ナレッジベースをエージェントに紐付けます
    AssociateKb {
        #[command(flatten)]
        target: AgentTarget,

        #[arg(long, env = "KNOWLEDGE_BASE_ID")]
        knowledge_base_id: String,

        #[arg(long, default_value = DEFAULT_KB_DESCRIPTION)]
        description: String,
    },

    /// エージェントを再準備し、エイリアスを更新します
    RefreshAlias {
        #[command(flatten)]
        target: AgentTarget,

        /// 新しいエイリアス名 (省略時は設定ファイルの値)
        #[arg(long)]
        alias_name: Option<String>,
    },

    /// エージェント・エイリアス・アクショングループの状態を表示します
    Status {
        #[arg(long, env = "BEDROCK_AGENT_ID")]
        agent_id: String,

        #[arg(long, env = "BEDROCK_AGENT_ALIAS_ID")]
        alias_id: Option<String>,

        #[arg(long, env = "ACTION_GROUP_ID")]
        action_group_id: Option<String>,
    },

    /// エージェントに1回だけメッセージを送信します
    Invoke {
        #[command(flatten)]
        target: AgentTarget,

        /// 送信するメッセージ
        #[arg(long)]
        message: String,

        /// トレースを表示する
        #[arg(long)]
        trace: bool,
    },

    /// エージェントと対話します
    Chat {
        #[command(flatten)]
        target: AgentTarget,

        /// トレースを表示する
        #[arg(long)]
        trace: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 引数の解析
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = SupportSettings::load(cli.config.clone()).context("Failed to load settings")?;
    let sdk_config = ProvisionConfig::new(cli.aws_profile.clone(), cli.region.clone())
        .load_sdk_config()
        .await;
    let provisioner = Provisioner::new(
        BedrockControlPlane::new(&sdk_config),
        settings.wait_config(),
    );

    match cli.command {
        Commands::Setup {
            role_arn,
            lambda_arn,
        } => {
            let report = provisioner
                .run_support_setup(&settings, &role_arn, &lambda_arn)
                .await?;
            print_json(&report)?;
        }
        Commands::CreateAgent { role_arn } => {
            let agent = provisioner
                .create_agent(&settings.agent_definition(&role_arn))
                .await?;
            let agent = provisioner.prepare_agent(&agent.agent_id).await?;
            let alias = provisioner
                .create_alias(&agent.agent_id, &settings.alias_name)
                .await?;
            print_json(&serde_json::json!({ "agent": agent, "alias": alias }))?;
        }
        Commands::AddActions { target, lambda_arn } => {
            let definition = support_action_group(
                &settings.action_group_name,
                &lambda_arn,
                initial_support_functions(),
            );
            let group = provisioner
                .create_action_group(&target.agent_id, &definition)
                .await?;
            let alias = provisioner
                .refresh_alias(&target.agent_id, &target.alias_id, &settings.alias_name)
                .await?;
            print_json(&serde_json::json!({ "action_group": group, "alias": alias }))?;
        }
        Commands::UpdateActions {
            target,
            action_group_id,
            lambda_arn,
        } => {
            let definition =
                support_action_group(&settings.action_group_name, &lambda_arn, support_functions());
            let group = provisioner
                .update_action_group(&target.agent_id, &action_group_id, &definition)
                .await?;
            let alias = provisioner
                .refresh_alias(&target.agent_id, &target.alias_id, &settings.alias_name)
                .await?;
            print_json(&serde_json::json!({ "action_group": group, "alias": alias }))?;
        }
        Commands::AddCodeInterpreter { target } => {
            let definition = code_interpreter_action_group(&settings.code_interpreter_name);
            let group = provisioner
                .create_action_group(&target.agent_id, &definition)
                .await?;
            let alias = provisioner
                .refresh_alias(&target.agent_id, &target.alias_id, &settings.alias_name)
                .await?;
            print_json(&serde_json::json!({ "action_group": group, "alias": alias }))?;
        }
        Commands::AddGuardrail { target } => {
            let guardrail = provisioner
                .attach_guardrail(&target.agent_id, &support_guardrail(&settings.guardrail_name))
                .await?;
            let alias = provisioner
                .refresh_alias(&target.agent_id, &target.alias_id, &settings.alias_name)
                .await?;
            print_json(&serde_json::json!({ "guardrail": guardrail, "alias": alias }))?;
        }
        Commands::AssociateKb {
            target,
            knowledge_base_id,
            description,
        } => {
            let kb = provisioner
                .associate_knowledge_base(&target.agent_id, &knowledge_base_id, &description)
                .await?;
            let alias = provisioner
                .refresh_alias(&target.agent_id, &target.alias_id, &settings.alias_name)
                .await?;
            print_json(&serde_json::json!({ "knowledge_base": kb, "alias": alias }))?;
        }
        Commands::RefreshAlias { target, alias_name } => {
            let alias_name = alias_name.unwrap_or_else(|| settings.alias_name.clone());
            let alias = provisioner
                .refresh_alias(&target.agent_id, &target.alias_id, &alias_name)
                .await?;
            print_json(&alias)?;
        }
        Commands::Status {
            agent_id,
            alias_id,
            action_group_id,
        } => {
            let control_plane = provisioner.control_plane();
            let agent = control_plane.get_agent(&agent_id).await?;
            let alias = match alias_id {
                Some(alias_id) => Some(control_plane.get_agent_alias(&agent_id, &alias_id).await?),
                None => None,
            };
            let action_group = match action_group_id {
                Some(group_id) => Some(control_plane.get_action_group(&agent_id, &group_id).await?),
                None => None,
            };
            print_json(&serde_json::json!({
                "agent": agent,
                "alias": alias,
                "action_group": action_group,
            }))?;
        }
        Commands::Invoke {
            target,
            message,
            trace,
        } => {
            let session = AgentSession::new(&sdk_config, &target.agent_id, &target.alias_id)
                .with_trace(trace);
            let mut reply = session.send_message(&message).await?;
            let mut text = String::new();
            while let Some(event) = reply.next_event().await? {
                match event {
                    ReplyEvent::Text(chunk) => text.push_str(&chunk),
                    ReplyEvent::Trace(trace) => eprintln!("[trace] {}", trace),
                }
            }
            print_json(&serde_json::json!({
                "session_id": session.session_id(),
                "completion": text,
            }))?;
        }
        Commands::Chat { target, trace } => {
            let session = AgentSession::new(&sdk_config, &target.agent_id, &target.alias_id)
                .with_trace(trace);
            run_chat(session).await?;
        }
    }

    Ok(())
}

/// ログ出力の初期化（標準出力は JSON 用に空けておく）
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "provision=debug,support_agent=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// CLI対話型セッションを実行する
///
/// ユーザー入力の受け付け、ローディング表示、ストリーミングレスポンスの表示を担当する。
/// 会話履歴はセッションIDに紐付いてクラウド側に保持される。
async fn run_chat(session: AgentSession) -> anyhow::Result<()> {
    info!(session_id = session.session_id(), "starting chat session");

    let mut rl = DefaultEditor::new()?;

    println!(
        "Agent: {} / Alias: {}",
        session.agent_id(),
        session.alias_id()
    );
    println!("+------------------------------------------------------+");
    println!("| Support Agent Started. Type 'exit' or 'quit' to stop. |");
    println!("+------------------------------------------------------+");

    loop {
        let readline = rl.readline(&format!("{} > ", USER_NAME));
        match readline {
            Ok(line) => {
                let input = line.trim();

                // 空入力はスキップ
                if input.is_empty() {
                    continue;
                }

                if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                    break;
                }

                let _ = rl.add_history_entry(input);

                print!("{} > ", AGENT_NAME);
                std::io::stdout().flush()?;

                // ローディングアニメーション開始
                let loading_task = tokio::spawn(async {
                    loop {
                        sleep(Duration::from_millis(LOADING_ANIMATION_INTERVAL)).await;
                        print!("{}", LOADING_ANIMATION_CHARACTER);
                        if std::io::stdout().flush().is_err() {
                            break;
                        }
                    }
                });

                match session.send_message(input).await {
                    Ok(mut reply) => {
                        let mut loading_stopped = false;

                        loop {
                            let event = match reply.next_event().await {
                                Ok(Some(event)) => event,
                                Ok(None) => break,
                                Err(e) => {
                                    println!("\n[Error] Response stream failed: {}", e);
                                    break;
                                }
                            };

                            // 最初のテキストが届いたタイミングでローディングを消す
                            if !loading_stopped && matches!(event, ReplyEvent::Text(_)) {
                                loading_task.abort();
                                loading_stopped = true;
                                clear_loading_animation();
                            }

                            match event {
                                ReplyEvent::Text(text) => {
                                    print!("{}", text);
                                    std::io::stdout().flush()?;
                                }
                                ReplyEvent::Trace(trace) => {
                                    eprintln!("\n[trace] {}", trace);
                                }
                            }
                        }

                        if !loading_stopped {
                            loading_task.abort();
                            clear_loading_animation();
                        }

                        println!();
                    }
                    Err(e) => {
                        loading_task.abort();
                        println!("\n[Error] Bedrock agent invocation failed: {}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Err(e) = session.end_session().await {
        eprintln!("Warning: failed to end session {}: {}", session.session_id(), e);
    }

    Ok(())
}

/// ローディングアニメーションをクリアしてカーソルを戻す
fn clear_loading_animation() {
    print!(
        "\r{} > {}\r{} > ",
        AGENT_NAME, CLEAR_LINE_SPACES, AGENT_NAME
    );
    let _ = std::io::stdout().flush();
}
