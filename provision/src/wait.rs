//! リソースのステータス待機
//!
//! Bedrock のコントロールプレーンは結果整合のため、作成・更新の直後に
//! 次の依存呼び出しを行うと失敗することがある。ここでは一定間隔で
//! ステータスを問い合わせ、目標値に達するまで待機する。
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::ProvisionError;
use crate::agent::status;
use crate::control_plane::ControlPlane;

/// エージェントの失敗ステータス
pub const AGENT_FAILURE_STATUSES: &[&str] = &[status::FAILED, status::DELETING];

/// エイリアスの失敗ステータス
pub const ALIAS_FAILURE_STATUSES: &[&str] =
    &[status::FAILED, status::DELETING, status::DISSOCIATED];

/// 待機のポーリング設定（固定間隔・回数上限）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl WaitConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// ステータスが目標値になるまで問い合わせを繰り返す
///
/// # Arguments
/// * `resource` - ログとエラーに使うリソース名
/// * `target` - 目標ステータス
/// * `failure_statuses` - 観測した時点で即座に失敗とみなすステータス
/// * `config` - 問い合わせ間隔と回数上限（0 の場合も最低1回は問い合わせる）
/// * `probe` - 現在のステータスを返す非同期関数
///
/// # Returns
/// * `Ok(String)` - 目標に達したステータス
/// * `Err(ProvisionError::ResourceFailed)` - 失敗ステータスを観測した場合
/// * `Err(ProvisionError::WaitTimeout)` - 回数上限に達した場合
/// * `Err(_)` - 問い合わせ自体が失敗した場合（そのまま返す）
pub async fn wait_for_status<F, Fut>(
    resource: &str,
    target: &str,
    failure_statuses: &[&str],
    config: &WaitConfig,
    mut probe: F,
) -> Result<String, ProvisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ProvisionError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_status = String::from("UNKNOWN");

    for attempt in 1..=max_attempts {
        let current = probe().await?;
        debug!(resource, target, status = %current, attempt, "polled status");

        if current == target {
            info!(resource, status = %current, "reached target status");
            return Ok(current);
        }

        if failure_statuses.contains(&current.as_str()) {
            warn!(resource, status = %current, "resource entered failure status");
            return Err(ProvisionError::ResourceFailed {
                resource: resource.to_string(),
                status: current,
            });
        }

        last_status = current;
        if attempt < max_attempts {
            sleep(config.interval).await;
        }
    }

    Err(ProvisionError::WaitTimeout {
        resource: resource.to_string(),
        target: target.to_string(),
        last_status,
        attempts: max_attempts,
    })
}

/// エージェントのステータスを待機する
pub async fn wait_for_agent_status<C>(
    control_plane: &C,
    agent_id: &str,
    target: &str,
    config: &WaitConfig,
) -> Result<String, ProvisionError>
where
    C: ControlPlane + ?Sized,
{
    let resource = format!("agent {}", agent_id);
    wait_for_status(&resource, target, AGENT_FAILURE_STATUSES, config, move || async move {
        Ok::<_, ProvisionError>(control_plane.get_agent(agent_id).await?.status)
    })
    .await
}

/// エージェントエイリアスのステータスを待機する
pub async fn wait_for_agent_alias_status<C>(
    control_plane: &C,
    agent_id: &str,
    alias_id: &str,
    target: &str,
    config: &WaitConfig,
) -> Result<String, ProvisionError>
where
    C: ControlPlane + ?Sized,
{
    let resource = format!("alias {} of agent {}", alias_id, agent_id);
    wait_for_status(&resource, target, ALIAS_FAILURE_STATUSES, config, move || async move {
        Ok::<_, ProvisionError>(control_plane.get_agent_alias(agent_id, alias_id).await?.status)
    })
    .await
}

/// アクショングループの状態を待機する
///
/// アクショングループには失敗状態がないため、回数上限のみで打ち切る。
pub async fn wait_for_action_group_status<C>(
    control_plane: &C,
    agent_id: &str,
    action_group_id: &str,
    target: &str,
    config: &WaitConfig,
) -> Result<String, ProvisionError>
where
    C: ControlPlane + ?Sized,
{
    let resource = format!("action group {} of agent {}", action_group_id, agent_id);
    wait_for_status(&resource, target, &[], config, move || async move {
        Ok::<_, ProvisionError>(
            control_plane
                .get_action_group(agent_id, action_group_id)
                .await?
                .state,
        )
    })
    .await
}
