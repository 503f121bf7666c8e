use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::encoding::append_utf8_json_line;

/// 统一结构化日志事件（JSON Line）。
///
/// 设计要点：
/// - 客户端生命周期（启动/就绪/失败/停止）逐条落盘，便于复盘“为什么某个
///   文件夹没有客户端在跑”；
/// - 采用 JSON Line，便于用 `rg`/脚本快速过滤；
/// - 事件字段尽量稳定：未来新增字段只做向后兼容扩展，避免破坏已有解析。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// 某个绑定键对应的客户端开始启动。
    ClientStarting { ts: String, key: String },
    /// 客户端完成握手进入 Running。
    ClientReady { ts: String, key: String },
    /// 客户端启动失败（进程无法拉起或握手能力异常），键已释放等待重试。
    ClientStartFailed {
        ts: String,
        key: String,
        error: String,
    },
    /// 客户端停止完成。
    ClientStopped { ts: String, key: String, ok: bool },
    /// 停止过程出错（不阻塞其余客户端的停止）。
    ClientStopFailed {
        ts: String,
        key: String,
        error: String,
    },
    /// 工作区文件夹被移除，触发对应客户端回收。
    FolderRemoved { ts: String, root: String },
    /// 终端链接完成跳转。
    LinkNavigated {
        ts: String,
        file: String,
        line: u64,
    },
    /// 激活期环境自检产生的告警。
    EnvWarning { ts: String, message: String },
}

/// 获取当前时间（本地时区）字符串。
fn now_timestamp() -> String {
    Local::now().to_rfc3339()
}

/// 便捷：构建带 `ts` 字段的事件时间戳。
pub fn ts() -> String {
    now_timestamp()
}

/// 生成日志目录：`<workspace>/.tether/logs/`。
fn logs_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".tether").join("logs")
}

/// 生成当天的日志文件路径：`host-YYYYMMDD.log`。
fn daily_log_path(workspace_root: &Path) -> PathBuf {
    let filename = format!("host-{}.log", Local::now().format("%Y%m%d"));
    logs_dir(workspace_root).join(filename)
}

/// 将事件写入日志（JSON Line）。
///
/// 注意：日志失败不应影响主流程，因此对外通常使用 `log_event_best_effort`。
pub fn log_event(workspace_root: &Path, event: &HostEvent) -> io::Result<()> {
    let dir = logs_dir(workspace_root);
    fs::create_dir_all(&dir)?;

    let path = daily_log_path(workspace_root);
    let json =
        serde_json::to_string(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    append_utf8_json_line(&path, &json)?;
    Ok(())
}

/// 尽力写日志：失败时只告警，不中断主流程。
pub fn log_event_best_effort(workspace_root: &Path, event: HostEvent) {
    if let Err(error) = log_event(workspace_root, &event) {
        let path = daily_log_path(workspace_root);
        eprintln!(
            "写入结构化日志失败（已忽略，不影响主流程）: {} ({error})",
            path.display()
        );
    }
}

/// 尽力获取工作区根目录（用于落盘日志）。
///
/// 这里不强依赖任何“工作区配置”：即使用户从子目录启动，
/// 日志仍会落到当前目录的 `.tether/` 下，避免意外写到系统目录。
pub fn workspace_root_best_effort() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
