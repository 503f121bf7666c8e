use std::process::{Command, Stdio};

/// 已知与本扩展冲突的扩展标识。
///
/// 这些扩展会重复注册同一批语言能力，导致补全/诊断互相覆盖，
/// 检测到时只做提示，不改变任何状态。
pub const CONFLICTING_EXTENSIONS: &[&str] =
    &["mjmcloug.vscode-elixir", "sammkj.vscode-elixir-formatter"];

/// 语言运行时空转探测的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeProbe {
    /// 命令可执行且 stdout 干净。
    Ok,
    /// 命令不可用（直接调用与 PATH 探测均失败）。
    NotFound,
    /// 命令可执行但空转时向 stdout 打印了额外内容，
    /// 这会污染所有基于 stdout 的协议交互。
    NoisyStdout(String),
}

impl RuntimeProbe {
    /// 转换为一条用户可见的激活期告警；`Ok` 无告警。
    pub fn warning(&self, command: &str) -> Option<String> {
        match self {
            Self::Ok => None,
            Self::NotFound => Some(format!(
                "无法执行 `{command}` 命令，语言服务器大概率无法启动；请确认运行时已安装并在 PATH 中可用。"
            )),
            Self::NoisyStdout(output) => Some(format!(
                "执行 `{command} -e \" \"` 时 stdout 出现额外输出（{} 字节），协议交互可能被污染：{}",
                output.len(),
                output.trim_end()
            )),
        }
    }
}

/// 对语言运行时做一次空转调用（`<command> -e " "`）。
///
/// 激活期只探测一次：失败不阻止后续启动客户端（尽力而为），
/// 但要把“环境本身有问题”尽早告诉用户，避免排障时怀疑扩展逻辑。
pub fn probe_runtime(command: &str) -> RuntimeProbe {
    match run_noop(command) {
        Some(output) => classify_noop_stdout(output),
        None => {
            // 直接调用失败时再尝试 PATH 探测一次，
            // 兼容“shell 能找到但子进程继承环境不同”的场景。
            let Some(resolved) = which(command) else {
                return RuntimeProbe::NotFound;
            };
            match run_noop(&resolved) {
                Some(output) => classify_noop_stdout(output),
                None => RuntimeProbe::NotFound,
            }
        }
    }
}

/// 在宿主已安装扩展列表中筛出冲突项。
pub fn conflicting_extensions<'a>(installed: &'a [String]) -> Vec<&'a str> {
    installed
        .iter()
        .map(String::as_str)
        .filter(|id| CONFLICTING_EXTENSIONS.contains(id))
        .collect()
}

/// 冲突扩展的提示文案。
pub fn conflict_warning(extension_id: &str) -> String {
    format!("检测到不兼容扩展 {extension_id}，建议卸载后再使用本扩展。")
}

fn run_noop(command: &str) -> Option<Vec<u8>> {
    Command::new(command)
        .args(["-e", " "])
        .stderr(Stdio::null())
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| output.stdout)
}

fn classify_noop_stdout(stdout: Vec<u8>) -> RuntimeProbe {
    if stdout.is_empty() {
        RuntimeProbe::Ok
    } else {
        RuntimeProbe::NoisyStdout(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// 在系统 PATH 中解析命令的完整路径。
///
/// 使用平台原生命令（Windows: `where`，其他: `which`）进行探测，
/// 可以避免直接尝试启动目标进程带来的副作用。
pub fn which(command: &str) -> Option<String> {
    #[cfg(target_os = "windows")]
    let finder = "where";
    #[cfg(not(target_os = "windows"))]
    let finder = "which";

    let output = Command::new(finder)
        .arg(command)
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let first = text.lines().next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}
