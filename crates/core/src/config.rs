use std::{fs, path::Path, path::PathBuf};

use serde::Deserialize;

/// 宿主可选配置（`.tether/config.toml`）。
///
/// 所有字段都有默认值：配置文件缺失或解析失败时回退默认并告警，
/// 不允许配置问题阻断激活流程。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// 语言服务器启动脚本所在目录；默认为扩展自带的 release 目录。
    pub launcher_dir: Option<PathBuf>,
    /// 覆盖启动命令（主要用于测试和非标准发行版）。
    pub launcher_command: Option<String>,
    /// 是否在激活时执行运行时环境自检。
    pub env_check: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            launcher_dir: None,
            launcher_command: None,
            env_check: true,
        }
    }
}

/// 配置文件相对工作区根目录的路径。
fn config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".tether").join("config.toml")
}

/// 尽力加载宿主配置。
///
/// 返回 `(配置, 告警列表)`：读取/解析失败只产生告警并回退默认值。
pub fn load_config(workspace_root: &Path) -> (HostConfig, Vec<String>) {
    let path = config_path(workspace_root);
    let mut warnings = Vec::new();

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return (HostConfig::default(), warnings);
        }
        Err(error) => {
            warnings.push(format!("读取配置失败，使用默认配置: {} ({error})", path.display()));
            return (HostConfig::default(), warnings);
        }
    };

    match toml::from_str::<HostConfig>(&text) {
        Ok(config) => (config, warnings),
        Err(error) => {
            warnings.push(format!("解析配置失败，使用默认配置: {} ({error})", path.display()));
            (HostConfig::default(), warnings)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::load_config;

    fn temp_workspace() -> std::path::PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("tether-config-test-{nonce}"));
        std::fs::create_dir_all(root.join(".tether")).expect("temp config dir should be creatable");
        root
    }

    #[test]
    fn load_config_should_default_when_file_missing() {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("tether-config-missing-{nonce}"));

        let (config, warnings) = load_config(&root);
        assert!(config.launcher_command.is_none());
        assert!(config.env_check);
        assert!(warnings.is_empty());
    }

    #[test]
    fn load_config_should_read_overrides() {
        let root = temp_workspace();
        std::fs::write(
            root.join(".tether").join("config.toml"),
            "launcher_command = \"cat\"\nenv_check = false\n",
        )
        .expect("config file should be written");

        let (config, warnings) = load_config(&root);
        assert_eq!(config.launcher_command.as_deref(), Some("cat"));
        assert!(!config.env_check);
        assert!(warnings.is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn load_config_should_warn_and_default_on_parse_error() {
        let root = temp_workspace();
        std::fs::write(root.join(".tether").join("config.toml"), "launcher_dir = [broken")
            .expect("config file should be written");

        let (config, warnings) = load_config(&root);
        assert!(config.launcher_dir.is_none());
        assert!(config.env_check);
        assert_eq!(warnings.len(), 1);

        let _ = std::fs::remove_dir_all(&root);
    }
}
