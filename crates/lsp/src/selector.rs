use std::path::{Path, PathBuf};

use host_core::{config::HostConfig, workspace::WorkspaceFolder};

/// 扩展服务的语言标识。
pub const LANGUAGES: &[&str] = &["elixir", "eex", "html-eex"];

/// 文件监听与选择器使用的扩展名列表。
pub const FILE_EXTENSIONS: &[&str] = &["ex", "exs", "erl", "yrl", "xrl", "eex", "leex"];

/// 扩展自带语言服务器发行目录（相对扩展安装根目录）。
const RELEASE_DIR: &str = "elixir-ls-release";

/// 判断语言标识是否在受支持集合内。
pub fn is_supported_language(language_id: &str) -> bool {
    LANGUAGES.contains(&language_id)
}

/// 文档选择器规则，交给宿主的文档路由子系统消费。
///
/// `scheme` 区分 `untitled`（未落盘缓冲区）与 `file`；
/// `pattern` 仅在按文件夹作用域时出现。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFilter {
    pub language: String,
    pub scheme: String,
    pub pattern: Option<String>,
}

/// 未落盘缓冲区使用的选择器：覆盖全部受支持语言，scheme 固定为 untitled。
pub fn selector_for_untitled() -> Vec<DocumentFilter> {
    LANGUAGES
        .iter()
        .map(|language| DocumentFilter {
            language: (*language).to_string(),
            scheme: "untitled".to_string(),
            pattern: None,
        })
        .collect()
}

/// 指定文件夹使用的选择器：按文件夹根目录限定 glob 作用域。
pub fn selector_for_folder(folder: &WorkspaceFolder) -> Vec<DocumentFilter> {
    let pattern = format!("{}/**/*", folder.root.display());
    LANGUAGES
        .iter()
        .map(|language| DocumentFilter {
            language: (*language).to_string(),
            scheme: "file".to_string(),
            pattern: Some(pattern.clone()),
        })
        .collect()
}

/// 文件监听使用的扩展名 glob。
pub fn file_glob_pattern() -> String {
    format!("**/*.{{{}}}", FILE_EXTENSIONS.join(","))
}

/// 平台对应的启动脚本文件名。
pub fn launcher_script_name() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "language_server.bat"
    }
    #[cfg(not(target_os = "windows"))]
    {
        "language_server.sh"
    }
}

/// 语言服务器的启动方式：脚本路径，约定无参数调用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherSpec {
    pub command: PathBuf,
}

/// 解析启动脚本路径。
///
/// 优先级：配置覆盖命令 > 配置指定目录 > 扩展自带发行目录。
/// 这里只做路径拼接不做存在性检查，启动失败时由注册表统一上报。
pub fn resolve_launcher(config: &HostConfig, extension_root: &Path) -> LauncherSpec {
    if let Some(command) = &config.launcher_command {
        return LauncherSpec {
            command: PathBuf::from(command),
        };
    }

    let dir = config
        .launcher_dir
        .clone()
        .unwrap_or_else(|| extension_root.join(RELEASE_DIR));
    LauncherSpec {
        command: dir.join(launcher_script_name()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use host_core::{config::HostConfig, workspace::WorkspaceFolder};

    use super::{
        file_glob_pattern, is_supported_language, resolve_launcher, selector_for_folder,
        selector_for_untitled,
    };

    #[test]
    fn supported_languages_should_cover_eex_variants() {
        assert!(is_supported_language("elixir"));
        assert!(is_supported_language("eex"));
        assert!(is_supported_language("html-eex"));
        assert!(!is_supported_language("erlang"));
    }

    #[test]
    fn untitled_selector_should_use_untitled_scheme_without_pattern() {
        let selector = selector_for_untitled();
        assert_eq!(selector.len(), 3);
        for filter in &selector {
            assert_eq!(filter.scheme, "untitled");
            assert!(filter.pattern.is_none());
        }
    }

    #[test]
    fn folder_selector_should_scope_pattern_to_folder_root() {
        let folder = WorkspaceFolder::new("/work/app", "app");
        let selector = selector_for_folder(&folder);
        assert_eq!(selector.len(), 3);
        for filter in &selector {
            assert_eq!(filter.scheme, "file");
            assert_eq!(filter.pattern.as_deref(), Some("/work/app/**/*"));
        }
    }

    #[test]
    fn file_glob_should_list_all_extensions() {
        assert_eq!(file_glob_pattern(), "**/*.{ex,exs,erl,yrl,xrl,eex,leex}");
    }

    #[test]
    fn resolve_launcher_should_prefer_config_command() {
        let config = HostConfig {
            launcher_command: Some("cat".to_string()),
            ..HostConfig::default()
        };
        let spec = resolve_launcher(&config, Path::new("/ext"));
        assert_eq!(spec.command, Path::new("cat"));
    }

    #[test]
    fn resolve_launcher_should_default_to_release_dir() {
        let spec = resolve_launcher(&HostConfig::default(), Path::new("/ext"));
        let command = spec.command.to_string_lossy();
        assert!(command.starts_with("/ext/elixir-ls-release/language_server."));
    }
}
