/// 从 code lens 发起的一次测试运行请求。
///
/// 字段与宿主传参保持一致：`describe` 允许显式为空（测试不在 describe 块内），
/// 因此与 `test_name`/`module` 一样用 `Option` 表达。
#[derive(Debug, Clone, Default)]
pub struct TestRunArgs {
    pub file_path: String,
    pub describe: Option<String>,
    pub test_name: Option<String>,
    pub module: Option<String>,
}

/// 构造 `mix test --include` 的过滤器。
///
/// 优先级固定为：module > 显式测试名（有 describe 时二者拼接）> describe。
/// 该文本格式是对外兼容约定，修改前需同步所有消费方。
pub fn build_test_include(args: &TestRunArgs) -> String {
    if let Some(module) = &args.module {
        return format!("module:{module}");
    }

    let Some(test_name) = &args.test_name else {
        let describe = args.describe.as_deref().unwrap_or_default();
        return format!("describe:{describe}");
    };

    if let Some(describe) = &args.describe {
        return format!("test:test {describe} {test_name}");
    }

    format!("test:test {test_name}")
}

/// 构造在集成终端中执行的完整测试命令。
pub fn build_test_command(args: &TestRunArgs) -> String {
    let include = build_test_include(args);
    format!(
        "mix test --exclude test --include \"{include}\" {}",
        args.file_path
    )
}

/// 构造复制到剪贴板的诊断信息包。
///
/// 文本格式同样是对外约定：用户会把它原样粘贴到 issue 里，
/// 因此保持 Markdown 列表形态，便于直接阅读。
pub fn build_debug_bundle(runtime_versions: &str, host_version: &str, os_description: &str) -> String {
    format!(
        "\n* Elixir & Erlang versions (elixir --version): {runtime_versions}\n* Host extension version: {host_version}\n* Operating System Version: {os_description}\n"
    )
}
