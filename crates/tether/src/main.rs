use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};

use host_core::{
    commands, config, env_check,
    observability::{self, HostEvent, ts},
    workspace::{FolderSet, WorkspaceFolder},
};
use lsp::{ClientEvent, ClientRegistry, Document, DocumentRouter, resolve_launcher};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("resolve-link") => resolve_link(&args[1..].join(" ")),
        Some("debug-info") => {
            print!("{}", collect_debug_bundle());
            Ok(())
        }
        _ => route_documents(&args).await,
    }
}

/// 主流程：模拟一次宿主激活。
///
/// 参数中的目录作为打开的工作区文件夹，文件作为待路由的文档；
/// 路由后轮询客户端生命周期事件直到全部定型，最后统一停止。
async fn route_documents(args: &[String]) -> Result<()> {
    let workspace_root = std::env::current_dir().context("获取当前目录失败")?;

    let (config, warnings) = config::load_config(&workspace_root);
    for warning in &warnings {
        eprintln!("{warning}");
        observability::log_event_best_effort(
            &workspace_root,
            HostEvent::EnvWarning {
                ts: ts(),
                message: warning.clone(),
            },
        );
    }

    if config.env_check {
        run_env_check(&workspace_root);
    }

    let (mut folder_roots, documents) = partition_args(args);
    if folder_roots.is_empty() {
        folder_roots.push(workspace_root.clone());
    }
    let folders = FolderSet::new(folder_roots.iter().map(|root| folder(root)).collect());

    let launcher = resolve_launcher(&config, &workspace_root);
    let registry = ClientRegistry::new(launcher);
    let mut router = DocumentRouter::new(folders, registry);

    for document in &documents {
        if let Err(error) = router.on_document_opened(document) {
            eprintln!("文档路由失败（继续处理其余文档）: {error:#}");
        }
    }

    if router.registry().client_count() == 0 {
        println!("没有文档触发客户端启动。");
        return Ok(());
    }

    pump_until_settled(&mut router).await;
    println!("{}", router.registry().status_message());

    for (key, result) in router.shutdown().await {
        match result {
            Ok(()) => println!("已停止 {}", key.label()),
            Err(error) => eprintln!("停止 {} 失败: {error}", key.label()),
        }
    }
    Ok(())
}

/// 轮询生命周期事件，直到每个已启动的客户端定型（就绪/失败/退出）或超时。
async fn pump_until_settled(router: &mut DocumentRouter) {
    let started = router.registry().client_count();
    let mut settled = 0usize;
    let deadline = Instant::now() + Duration::from_secs(10);

    while settled < started && Instant::now() < deadline {
        for event in router.registry_mut().pump_events() {
            match event {
                ClientEvent::Ready { key } => {
                    println!("客户端就绪: {}", key.label());
                    settled += 1;
                }
                ClientEvent::StartFailed { key, error } => {
                    eprintln!("客户端启动失败: {} ({error})", key.label());
                    settled += 1;
                }
                ClientEvent::Exited { key } => {
                    eprintln!("客户端提前退出: {}", key.label());
                    settled += 1;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// 激活期环境自检：运行时空转探测，问题只告警不阻断。
fn run_env_check(workspace_root: &Path) {
    let probe = env_check::probe_runtime("elixir");
    if let Some(warning) = probe.warning("elixir") {
        eprintln!("{warning}");
        observability::log_event_best_effort(
            workspace_root,
            HostEvent::EnvWarning {
                ts: ts(),
                message: warning,
            },
        );
    }
}

/// 目录参数视为打开的文件夹，文件参数视为要路由的文档。
fn partition_args(args: &[String]) -> (Vec<PathBuf>, Vec<Document>) {
    let mut folder_roots = Vec::new();
    let mut documents = Vec::new();

    for arg in args {
        let path = PathBuf::from(arg);
        if path.is_dir() {
            folder_roots.push(path);
        } else if let Some(language_id) = language_id_for(&path) {
            documents.push(Document::file(path, language_id));
        } else {
            eprintln!("忽略不受支持的参数: {arg}");
        }
    }

    (folder_roots, documents)
}

/// 从扩展名推断宿主语言标识。
fn language_id_for(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "ex" | "exs" => Some("elixir"),
        "eex" | "leex" => Some("eex"),
        _ => None,
    }
}

fn folder(root: &Path) -> WorkspaceFolder {
    let name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string());
    WorkspaceFolder::new(root, name)
}

/// `resolve-link`：对一行终端输出做链接识别与候选探测（诊断用）。
fn resolve_link(line: &str) -> Result<()> {
    let Some(matched) = links::match_line(line) else {
        println!("该行没有可识别的链接。");
        return Ok(());
    };

    println!(
        "识别到链接: {}:{}（可点击区间 [{}, {})）",
        matched.file,
        matched.line,
        matched.start,
        matched.start + matched.length
    );

    let workspace_root = std::env::current_dir().context("获取当前目录失败")?;
    let folders = FolderSet::new(vec![folder(&workspace_root)]);
    let candidates = links::existing_candidates(&folders, &matched);
    if candidates.is_empty() {
        println!("没有命中任何候选文件。");
    } else {
        for candidate in candidates {
            println!("候选: {}", candidate.display());
        }
    }
    Ok(())
}

/// `debug-info`：汇总排障信息，供用户粘贴到 issue。
fn collect_debug_bundle() -> String {
    let runtime_versions = match std::process::Command::new("elixir")
        .arg("--version")
        .output()
    {
        Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
        Err(_) => "elixir 命令不可用".to_string(),
    };
    let os_description = format!("{} {}", std::env::consts::OS, std::env::consts::ARCH);

    commands::build_debug_bundle(
        &runtime_versions,
        env!("CARGO_PKG_VERSION"),
        &os_description,
    )
}
