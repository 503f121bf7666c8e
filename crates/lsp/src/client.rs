use std::{
    collections::HashMap,
    io::BufReader,
    path::PathBuf,
    process::{Child, ChildStdin, Command, Stdio},
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tokio::task::JoinHandle;

use host_core::{
    observability::{self, HostEvent, ts},
    workspace::WorkspaceFolder,
};

use crate::{
    protocol,
    selector::{DocumentFilter, LauncherSpec},
};

/// 客户端绑定键。
///
/// `Default` 是未落盘缓冲区使用的哨兵绑定；`Folder` 绑定到一个
/// 最外层工作区文件夹的根路径。同一键在任意时刻最多对应一个句柄，
/// 这是注册表的核心不变量。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientKey {
    Default,
    Folder(PathBuf),
}

impl ClientKey {
    pub fn for_folder(folder: &WorkspaceFolder) -> Self {
        Self::Folder(folder.root.clone())
    }

    /// 日志与状态栏展示用的稳定文本形式。
    pub fn label(&self) -> String {
        match self {
            Self::Default => "default".to_string(),
            Self::Folder(root) => format!("folder:{}", root.display()),
        }
    }
}

/// 客户端生命周期状态。
///
/// 闭合的四态枚举：`Starting` 在握手完成前，`Running` 在 initialize
/// 响应校验通过后，`Stopping/Stopped` 由停止路径驱动。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// 注册表向上层汇报的生命周期事件。
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// 握手完成，客户端进入 Running。
    Ready { key: ClientKey },
    /// 启动失败（进程拉起失败、能力声明异常或握手前流关闭），键已释放。
    StartFailed { key: ClientKey, error: String },
    /// 运行中的客户端进程自行退出，键已释放。
    Exited { key: ClientKey },
}

/// 读取线程发给句柄的消息。
enum ReaderMessage {
    Message(Value),
    StreamClosed(Option<String>),
}

/// 一次异步停止的完成凭据。
///
/// `remove`/`drain_all` 先同步摘除注册表条目，再把 kill+wait 放进
/// 阻塞任务池；等待方通过该凭据获知停止结果，失败彼此隔离。
pub struct StopCompletion {
    key: ClientKey,
    task: JoinHandle<Result<(), String>>,
}

impl StopCompletion {
    pub fn key(&self) -> &ClientKey {
        &self.key
    }

    /// 等待停止完成。
    pub async fn wait(self) -> Result<(), String> {
        match self.task.await {
            Ok(result) => result,
            Err(error) => Err(format!("停止任务本身失败: {error}")),
        }
    }

    pub(crate) fn from_task(key: ClientKey, task: JoinHandle<Result<(), String>>) -> Self {
        Self { key, task }
    }
}

/// 并发等待一批停止完成，逐个收集结果。
///
/// 任何一个停止失败都不会中断其他等待，这保证 `drain_all` 在“每个
/// 停止尝试都结束”之后才返回。
pub(crate) async fn wait_all(
    completions: Vec<StopCompletion>,
) -> Vec<(ClientKey, Result<(), String>)> {
    let waits = completions.into_iter().map(|completion| async move {
        let key = completion.key.clone();
        (key, completion.wait().await)
    });
    futures::future::join_all(waits).await
}

/// 单个语言服务器进程的句柄。
#[derive(Debug)]
pub struct ClientHandle {
    key: ClientKey,
    selector: Vec<DocumentFilter>,
    state: ClientState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    request_id: u64,
    initialize_request_id: Option<u64>,
    reader_rx: Receiver<ReaderMessage>,
    pending_messages: Vec<Value>,
}

impl ClientHandle {
    /// 拉起启动脚本并发送握手序列。
    ///
    /// 约定脚本无参数调用、通过标准流交换 JSON-RPC；绑定到文件夹时
    /// 以文件夹根目录作为工作目录启动，使版本管理器能加载正确环境。
    fn spawn(
        key: ClientKey,
        selector: Vec<DocumentFilter>,
        launcher: &LauncherSpec,
        folder: Option<&WorkspaceFolder>,
    ) -> Result<Self> {
        let mut command = Command::new(&launcher.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(folder) = folder {
            command.current_dir(&folder.root);
        }

        let mut child = command.spawn().with_context(|| {
            format!(
                "启动语言服务器失败: {}（请确认启动脚本存在且可执行）",
                launcher.command.display()
            )
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("无法获取语言服务器标准输入（{}）", key.label()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("无法获取语言服务器标准输出（{}）", key.label()))?;

        let (reader_tx, reader_rx) = mpsc::channel::<ReaderMessage>();
        spawn_reader_thread(stdout, reader_tx);

        let mut handle = Self {
            key,
            selector,
            state: ClientState::Starting,
            child: Some(child),
            stdin: Some(stdin),
            request_id: 1,
            initialize_request_id: None,
            reader_rx,
            pending_messages: Vec::new(),
        };

        handle.send_initialize_sequence(folder)?;
        Ok(handle)
    }

    pub fn key(&self) -> &ClientKey {
        &self.key
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// 该句柄服务的文档选择器规则。
    pub fn selector(&self) -> &[DocumentFilter] {
        &self.selector
    }

    /// 发送初始化握手。
    fn send_initialize_sequence(&mut self, folder: Option<&WorkspaceFolder>) -> Result<()> {
        let (root_uri, workspace_folders) = match folder {
            Some(folder) => {
                let uri = protocol::path_to_file_uri(&folder.root).with_context(|| {
                    format!("工作区路径无法转换为 URI: {}", folder.root.display())
                })?;
                let entry = serde_json::json!({ "uri": uri, "name": folder.name });
                (Value::String(uri), Value::Array(vec![entry]))
            }
            None => (Value::Null, Value::Array(Vec::new())),
        };

        let initialize_request_id = self.next_request_id();
        self.initialize_request_id = Some(initialize_request_id);

        let initialize = serde_json::json!({
            "jsonrpc": "2.0",
            "id": initialize_request_id,
            "method": "initialize",
            "params": {
                "processId": std::process::id(),
                "clientInfo": {
                    "name": "tether",
                    "version": env!("CARGO_PKG_VERSION")
                },
                "rootUri": root_uri,
                "capabilities": {
                    "textDocument": {
                        "synchronization": {
                            "willSave": true,
                            "didSave": true
                        }
                    },
                    "workspace": {
                        "workspaceFolders": true
                    }
                },
                "workspaceFolders": workspace_folders
            }
        });
        self.send_message(&initialize)?;

        let initialized = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "initialized",
            "params": {}
        });
        self.send_message(&initialized)
    }

    /// 发送单条消息。
    fn send_message(&mut self, value: &Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("语言服务器 stdin 不可用（{}）", self.key.label()))?;
        protocol::send_message(stdin, value)
    }

    /// 在握手完成前缓存消息，握手后按原顺序回放。
    pub fn send_or_queue_message(&mut self, value: &Value) -> Result<()> {
        if self.state == ClientState::Running {
            return self.send_message(value);
        }

        self.pending_messages.push(value.clone());
        Ok(())
    }

    fn flush_pending_messages(&mut self) -> Result<()> {
        if self.pending_messages.is_empty() {
            return Ok(());
        }

        let pending_messages = std::mem::take(&mut self.pending_messages);
        for message in pending_messages {
            self.send_message(&message)?;
        }

        Ok(())
    }

    /// 分配请求 id。
    fn next_request_id(&mut self) -> u64 {
        let request_id = self.request_id;
        self.request_id = self.request_id.saturating_add(1);
        request_id
    }

    /// 刷新读取线程消息，映射为生命周期事件。
    fn pump(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();

        loop {
            match self.reader_rx.try_recv() {
                Ok(ReaderMessage::Message(message)) => {
                    if let Some(event) = self.handle_message(message) {
                        events.push(event);
                    }
                }
                Ok(ReaderMessage::StreamClosed(reason)) => {
                    events.push(self.mark_terminated(reason));
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    events.push(self.mark_terminated(None));
                    break;
                }
            }
        }

        events
    }

    /// 处理一条带 id 的响应；当前只关心 initialize。
    fn handle_message(&mut self, message: Value) -> Option<ClientEvent> {
        let request_id = protocol::response_request_id(&message)?;
        if self.initialize_request_id != Some(request_id) {
            return None;
        }
        self.initialize_request_id = None;

        if let Err(error) = protocol::validate_initialize_response(&message) {
            return Some(ClientEvent::StartFailed {
                key: self.key.clone(),
                error: error.to_string(),
            });
        }

        self.state = ClientState::Running;
        if let Err(error) = self.flush_pending_messages() {
            return Some(ClientEvent::StartFailed {
                key: self.key.clone(),
                error: format!("初始化后发送队列失败: {error}"),
            });
        }

        Some(ClientEvent::Ready {
            key: self.key.clone(),
        })
    }

    fn mark_terminated(&mut self, reason: Option<String>) -> ClientEvent {
        let was_starting = self.state == ClientState::Starting;
        self.state = ClientState::Stopped;
        self.stdin = None;

        if was_starting {
            ClientEvent::StartFailed {
                key: self.key.clone(),
                error: reason.unwrap_or_else(|| "输出流在握手完成前关闭".to_string()),
            }
        } else {
            ClientEvent::Exited {
                key: self.key.clone(),
            }
        }
    }

    /// 发起异步停止，立即返回完成凭据。
    ///
    /// 停止流程放在阻塞任务池执行，调用线程不等待进程退出；
    /// 句柄在此被消费，注册表在调用前已摘除对应条目。
    /// 先走协议退场（shutdown 请求 + exit 通知，随后关闭 stdin），
    /// 给进程一个自然退出窗口，超时仍存活才强杀兜底。
    pub fn stop(mut self) -> StopCompletion {
        self.state = ClientState::Stopping;
        let key = self.key.clone();
        let shutdown_request_id = self.next_request_id();
        let child = self.child.take();
        let stdin = self.stdin.take();

        let task = tokio::task::spawn_blocking(move || {
            let Some(mut child) = child else {
                return Ok(());
            };

            // 协议退场是尽力而为：对方可能早已退出或从未完成握手。
            if let Some(mut stdin) = stdin {
                let shutdown = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": shutdown_request_id,
                    "method": "shutdown",
                    "params": null
                });
                let exit = serde_json::json!({
                    "jsonrpc": "2.0",
                    "method": "exit",
                    "params": null
                });
                let _ = protocol::send_message(&mut stdin, &shutdown);
                let _ = protocol::send_message(&mut stdin, &exit);
            }

            let deadline = Instant::now() + Duration::from_secs(2);
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => return Ok(()),
                    Ok(None) => {
                        if Instant::now() >= deadline {
                            break;
                        }
                        thread::sleep(Duration::from_millis(50));
                    }
                    Err(error) => {
                        return Err(format!("等待语言服务器退出失败: {error}"));
                    }
                }
            }

            child
                .kill()
                .map_err(|error| format!("终止语言服务器失败: {error}"))?;
            child
                .wait()
                .map(|_| ())
                .map_err(|error| format!("等待语言服务器退出失败: {error}"))
        });

        StopCompletion::from_task(key, task)
    }
}

/// 启动读取线程，负责协议解包与基础分类。
fn spawn_reader_thread(stdout: std::process::ChildStdout, reader_tx: Sender<ReaderMessage>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);

        loop {
            match protocol::read_next_message(&mut reader) {
                Ok(Some(Value::Null)) => continue,
                Ok(Some(message)) => {
                    if protocol::response_request_id(&message).is_some()
                        && reader_tx.send(ReaderMessage::Message(message)).is_err()
                    {
                        return;
                    }
                }
                Ok(None) => {
                    let _ = reader_tx.send(ReaderMessage::StreamClosed(None));
                    return;
                }
                Err(error) => {
                    let _ = reader_tx.send(ReaderMessage::StreamClosed(Some(format!(
                        "输出读取失败: {error}"
                    ))));
                    return;
                }
            }
        }
    });
}

/// 绑定键 -> 客户端句柄的进程级注册表。
///
/// 所有变更都经由注册表方法串行完成：`ensure` 的“检查-创建-注册”是
/// 一个不含挂起点的同步步骤，这是并发文档打开事件下不产生重复句柄的
/// 关键保证；进程启动与握手在注册之后异步推进，不阻塞其他键的路由。
pub struct ClientRegistry {
    launcher: LauncherSpec,
    clients: HashMap<ClientKey, ClientHandle>,
    workspace_root: PathBuf,
    status_message: String,
}

impl ClientRegistry {
    pub fn new(launcher: LauncherSpec) -> Self {
        Self {
            launcher,
            clients: HashMap::new(),
            workspace_root: observability::workspace_root_best_effort(),
            status_message: "尚未启动任何客户端".to_string(),
        }
    }

    /// 状态栏展示文本。
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn contains(&self, key: &ClientKey) -> bool {
        self.clients.contains_key(key)
    }

    pub fn get(&self, key: &ClientKey) -> Option<&ClientHandle> {
        self.clients.get(key)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// 幂等获取或创建绑定键对应的客户端。
    ///
    /// 已存在则直接复用；不存在则同步创建并注册后返回。启动失败时
    /// 键保持未注册状态，后续 `ensure` 可以重试；失败只影响该键。
    pub fn ensure(
        &mut self,
        key: ClientKey,
        selector: Vec<DocumentFilter>,
        folder: Option<&WorkspaceFolder>,
    ) -> Result<&mut ClientHandle> {
        if self.clients.contains_key(&key) {
            return self
                .clients
                .get_mut(&key)
                .ok_or_else(|| anyhow!("刚确认存在的绑定键丢失: {}", key.label()));
        }

        observability::log_event_best_effort(
            &self.workspace_root,
            HostEvent::ClientStarting {
                ts: ts(),
                key: key.label(),
            },
        );

        let handle = match ClientHandle::spawn(key.clone(), selector, &self.launcher, folder) {
            Ok(handle) => handle,
            Err(error) => {
                self.status_message = format!("客户端启动失败（{}）: {error:#}", key.label());
                observability::log_event_best_effort(
                    &self.workspace_root,
                    HostEvent::ClientStartFailed {
                        ts: ts(),
                        key: key.label(),
                        error: format!("{error:#}"),
                    },
                );
                return Err(error);
            }
        };

        self.clients.insert(key.clone(), handle);
        self.status_message = format!("客户端已启动（{}）", key.label());
        self.clients
            .get_mut(&key)
            .ok_or_else(|| anyhow!("刚注册的绑定键丢失: {}", key.label()))
    }

    /// 摘除绑定键并发起异步停止。
    ///
    /// 条目被立即移除：teardown 期间对同一键的 `ensure` 会创建全新
    /// 句柄，而不会复用正在退出的旧句柄。
    pub fn remove(&mut self, key: &ClientKey) -> Option<StopCompletion> {
        let handle = self.clients.remove(key)?;
        Some(handle.stop())
    }

    /// 轮询所有句柄的生命周期事件。
    ///
    /// 启动失败与进程退出的键在这里释放；失败句柄残留的进程会被
    /// 异步回收。需要在 tokio 运行时上下文中调用。
    pub fn pump_events(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        for handle in self.clients.values_mut() {
            events.extend(handle.pump());
        }

        for event in &events {
            match event {
                ClientEvent::Ready { key } => {
                    self.status_message = format!("客户端已就绪（{}）", key.label());
                    observability::log_event_best_effort(
                        &self.workspace_root,
                        HostEvent::ClientReady {
                            ts: ts(),
                            key: key.label(),
                        },
                    );
                }
                ClientEvent::StartFailed { key, error } => {
                    self.status_message = format!("客户端启动失败（{}）: {error}", key.label());
                    observability::log_event_best_effort(
                        &self.workspace_root,
                        HostEvent::ClientStartFailed {
                            ts: ts(),
                            key: key.label(),
                            error: error.clone(),
                        },
                    );
                    if let Some(handle) = self.clients.remove(key) {
                        let completion = handle.stop();
                        tokio::spawn(async move {
                            let _ = completion.wait().await;
                        });
                    }
                }
                ClientEvent::Exited { key } => {
                    self.clients.remove(key);
                    observability::log_event_best_effort(
                        &self.workspace_root,
                        HostEvent::ClientStopped {
                            ts: ts(),
                            key: key.label(),
                            ok: true,
                        },
                    );
                }
            }
        }

        events
    }

    /// 停止全部客户端并等待每个停止尝试结束。
    ///
    /// 仅在扩展停用时调用：先并发发起所有停止，再逐个等待；
    /// 单个失败只记录，不会提前返回，也不会中断其余停止。
    pub async fn drain_all(&mut self) -> Vec<(ClientKey, Result<(), String>)> {
        let completions: Vec<StopCompletion> = self
            .clients
            .drain()
            .map(|(_, handle)| handle.stop())
            .collect();

        let results = wait_all(completions).await;
        for (key, result) in &results {
            match result {
                Ok(()) => observability::log_event_best_effort(
                    &self.workspace_root,
                    HostEvent::ClientStopped {
                        ts: ts(),
                        key: key.label(),
                        ok: true,
                    },
                ),
                Err(error) => observability::log_event_best_effort(
                    &self.workspace_root,
                    HostEvent::ClientStopFailed {
                        ts: ts(),
                        key: key.label(),
                        error: error.clone(),
                    },
                ),
            }
        }

        self.status_message = "全部客户端已停止".to_string();
        results
    }
}
