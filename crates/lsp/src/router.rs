use std::path::{Path, PathBuf};

use anyhow::Result;

use host_core::{
    observability::{self, HostEvent, ts},
    workspace::{FolderSet, WorkspaceFolder},
};

use crate::{
    client::{ClientKey, ClientRegistry, StopCompletion},
    selector::{is_supported_language, selector_for_folder, selector_for_untitled},
};

/// 宿主上报的一次文档打开事件。
///
/// `path` 为 `None` 表示未落盘缓冲区（untitled）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: Option<PathBuf>,
    pub language_id: String,
}

impl Document {
    pub fn untitled(language_id: impl Into<String>) -> Self {
        Self {
            path: None,
            language_id: language_id.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>, language_id: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            language_id: language_id.into(),
        }
    }
}

/// 文档打开与文件夹增删事件到客户端注册表的路由。
///
/// 客户端始终惰性创建：文件夹被打开本身不启动任何进程，
/// 只有第一个受支持语言的文档打开才会触发 `ensure`。
/// 文档打开后不做迟到重路由：即使归属文件夹随后关闭，
/// 已打开文档仍由原客户端服务直至该客户端被回收。
pub struct DocumentRouter {
    folders: FolderSet,
    registry: ClientRegistry,
    workspace_root: PathBuf,
}

impl DocumentRouter {
    pub fn new(folders: FolderSet, registry: ClientRegistry) -> Self {
        Self {
            folders,
            registry,
            workspace_root: observability::workspace_root_best_effort(),
        }
    }

    pub fn folders(&self) -> &FolderSet {
        &self.folders
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ClientRegistry {
        &mut self.registry
    }

    /// 路由一次文档打开事件。
    ///
    /// 顺序判定：
    /// 1. 语言不受支持 -> 忽略；
    /// 2. 未落盘缓冲区 -> 确保 default 哨兵客户端存在；
    /// 3. 有路径的文档 -> 解析最外层归属文件夹，确保其客户端存在；
    ///    位置不在任何打开文件夹内时忽略，不兜底到 default。
    pub fn on_document_opened(&mut self, document: &Document) -> Result<()> {
        if !is_supported_language(&document.language_id) {
            return Ok(());
        }

        let Some(path) = &document.path else {
            self.registry
                .ensure(ClientKey::Default, selector_for_untitled(), None)?;
            return Ok(());
        };

        let Some(folder) = self.folders.resolve_owner(path) else {
            return Ok(());
        };
        let folder = folder.clone();
        self.registry.ensure(
            ClientKey::for_folder(&folder),
            selector_for_folder(&folder),
            Some(&folder),
        )?;
        Ok(())
    }

    /// 记录新打开的文件夹，不启动任何客户端。
    pub fn on_folder_added(&mut self, folder: WorkspaceFolder) {
        self.folders.add(folder);
    }

    /// 处理文件夹移除：同步释放绑定键并发起异步停止。
    ///
    /// 该文件夹此前没有客户端（从未打开过文档）时返回 `None`；
    /// 停止失败由凭据等待方记录，不阻塞移除本身。
    pub fn on_folder_removed(&mut self, root: &Path) -> Option<StopCompletion> {
        self.folders.remove_by_root(root);
        observability::log_event_best_effort(
            &self.workspace_root,
            HostEvent::FolderRemoved {
                ts: ts(),
                root: root.display().to_string(),
            },
        );
        self.registry.remove(&ClientKey::Folder(root.to_path_buf()))
    }

    /// 停用路径：停止全部客户端并等待每个停止尝试结束。
    pub async fn shutdown(&mut self) -> Vec<(ClientKey, Result<(), String>)> {
        self.registry.drain_all().await
    }
}
