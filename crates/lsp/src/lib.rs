//! 语言服务器客户端生命周期管理。
//!
//! 目录拆分说明：
//! - `selector`：语言识别、文档选择器与启动脚本解析；
//! - `protocol`：LSP JSON-RPC 报文编解码工具；
//! - `client`：绑定键 -> 客户端句柄的注册表与生命周期实现；
//! - `router`：文档打开/文件夹移除事件到注册表的路由；
//! - `adapter`：调试适配器工作目录注入。

mod adapter;
mod client;
mod protocol;
mod router;
mod selector;

pub use adapter::{ExecutableDescriptor, inject_working_directory};
pub use client::{
    ClientEvent, ClientHandle, ClientKey, ClientRegistry, ClientState, StopCompletion,
};
pub use router::{Document, DocumentRouter};
pub use selector::{
    DocumentFilter, FILE_EXTENSIONS, LANGUAGES, LauncherSpec, file_glob_pattern,
    is_supported_language, launcher_script_name, resolve_launcher, selector_for_folder,
    selector_for_untitled,
};
