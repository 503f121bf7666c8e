use std::{collections::BTreeMap, path::PathBuf};

use host_core::workspace::WorkspaceFolder;

/// 调试适配器的可执行描述：命令、参数与可选的启动环境。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableDescriptor {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl ExecutableDescriptor {
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            cwd: None,
            env: BTreeMap::new(),
        }
    }
}

/// 为调试会话注入工作目录。
///
/// 会话归属某个文件夹时，以该文件夹根目录作为适配器进程的工作目录，
/// 使 asdf 一类版本管理器能按目录加载正确的运行时环境；
/// 命令、参数与已有环境变量原样保留。无文件夹的会话不做任何改写。
pub fn inject_working_directory(
    descriptor: ExecutableDescriptor,
    folder: Option<&WorkspaceFolder>,
) -> ExecutableDescriptor {
    match folder {
        Some(folder) => ExecutableDescriptor {
            cwd: Some(folder.root.clone()),
            ..descriptor
        },
        None => descriptor,
    }
}
