use std::path::{Path, PathBuf};

/// 宿主环境开放的一个工作区文件夹。
///
/// 根路径与显示名称均由宿主提供，在该文件夹保持打开期间不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub root: PathBuf,
    pub name: String,
}

impl WorkspaceFolder {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }
}

/// 当前打开的全部工作区文件夹快照。
///
/// 文件夹之间除“嵌套”外互不重叠，这是宿主环境保证的前提；
/// 归属解析只依赖该快照，本身不持有任何可变状态。
#[derive(Debug, Clone, Default)]
pub struct FolderSet {
    folders: Vec<WorkspaceFolder>,
}

impl FolderSet {
    pub fn new(folders: Vec<WorkspaceFolder>) -> Self {
        Self { folders }
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkspaceFolder> {
        self.folders.iter()
    }

    /// 解析某个文件位置归属的工作区文件夹。
    ///
    /// 算法分两步：
    /// 1. 在打开集合中找到包含该位置的文件夹（嵌套时取根路径最深的一个，
    ///    与宿主“最具体匹配”的行为保持一致）；
    /// 2. 再从打开集合中筛出“根路径是它前缀”的所有文件夹，返回根路径最短者。
    ///
    /// 这样对嵌套打开的 `{A, A/B, A/B/C}`，无论文档位于哪一层，
    /// 归属都会落到最外层的 `A`，保证一棵嵌套树只会对应一个客户端。
    ///
    /// 路径包含判断使用 `Path::starts_with`（按组件比较），
    /// 避免字符串前缀比较把 `/foo` 误判为 `/foobar` 的前缀。
    pub fn resolve_owner(&self, location: &Path) -> Option<&WorkspaceFolder> {
        let containing = self
            .folders
            .iter()
            .filter(|folder| location.starts_with(&folder.root))
            .max_by_key(|folder| folder.root.as_os_str().len())?;

        // 嵌套文件夹互不重叠，因此不存在两个等长根路径同时包含目标的情况，
        // 按长度取最小即可确定唯一的最外层祖先。
        let outermost = self
            .folders
            .iter()
            .filter(|folder| containing.root.starts_with(&folder.root))
            .min_by_key(|folder| folder.root.as_os_str().len());

        outermost.or(Some(containing))
    }

    /// 按根路径查找文件夹。
    pub fn find_by_root(&self, root: &Path) -> Option<&WorkspaceFolder> {
        self.folders.iter().find(|folder| folder.root == root)
    }

    /// 记录新打开的文件夹；根路径已存在时忽略。
    pub fn add(&mut self, folder: WorkspaceFolder) {
        if self.find_by_root(&folder.root).is_none() {
            self.folders.push(folder);
        }
    }

    /// 按根路径移除文件夹，返回被移除的条目。
    pub fn remove_by_root(&mut self, root: &Path) -> Option<WorkspaceFolder> {
        let index = self.folders.iter().position(|folder| folder.root == root)?;
        Some(self.folders.remove(index))
    }
}
