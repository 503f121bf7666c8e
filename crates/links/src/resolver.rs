use std::path::{Path, PathBuf};

use anyhow::Result;

use host_core::{
    observability::{self, HostEvent, ts},
    workspace::FolderSet,
};

use crate::matcher::LinkMatch;

/// 多候选时的用户选择接口，返回被选中候选的下标。
pub trait CandidatePicker {
    /// `None` 表示用户放弃选择。
    fn pick(&mut self, candidates: &[PathBuf]) -> Option<usize>;
}

/// 编辑器跳转接口。`line`/`column` 为零基。
pub trait Navigator {
    fn navigate(&mut self, path: &Path, line: u64, column: u64) -> Result<()>;
}

/// 一次链接激活的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkActivation {
    /// 没有任何候选文件存在，静默结束。
    NoTarget,
    /// 已跳转到唯一候选或用户选中的候选。
    Navigated(PathBuf),
    /// 存在多个候选但用户放弃了选择。
    Cancelled,
}

/// 链接对应的三个相对候选：普通项目、伞形项目与依赖。
pub fn candidate_relative_paths(link: &LinkMatch) -> [PathBuf; 3] {
    let file = Path::new(&link.file);
    [
        file.to_path_buf(),
        Path::new("apps").join(&link.app).join(file),
        Path::new("deps").join(&link.app).join(file),
    ]
}

/// 在全部打开文件夹下探测候选，返回实际存在的绝对路径。
///
/// 每次激活都重新探测文件系统，不缓存结果：终端输出往往先于
/// 文件生成（或文件随后被删除），缓存会给出过期答案。
pub fn existing_candidates(folders: &FolderSet, link: &LinkMatch) -> Vec<PathBuf> {
    let relative = candidate_relative_paths(link);
    let mut found = Vec::new();

    for folder in folders.iter() {
        for candidate in &relative {
            let path = folder.root.join(candidate);
            if path.is_file() && !found.contains(&path) {
                found.push(path);
            }
        }
    }

    found
}

/// 激活一条已识别的链接。
///
/// 零候选静默结束；唯一候选直接跳转到对应行首（终端行号是一基，
/// 编辑器是零基）；多候选交给选择器，放弃选择返回 `Cancelled`。
pub fn activate_link(
    folders: &FolderSet,
    link: &LinkMatch,
    picker: &mut dyn CandidatePicker,
    navigator: &mut dyn Navigator,
) -> Result<LinkActivation> {
    let candidates = existing_candidates(folders, link);

    let target = match candidates.len() {
        0 => return Ok(LinkActivation::NoTarget),
        1 => candidates[0].clone(),
        _ => {
            let Some(index) = picker.pick(&candidates) else {
                return Ok(LinkActivation::Cancelled);
            };
            let Some(chosen) = candidates.get(index) else {
                return Ok(LinkActivation::Cancelled);
            };
            chosen.clone()
        }
    };

    navigator.navigate(&target, link.line.saturating_sub(1), 0)?;
    observability::log_event_best_effort(
        &observability::workspace_root_best_effort(),
        HostEvent::LinkNavigated {
            ts: ts(),
            file: target.display().to_string(),
            line: link.line,
        },
    );
    Ok(LinkActivation::Navigated(target))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    use anyhow::Result;

    use host_core::workspace::{FolderSet, WorkspaceFolder};

    use super::{CandidatePicker, LinkActivation, Navigator, activate_link, existing_candidates};
    use crate::matcher::match_line;

    struct RecordingNavigator {
        calls: Vec<(PathBuf, u64, u64)>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&mut self, path: &Path, line: u64, column: u64) -> Result<()> {
            self.calls.push((path.to_path_buf(), line, column));
            Ok(())
        }
    }

    /// 固定返回某个下标（或放弃）的选择器。
    struct ScriptedPicker {
        choice: Option<usize>,
        seen: Vec<Vec<PathBuf>>,
    }

    impl CandidatePicker for ScriptedPicker {
        fn pick(&mut self, candidates: &[PathBuf]) -> Option<usize> {
            self.seen.push(candidates.to_vec());
            self.choice
        }
    }

    fn navigator() -> RecordingNavigator {
        RecordingNavigator { calls: Vec::new() }
    }

    fn picker(choice: Option<usize>) -> ScriptedPicker {
        ScriptedPicker {
            choice,
            seen: Vec::new(),
        }
    }

    fn temp_workspace(label: &str) -> (FolderSet, PathBuf) {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("tether-links-{label}-{nonce}"));
        std::fs::create_dir_all(&root).expect("workspace root should be creatable");
        let set = FolderSet::new(vec![WorkspaceFolder::new(&root, label)]);
        (set, root)
    }

    fn write_source(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        let parent = path.parent().expect("source file should have a parent dir");
        std::fs::create_dir_all(parent).expect("source dir should be creatable");
        std::fs::write(&path, "defmodule X do\nend\n").expect("source file should be written");
        path
    }

    #[test]
    fn missing_candidates_should_end_quietly() {
        let (folders, root) = temp_workspace("empty");
        let link = match_line("(my_app 1.2.3) lib/my_app/server.ex:42")
            .expect("link line should match");

        let outcome = activate_link(&folders, &link, &mut picker(None), &mut navigator())
            .expect("activation should not error");
        assert_eq!(outcome, LinkActivation::NoTarget);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn umbrella_only_candidate_should_navigate_directly() {
        let (folders, root) = temp_workspace("umbrella");
        // 只有伞形布局下的 apps/<app>/<file> 存在。
        let expected = write_source(&root, "apps/my_app/lib/my_app/server.ex");
        let link = match_line("(my_app 1.2.3) lib/my_app/server.ex:42")
            .expect("link line should match");

        let mut picker = picker(None);
        let mut navigator = navigator();
        let outcome = activate_link(&folders, &link, &mut picker, &mut navigator)
            .expect("activation should not error");

        assert_eq!(outcome, LinkActivation::Navigated(expected.clone()));
        // 唯一候选不经过选择器，跳转到零基行首。
        assert!(picker.seen.is_empty());
        assert_eq!(navigator.calls, vec![(expected, 41, 0)]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn multiple_candidates_should_go_through_the_picker() {
        let (folders, root) = temp_workspace("multi");
        write_source(&root, "lib/my_app/server.ex");
        let dependency_copy = write_source(&root, "deps/my_app/lib/my_app/server.ex");
        let link = match_line("(my_app 1.2.3) lib/my_app/server.ex:7")
            .expect("link line should match");

        let mut picker = picker(Some(1));
        let mut navigator = navigator();
        let outcome = activate_link(&folders, &link, &mut picker, &mut navigator)
            .expect("activation should not error");

        assert_eq!(outcome, LinkActivation::Navigated(dependency_copy.clone()));
        assert_eq!(picker.seen.len(), 1);
        assert_eq!(picker.seen[0].len(), 2);
        assert_eq!(navigator.calls, vec![(dependency_copy, 6, 0)]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn dismissing_the_picker_should_cancel_without_navigation() {
        let (folders, root) = temp_workspace("cancel");
        write_source(&root, "lib/my_app/server.ex");
        write_source(&root, "apps/my_app/lib/my_app/server.ex");
        let link = match_line("(my_app 1.2.3) lib/my_app/server.ex:7")
            .expect("link line should match");

        let mut navigator = navigator();
        let outcome = activate_link(&folders, &link, &mut picker(None), &mut navigator)
            .expect("activation should not error");

        assert_eq!(outcome, LinkActivation::Cancelled);
        assert!(navigator.calls.is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn candidates_should_be_probed_fresh_on_every_activation() {
        let (folders, root) = temp_workspace("reprobe");
        let path = write_source(&root, "lib/my_app/server.ex");
        let link = match_line("(my_app 1.2.3) lib/my_app/server.ex:3")
            .expect("link line should match");

        assert_eq!(existing_candidates(&folders, &link), vec![path.clone()]);

        // 文件删除后重新探测必须反映最新状态，不能命中任何缓存。
        std::fs::remove_file(&path).expect("source file should be removable");
        assert!(existing_candidates(&folders, &link).is_empty());

        let outcome = activate_link(&folders, &link, &mut picker(None), &mut navigator())
            .expect("activation should not error");
        assert_eq!(outcome, LinkActivation::NoTarget);

        let _ = std::fs::remove_dir_all(&root);
    }
}
