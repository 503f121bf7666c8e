//! 终端编译器/测试输出中 `file.ex:line` 链接的识别与跳转。
//!
//! - `matcher`：单行文本上的链接识别与可点击区间计算；
//! - `resolver`：候选路径探测、多候选选择与跳转编排。

mod matcher;
mod resolver;

pub use matcher::{LinkMatch, match_line};
pub use resolver::{
    CandidatePicker, LinkActivation, Navigator, activate_link, candidate_relative_paths,
    existing_candidates,
};
