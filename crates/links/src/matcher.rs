use std::sync::LazyLock;

use regex::Regex;

/// 匹配编译器/测试输出行中的 `(app x.y.z) path/to/file.ex:line` 片段。
///
/// 应用名前缀是必需的：裸露的 `file.ex:line`（没有来源应用标注）
/// 不构成链接，这能避免把任意冒号分隔的文本都变成可点击区域。
static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?P<app>[a-z_]+) \d+\.\d+\.\d+\) (?P<file>[a-z_/]*[a-z_]+\.ex):(?P<line>\d+)")
        .expect("link pattern should compile")
});

/// 一次成功的链接识别结果。
///
/// `start`/`length` 是行内字节区间，只覆盖 `file:line` 部分：
/// 应用名与版本号属于上下文，不应出现在可点击高亮里。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    pub app: String,
    pub file: String,
    pub line: u64,
    pub start: usize,
    pub length: usize,
}

/// 在一行终端输出上识别链接，每行最多返回第一个匹配。
pub fn match_line(line: &str) -> Option<LinkMatch> {
    let captures = LINE_PATTERN.captures(line)?;

    let whole = captures.get(0)?;
    let app = captures.name("app")?;
    let file = captures.name("file")?;
    let line_number = captures.name("line")?.as_str().parse::<u64>().ok()?;

    Some(LinkMatch {
        app: app.as_str().to_string(),
        file: file.as_str().to_string(),
        line: line_number,
        start: file.start(),
        length: whole.end() - file.start(),
    })
}
