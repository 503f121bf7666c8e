use std::{
    fs,
    io::{self, Write},
    path::Path,
};

/// 追加一行 UTF-8 JSON Line 日志。
///
/// 该函数显式禁止输入中包含原始换行符，防止破坏一行一条事件的解析约定。
pub fn append_utf8_json_line(path: &Path, line: &str) -> io::Result<()> {
    validate_text_for_utf8_write(path, line)?;
    if line.contains('\n') || line.contains('\r') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("JSON Line 内容包含换行符，无法安全写入: {}", path.display()),
        ));
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

/// 写入前的编码完整性检查。
fn validate_text_for_utf8_write(path: &Path, content: &str) -> io::Result<()> {
    // U+FFFD 通常来自“非法字节被容错替换”，继续写入会把乱码永久化。
    if content.contains('\u{FFFD}') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "待写入文本包含 U+FFFD（疑似编码已损坏），拒绝写入: {}",
                path.display()
            ),
        ));
    }

    // U+FEFF 作为字符内容出现时通常是误带 BOM，这里直接拦截避免污染文件头。
    if content.contains('\u{FEFF}') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "待写入文本包含 U+FEFF（BOM 字符），拒绝写入: {}",
                path.display()
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        path::PathBuf,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::append_utf8_json_line;

    fn temp_file_path() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        std::env::temp_dir()
            .join(format!("tether-encoding-test-{nonce}"))
            .join("events.log")
    }

    #[test]
    fn append_utf8_json_line_should_reject_multiline_payload() {
        let path = temp_file_path();
        std::fs::create_dir_all(path.parent().expect("path should have parent"))
            .expect("parent directory should be created");

        let error = append_utf8_json_line(&path, "{\"a\":1}\n{\"b\":2}")
            .expect_err("multiline json line should be rejected");
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn append_utf8_json_line_should_reject_replacement_char() {
        let path = temp_file_path();
        std::fs::create_dir_all(path.parent().expect("path should have parent"))
            .expect("parent directory should be created");

        let error = append_utf8_json_line(&path, "{\"a\":\"坏\u{FFFD}字\"}")
            .expect_err("replacement char should be rejected");
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn append_utf8_json_line_should_append_one_line_per_call() {
        let path = temp_file_path();
        std::fs::create_dir_all(path.parent().expect("path should have parent"))
            .expect("parent directory should be created");

        append_utf8_json_line(&path, "{\"a\":1}").expect("first line should be written");
        append_utf8_json_line(&path, "{\"b\":2}").expect("second line should be written");

        let text = std::fs::read_to_string(&path).expect("log file should be readable");
        assert_eq!(text, "{\"a\":1}\n{\"b\":2}\n");

        let _ = std::fs::remove_dir_all(path.parent().expect("path should have parent"));
    }
}
