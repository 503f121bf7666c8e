use std::{
    io::{BufRead, BufReader, Read, Write},
    path::Path,
    process::ChildStdin,
};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

/// 从 LSP 输出流读取下一条 JSON-RPC 消息。
///
/// 返回 `Ok(None)` 表示流结束，调用方应将其视为语言服务器退出。
pub fn read_next_message(reader: &mut BufReader<impl Read>) -> Result<Option<Value>> {
    let mut content_length: usize = 0;
    let mut header_line = String::new();

    loop {
        header_line.clear();
        let read_size = reader
            .read_line(&mut header_line)
            .context("读取 LSP 消息头失败")?;
        if read_size == 0 {
            return Ok(None);
        }

        let trimmed = header_line.trim();
        if trimmed.is_empty() {
            break;
        }

        let lower = trimmed.to_ascii_lowercase();
        if let Some(length_text) = lower.strip_prefix("content-length:") {
            content_length = length_text.trim().parse::<usize>().unwrap_or(0);
        }
    }

    if content_length == 0 {
        // 某些服务端实现会发送不带 `Content-Length` 的杂项输出，
        // 这里返回空 JSON 作为“可忽略消息”，避免被误判为进程退出。
        return Ok(Some(Value::Null));
    }

    let mut payload = vec![0u8; content_length];
    reader
        .read_exact(&mut payload)
        .context("读取 LSP 消息体失败")?;
    let json_value = serde_json::from_slice::<Value>(&payload).context("解析 LSP JSON 失败")?;
    Ok(Some(json_value))
}

/// 将 JSON-RPC 消息写入 LSP 输入流。
pub fn send_message(stdin: &mut ChildStdin, value: &Value) -> Result<()> {
    let payload = serde_json::to_vec(value).context("序列化 LSP 消息失败")?;
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());

    stdin
        .write_all(header.as_bytes())
        .context("写入 LSP 消息头失败")?;
    stdin.write_all(&payload).context("写入 LSP 消息体失败")?;
    stdin.flush().context("刷新 LSP 输出流失败")
}

/// 校验并抽取响应消息中的请求 id。
pub fn response_request_id(value: &Value) -> Option<u64> {
    value.get("id").and_then(Value::as_u64)
}

/// 校验 `initialize` 响应的能力声明。
///
/// 协议握手只要求服务端返回 `result.capabilities` 对象；
/// 缺失或类型不符说明服务端不兼容，应判定为启动失败而不是带病运行。
pub fn validate_initialize_response(value: &Value) -> Result<()> {
    if let Some(error) = value.get("error") {
        return Err(anyhow!("initialize 被服务端拒绝: {error}"));
    }

    let capabilities = value
        .get("result")
        .and_then(Value::as_object)
        .and_then(|result| result.get("capabilities"));
    match capabilities {
        Some(Value::Object(_)) => Ok(()),
        Some(other) => Err(anyhow!("initialize 能力声明类型异常: {other}")),
        None => Err(anyhow!("initialize 响应缺少 capabilities")),
    }
}

/// 将本地路径转换为 `file://` URI。
pub fn path_to_file_uri(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("获取当前目录失败")?
            .join(path)
    };

    let mut display = absolute.to_string_lossy().replace('\\', "/");

    // 移除 Windows 扩展长度路径前缀
    if display.starts_with("//?/") {
        display = display[4..].to_string();
    }

    if display.chars().nth(1) == Some(':') {
        Ok(format!("file:///{}", display))
    } else {
        Ok(format!("file://{}", display))
    }
}
