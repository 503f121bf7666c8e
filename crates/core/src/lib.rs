//! 宿主侧基础能力。
//!
//! 目录拆分说明：
//! - `workspace`：工作区文件夹模型与“最外层归属”解析；
//! - `observability`：结构化 JSON Line 事件日志；
//! - `encoding`：日志写入前的编码完整性检查；
//! - `env_check`：激活期环境自检与冲突扩展提示；
//! - `commands`：命令层文本构造（测试过滤器 / 调试信息包）；
//! - `config`：宿主可选配置（`.tether/config.toml`）。

pub mod commands;
pub mod config;
pub mod encoding;
pub mod env_check;
pub mod observability;
pub mod workspace;
