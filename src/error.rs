use std::path::PathBuf;

/// 搜索通道错误
///
/// 配置类错误在发起任何查询前就会返回；查询类错误只影响当前这一次调用。
/// 字段级的失败不会出现在这里，它们在构造结果时就被吸收了。
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("无法加载 Everything SDK，已检查: {}", checked.join(", "))]
    LibraryNotFound { checked: Vec<String> },

    #[error("Everything SDK 缺少入口函数 {0}")]
    MissingEntryPoint(&'static str),

    #[error("未找到 es.exe，已检查: {}", display_paths(checked))]
    ExecutableNotFound { checked: Vec<PathBuf> },

    #[error("环境变量 {name} 中的端口无效: {value:?}")]
    InvalidPort { name: &'static str, value: String },

    #[error("当前平台不支持 {0}")]
    UnsupportedPlatform(&'static str),

    #[error("搜索关键词为空")]
    EmptyPattern,

    #[error("Everything 查询失败 ({})", crate::sdk::error_name(*code))]
    QueryFailed { code: u32 },

    #[error("es.exe 退出码 {code:?}: {stderr}")]
    ProcessFailed { code: Option<i32>, stderr: String },

    #[error("执行 es.exe 失败: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP 服务器返回 {status}")]
    HttpStatus { status: u16 },

    #[error("响应格式错误: {0}")]
    MalformedResponse(String),
}

impl SearchError {
    /// 是否属于配置错误（找不到 SDK / es.exe、环境变量非法等）
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::LibraryNotFound { .. }
                | Self::MissingEntryPoint(_)
                | Self::ExecutableNotFound { .. }
                | Self::InvalidPort { .. }
                | Self::UnsupportedPlatform(_)
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, SearchError>;
