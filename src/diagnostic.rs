//! 连通性自检：通过某个通道查找 hosts 文件并核对大小

use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::HOSTS_PATH;
use crate::error::SearchError;
use crate::searcher::SearchAdapter;
use crate::types::{normalize_path, QueryConfig, SearchRecord};

/// 逐步放宽的查询
const CHECK_QUERIES: [&str; 3] = [
    HOSTS_PATH,
    r#"path:"\windows\system32\drivers\etc" hosts"#,
    "windows system32 drivers etc hosts",
];

const HOSTS_TAIL: &str = r"\windows\system32\drivers\etc\hosts";

const CHECK_COUNT: u32 = 50;

/// 自检结果（非致命）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    Passed { size: u64 },
    /// 索引里的大小为 0，但文件系统上的文件不为空
    Warning { path: String, actual: u64 },
}

impl Diagnosis {
    pub fn message(&self) -> String {
        match self {
            Self::Passed { size } => format!("自检通过，hosts 大小 {size} 字节"),
            Self::Warning { path, actual } => {
                format!("{path} 在索引中的大小为 0，实际大小 {actual} 字节")
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Passed { size } => json!({ "passed": true, "size": size }),
            Self::Warning { .. } => json!({ "warning": self.message() }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticError {
    #[error("未能通过 Everything 找到 {}", HOSTS_PATH)]
    NotFound,

    #[error("{path} 在索引和文件系统中的大小都为 0")]
    ZeroSize { path: String },

    #[error(transparent)]
    Search(#[from] SearchError),
}

/// 读取文件系统上的文件大小
pub trait FileSizeSource {
    fn file_size(&self, path: &Path) -> Option<u64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsSizeSource;

impl FileSizeSource for FsSizeSource {
    fn file_size(&self, path: &Path) -> Option<u64> {
        std::fs::metadata(path).ok().map(|m| m.len())
    }
}

/// 运行自检
pub fn diagnose(
    adapter: &mut dyn SearchAdapter,
    sizes: &dyn FileSizeSource,
) -> Result<Diagnosis, DiagnosticError> {
    let mut hits = Vec::new();
    for query in CHECK_QUERIES {
        let config = QueryConfig::new(query).with_page(0, CHECK_COUNT);
        hits = adapter.search(&config)?;
        debug!(adapter = adapter.name(), query, count = hits.len(), "自检查询");
        if !hits.is_empty() {
            break;
        }
    }

    let record = find_hosts(&hits).ok_or(DiagnosticError::NotFound)?;
    if record.size > 0 {
        return Ok(Diagnosis::Passed { size: record.size });
    }

    let actual = sizes.file_size(Path::new(&record.path)).unwrap_or(0);
    if actual > 1 {
        warn!(path = %record.path, actual, "索引中的大小为 0");
        return Ok(Diagnosis::Warning {
            path: record.path.clone(),
            actual,
        });
    }
    Err(DiagnosticError::ZeroSize {
        path: record.path.clone(),
    })
}

/// 完全匹配优先，其次按路径尾部匹配；未知条目不参与
fn find_hosts(hits: &[SearchRecord]) -> Option<&SearchRecord> {
    let target = normalize_path(HOSTS_PATH);
    let known = || hits.iter().filter(|r| !r.is_unknown());
    known()
        .find(|r| normalize_path(&r.path) == target)
        .or_else(|| known().find(|r| normalize_path(&r.path).ends_with(HOSTS_TAIL)))
}
