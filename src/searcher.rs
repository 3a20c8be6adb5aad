use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HttpEndpoint;
use crate::error::{Result, SearchError};
use crate::es::EsSearcher;
use crate::http::HttpSearcher;
use crate::types::{QueryConfig, SearchRecord};

/// 搜索通道
///
/// 每次 `search` 对应一次原生查询、一个子进程或一个 HTTP 请求。
pub trait SearchAdapter {
    fn name(&self) -> &'static str;

    fn search(&mut self, config: &QueryConfig) -> Result<Vec<SearchRecord>>;
}

/// 可选的通道
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Everything SDK (Everything64.dll)
    Dll,
    /// es.exe 命令行
    #[default]
    Es,
    /// Everything 内置 HTTP 服务器
    Http,
}

/// 创建通道时的显式覆盖项
#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    pub dll_path: Option<PathBuf>,
    pub es_path: Option<PathBuf>,
    pub instance: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// 按通道创建适配器；配置错误在这里就会返回
pub fn open_adapter(method: Method, options: &AdapterOptions) -> Result<Box<dyn SearchAdapter>> {
    debug!(?method, "创建搜索通道");
    match method {
        Method::Dll => open_sdk(options),
        Method::Es => {
            let mut searcher = match &options.es_path {
                Some(path) => EsSearcher::with_path(path.clone()),
                None => EsSearcher::locate()?,
            };
            if let Some(instance) = &options.instance {
                searcher = searcher.with_instance(instance.clone());
            }
            Ok(Box::new(searcher))
        }
        Method::Http => {
            let endpoint = HttpEndpoint::resolve(options.host.as_deref(), options.port)?;
            Ok(Box::new(HttpSearcher::new(endpoint)?))
        }
    }
}

#[cfg(windows)]
fn open_sdk(options: &AdapterOptions) -> Result<Box<dyn SearchAdapter>> {
    let session = crate::dll::SdkSession::open(options.dll_path.as_deref())?;
    Ok(Box::new(session))
}

#[cfg(not(windows))]
fn open_sdk(_options: &AdapterOptions) -> Result<Box<dyn SearchAdapter>> {
    Err(SearchError::UnsupportedPlatform("Everything SDK"))
}

/// 关键词不能为空白
pub(crate) fn ensure_pattern(config: &QueryConfig) -> Result<()> {
    if config.pattern.trim().is_empty() {
        return Err(SearchError::EmptyPattern);
    }
    Ok(())
}

/// 按 `count` 截断结果
pub(crate) fn apply_limit(records: &mut Vec<SearchRecord>, config: &QueryConfig) {
    if let Some(limit) = config.limit() {
        records.truncate(limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_pattern_is_rejected() {
        assert!(matches!(
            ensure_pattern(&QueryConfig::new("   ")),
            Err(SearchError::EmptyPattern)
        ));
        assert!(ensure_pattern(&QueryConfig::new("hosts")).is_ok());
    }

    #[test]
    fn limit_truncates_only_when_positive() {
        let mut records: Vec<_> = (0..5).map(|i| SearchRecord::new(format!("{i}"), "", 0)).collect();
        apply_limit(&mut records, &QueryConfig::new("x").with_page(0, 0));
        assert_eq!(records.len(), 5);
        apply_limit(&mut records, &QueryConfig::new("x").with_page(0, 2));
        assert_eq!(records.len(), 2);
    }

    #[cfg(not(windows))]
    #[test]
    fn sdk_is_unavailable_off_windows() {
        let err = open_adapter(Method::Dll, &AdapterOptions::default()).err();
        assert!(matches!(err, Some(SearchError::UnsupportedPlatform(_))));
    }
}
