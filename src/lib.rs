//! Everything 搜索适配层
//!
//! 同一套 [`QueryConfig`] / [`SearchRecord`] 契约下的三条通道：
//! Everything SDK（`dll`）、es.exe 子进程（`es`）与内置 HTTP 服务器（`http`）。

pub mod cli;
pub mod config;
pub mod diagnostic;
pub mod dll;
pub mod error;
pub mod es;
pub mod http;
pub mod sdk;
pub mod searcher;
pub mod tabular;
pub mod timestamp;
pub mod types;

pub use error::{Result, SearchError};
pub use searcher::{open_adapter, AdapterOptions, Method, SearchAdapter};
pub use types::{QueryConfig, SearchRecord, SortKey, SortOrder};
