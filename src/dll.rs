//! Everything SDK 通道
//!
//! SDK 的查询状态是 DLL 全局的，所以会话是独占对象：`search` 需要 `&mut self`，
//! 不实现共享。一次 `search` 走完整个周期：配置 -> 查询 -> 读取 -> 重置。

use tracing::{debug, info};

use crate::config::BUFFER_CHARS;
use crate::error::{Result, SearchError};
use crate::sdk::{self, request, DateField, EverythingSdk, SdkVersion, StringField};
use crate::searcher::{apply_limit, ensure_pattern, SearchAdapter};
use crate::timestamp;
use crate::types::{file_name_of, ExtendedFields, QueryConfig, SearchRecord};

/// 会话所处的周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 入口表已绑定，没有挂起的查询
    Bound,
    Configured,
    Queried,
    Drained,
}

pub struct SdkSession<S: EverythingSdk> {
    sdk: S,
    state: SessionState,
}

#[cfg(windows)]
impl SdkSession<sdk::library::LoadedSdk> {
    /// 加载 Everything64.dll 并建立会话
    pub fn open(explicit: Option<&std::path::Path>) -> Result<Self> {
        let loaded = sdk::library::LoadedSdk::load(explicit)?;
        Ok(Self::new(loaded))
    }
}

impl<S: EverythingSdk> SdkSession<S> {
    pub fn new(sdk: S) -> Self {
        Self {
            sdk,
            state: SessionState::Bound,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    pub fn version(&self) -> SdkVersion {
        self.sdk.version()
    }

    pub fn is_db_loaded(&self) -> bool {
        self.sdk.is_db_loaded()
    }

    pub fn last_error(&self) -> u32 {
        self.sdk.last_error()
    }

    fn configure(&mut self, config: &QueryConfig) {
        let flags = if config.extended_fields {
            request::ALL
        } else {
            request::BASIC
        };
        self.sdk.set_search(&config.pattern);
        self.sdk.set_match_path(config.match_path);
        self.sdk.set_match_case(config.match_case);
        self.sdk.set_match_whole_word(config.match_whole_word);
        self.sdk.set_regex(config.use_regex);
        self.sdk.set_request_flags(flags);
        self.sdk.set_offset(config.offset);
        // 0 表示不限
        self.sdk.set_max(if config.count == 0 { u32::MAX } else { config.count });
        if let Some(order) = config.sort {
            self.sdk.set_sort(sdk::sort_constant(order));
        }
        self.state = SessionState::Configured;
    }

    fn execute(&mut self) -> Result<()> {
        if !self.sdk.query() {
            let code = self.sdk.last_error();
            debug!(code, name = sdk::error_name(code), "SDK 查询失败");
            return Err(SearchError::QueryFailed { code });
        }
        self.state = SessionState::Queried;
        Ok(())
    }

    fn drain(&mut self, extended: bool) -> Vec<SearchRecord> {
        let total = self.sdk.num_results();
        debug!(total, "读取 SDK 结果");
        let records = (0..total).map(|i| self.record(i, extended)).collect();
        self.state = SessionState::Drained;
        records
    }

    fn reset(&mut self) {
        self.sdk.reset();
        self.state = SessionState::Bound;
    }

    fn record(&self, index: u32, extended: bool) -> SearchRecord {
        let path = self.full_path(index);
        let mut name = self.optional_string(StringField::FileName, index);
        if name.is_empty() {
            name = file_name_of(&path).to_string();
        }
        // 负数大小按 0 处理
        let size = self
            .sdk
            .result_size(index)
            .map(|s| s.max(0) as u64)
            .unwrap_or(0);
        let record = SearchRecord::new(name, path, size);
        if !extended {
            return record;
        }

        let attributes = match self.sdk.result_attributes(index) {
            sdk::INVALID_FILE_ATTRIBUTES => 0,
            attrs => attrs,
        };
        let fields = ExtendedFields {
            extension: self.optional_string(StringField::Extension, index),
            date_created: self.date(DateField::Created, index),
            date_modified: self.date(DateField::Modified, index),
            date_accessed: self.date(DateField::Accessed, index),
            attributes,
            file_list_file_name: self.optional_string(StringField::FileListFileName, index),
            run_count: self.sdk.result_run_count(index),
            date_run: self.date(DateField::Run, index),
            date_recently_changed: self.date(DateField::RecentlyChanged, index),
            highlighted_file_name: self.optional_string(StringField::HighlightedFileName, index),
            highlighted_path: self.optional_string(StringField::HighlightedPath, index),
            highlighted_full_path: self.optional_string(StringField::HighlightedFullPath, index),
        };
        record.with_extended(fields.into_map())
    }

    /// 先用固定缓冲区；提供方返回的长度填满缓冲区时再查询所需长度重试
    fn full_path(&self, index: u32) -> String {
        let mut buf = vec![0u16; BUFFER_CHARS];
        let mut copied = self.sdk.result_full_path(index, &mut buf) as usize;
        if copied + 1 >= buf.len() {
            let needed = self.sdk.result_full_path(index, &mut []) as usize;
            if needed + 1 > buf.len() {
                debug!(index, needed, "完整路径超出缓冲区，扩容重试");
                buf = vec![0u16; needed + 1];
                copied = self.sdk.result_full_path(index, &mut buf) as usize;
            }
        }
        String::from_utf16_lossy(&buf[..copied.min(buf.len())])
    }

    /// 可选字符串字段：缓冲区形式优先，其次指针返回形式，都不可用时为空串
    fn optional_string(&self, field: StringField, index: u32) -> String {
        let mut buf = vec![0u16; BUFFER_CHARS];
        if let Some(copied) = self.sdk.result_string_buffer(field, index, &mut buf) {
            return String::from_utf16_lossy(&buf[..(copied as usize).min(buf.len())]);
        }
        match self.sdk.result_string_pointer(field, index) {
            Some(value) => value,
            None => {
                debug!(?field, index, "字段不可用");
                String::new()
            }
        }
    }

    fn date(&self, field: DateField, index: u32) -> Option<chrono::NaiveDateTime> {
        self.sdk.result_date(field, index).and_then(timestamp::decode)
    }
}

impl<S: EverythingSdk> SearchAdapter for SdkSession<S> {
    fn name(&self) -> &'static str {
        "dll"
    }

    fn search(&mut self, config: &QueryConfig) -> Result<Vec<SearchRecord>> {
        ensure_pattern(config)?;
        debug!(
            pattern = %config.pattern,
            offset = config.offset,
            count = config.count,
            extended = config.extended_fields,
            "SDK 查询"
        );
        self.configure(config);
        let outcome = self.execute().map(|()| self.drain(config.extended_fields));
        // 成功与失败都只重置一次
        self.reset();

        let mut records = outcome?;
        apply_limit(&mut records, config);
        debug!(count = records.len(), "SDK 查询完成");
        Ok(records)
    }
}

impl<S: EverythingSdk> Drop for SdkSession<S> {
    fn drop(&mut self) {
        self.sdk.clean_up();
        info!("Everything SDK 会话已释放");
    }
}
