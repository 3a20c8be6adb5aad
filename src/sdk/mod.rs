//! Everything SDK 入口表
//!
//! SDK 的查询状态是整个 DLL 共享的全局状态（关键词、匹配选项、分页、排序），
//! 没有按调用区分的句柄。这里用 [`EverythingSdk`] 抽象这张入口表，真实实现见
//! [`library`]（仅 Windows），测试里可以换成模拟实现。

use std::fmt;

use crate::types::{SortKey, SortOrder};

#[cfg(windows)]
pub mod library;

/// 请求字段位（对应 Everything.h 的 EVERYTHING_REQUEST_*）
pub mod request {
    pub const FILE_NAME: u32 = 0x0000_0001;
    pub const PATH: u32 = 0x0000_0002;
    pub const FULL_PATH_AND_FILE_NAME: u32 = 0x0000_0004;
    pub const EXTENSION: u32 = 0x0000_0008;
    pub const SIZE: u32 = 0x0000_0010;
    pub const DATE_CREATED: u32 = 0x0000_0020;
    pub const DATE_MODIFIED: u32 = 0x0000_0040;
    pub const DATE_ACCESSED: u32 = 0x0000_0080;
    pub const ATTRIBUTES: u32 = 0x0000_0100;
    pub const FILE_LIST_FILE_NAME: u32 = 0x0000_0200;
    pub const RUN_COUNT: u32 = 0x0000_0400;
    pub const DATE_RUN: u32 = 0x0000_0800;
    pub const DATE_RECENTLY_CHANGED: u32 = 0x0000_1000;
    pub const HIGHLIGHTED_FILE_NAME: u32 = 0x0000_2000;
    pub const HIGHLIGHTED_PATH: u32 = 0x0000_4000;
    pub const HIGHLIGHTED_FULL_PATH_AND_FILE_NAME: u32 = 0x0000_8000;

    /// 基本模式：文件名、路径、大小
    pub const BASIC: u32 = FILE_NAME | PATH | SIZE;

    pub const ALL: u32 = FILE_NAME
        | PATH
        | FULL_PATH_AND_FILE_NAME
        | EXTENSION
        | SIZE
        | DATE_CREATED
        | DATE_MODIFIED
        | DATE_ACCESSED
        | ATTRIBUTES
        | FILE_LIST_FILE_NAME
        | RUN_COUNT
        | DATE_RUN
        | DATE_RECENTLY_CHANGED
        | HIGHLIGHTED_FILE_NAME
        | HIGHLIGHTED_PATH
        | HIGHLIGHTED_FULL_PATH_AND_FILE_NAME;
}

/// `Everything_GetAttributes` 失败时的返回值
pub const INVALID_FILE_ATTRIBUTES: u32 = 0xFFFF_FFFF;

/// EVERYTHING_ERROR_* 的名字
pub fn error_name(code: u32) -> &'static str {
    match code {
        0 => "EVERYTHING_OK",
        1 => "EVERYTHING_ERROR_MEMORY",
        2 => "EVERYTHING_ERROR_IPC",
        3 => "EVERYTHING_ERROR_REGISTERCLASSEX",
        4 => "EVERYTHING_ERROR_CREATEWINDOW",
        5 => "EVERYTHING_ERROR_CREATETHREAD",
        6 => "EVERYTHING_ERROR_INVALIDINDEX",
        7 => "EVERYTHING_ERROR_INVALIDCALL",
        8 => "EVERYTHING_ERROR_INVALIDREQUEST",
        9 => "EVERYTHING_ERROR_INVALIDPARAMETER",
        _ => "EVERYTHING_ERROR_UNKNOWN",
    }
}

/// EVERYTHING_SORT_* 常量，降序 = 升序 + 1
pub fn sort_constant(order: SortOrder) -> u32 {
    let ascending = match order.key {
        SortKey::Name => 1,
        SortKey::Path => 3,
        SortKey::Size => 5,
        SortKey::Extension => 7,
        SortKey::TypeName => 9,
        SortKey::DateCreated => 11,
        SortKey::DateModified => 13,
        SortKey::Attributes => 15,
        SortKey::FileListFileName => 17,
        SortKey::RunCount => 19,
        SortKey::DateRecentlyChanged => 21,
        SortKey::DateAccessed => 23,
        SortKey::DateRun => 25,
    };
    if order.ascending {
        ascending
    } else {
        ascending + 1
    }
}

/// 可选的字符串结果字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringField {
    FileName,
    Path,
    Extension,
    FileListFileName,
    HighlightedFileName,
    HighlightedPath,
    HighlightedFullPath,
}

impl StringField {
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::FileName => "Everything_GetResultFileNameW",
            Self::Path => "Everything_GetResultPathW",
            Self::Extension => "Everything_GetResultExtensionW",
            Self::FileListFileName => "Everything_GetResultFileListFileNameW",
            Self::HighlightedFileName => "Everything_GetResultHighlightedFileNameW",
            Self::HighlightedPath => "Everything_GetResultHighlightedPathW",
            Self::HighlightedFullPath => "Everything_GetResultHighlightedFullPathAndFileNameW",
        }
    }
}

/// FILETIME 类型的结果字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    Created,
    Modified,
    Accessed,
    Run,
    RecentlyChanged,
}

impl DateField {
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::Created => "Everything_GetResultDateCreated",
            Self::Modified => "Everything_GetResultDateModified",
            Self::Accessed => "Everything_GetResultDateAccessed",
            Self::Run => "Everything_GetResultDateRun",
            Self::RecentlyChanged => "Everything_GetResultDateRecentlyChanged",
        }
    }
}

/// Everything 服务版本
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SdkVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub build: u32,
}

impl fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.revision, self.build)
    }
}

/// SDK 入口表
///
/// 所有 setter 修改的都是提供方的全局状态，所以需要 `&mut self`。
pub trait EverythingSdk {
    fn set_search(&mut self, pattern: &str);
    fn set_match_path(&mut self, enable: bool);
    fn set_match_case(&mut self, enable: bool);
    fn set_match_whole_word(&mut self, enable: bool);
    fn set_regex(&mut self, enable: bool);
    fn set_offset(&mut self, offset: u32);
    fn set_max(&mut self, max: u32);
    fn set_request_flags(&mut self, flags: u32);
    fn set_sort(&mut self, sort: u32);

    /// 同步执行查询，失败返回 `false`
    fn query(&mut self) -> bool;
    fn num_results(&self) -> u32;

    /// 完整路径写入 `buf`，返回写入的码元数（不含结尾 0）；`buf` 为空时返回所需长度
    fn result_full_path(&self, index: u32, buf: &mut [u16]) -> u32;
    fn result_size(&self, index: u32) -> Option<i64>;
    /// FILETIME 刻度
    fn result_date(&self, field: DateField, index: u32) -> Option<u64>;
    fn result_attributes(&self, index: u32) -> u32;
    fn result_run_count(&self, index: u32) -> u32;

    /// 缓冲区形式的字符串 getter；提供方没有这种形式时返回 `None`
    fn result_string_buffer(&self, field: StringField, index: u32, buf: &mut [u16]) -> Option<u32>;
    /// 指针返回形式的字符串 getter；没有该入口或返回空指针时为 `None`
    fn result_string_pointer(&self, field: StringField, index: u32) -> Option<String>;

    fn last_error(&self) -> u32;
    fn is_db_loaded(&self) -> bool;
    fn version(&self) -> SdkVersion;

    /// 清空结果列表与查询状态
    fn reset(&mut self);
    /// 释放 SDK 分配的全部内存
    fn clean_up(&mut self);
}
