use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config;

/// 排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Path,
    Size,
    Extension,
    TypeName,
    DateCreated,
    DateModified,
    DateAccessed,
    Attributes,
    FileListFileName,
    RunCount,
    DateRecentlyChanged,
    DateRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: SortKey,
    pub ascending: bool,
}

impl SortOrder {
    pub fn ascending(key: SortKey) -> Self {
        Self { key, ascending: true }
    }

    pub fn descending(key: SortKey) -> Self {
        Self { key, ascending: false }
    }
}

/// 单次搜索请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Everything 查询语法的原始文本
    pub pattern: String,
    /// 跳过的前导结果数
    pub offset: u32,
    /// 最大结果数，0 表示不设上限（由各通道自行解释）
    pub count: u32,
    pub match_path: bool,
    pub match_case: bool,
    pub match_whole_word: bool,
    pub use_regex: bool,
    /// 是否请求全部扩展字段
    pub extended_fields: bool,
    pub sort: Option<SortOrder>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            offset: 0,
            count: config::DEFAULT_COUNT,
            match_path: true,
            match_case: false,
            match_whole_word: false,
            use_regex: false,
            extended_fields: false,
            sort: None,
        }
    }
}

impl QueryConfig {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, offset: u32, count: u32) -> Self {
        self.offset = offset;
        self.count = count;
        self
    }

    pub fn with_extended_fields(mut self, enabled: bool) -> Self {
        self.extended_fields = enabled;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    /// 结果上限；`None` 表示不限
    pub fn limit(&self) -> Option<usize> {
        (self.count > 0).then_some(self.count as usize)
    }
}

/// 一条搜索结果
///
/// `name` / `path` / `size` 在三个通道之间保持一致；扩展模式下的其余字段放在
/// `extended` 里，键名由通道决定（HTTP 通道原样透传服务器的列名）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub name: String,
    /// 完整路径
    pub path: String,
    pub size: u64,
    #[serde(flatten)]
    pub extended: Map<String, Value>,
}

impl SearchRecord {
    pub fn new(name: impl Into<String>, path: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
            extended: Map::new(),
        }
    }

    pub fn with_extended(mut self, extended: Map<String, Value>) -> Self {
        // 基本三元组的键不允许被扩展字段覆盖
        self.extended = extended
            .into_iter()
            .filter(|(k, _)| !matches!(k.as_str(), "name" | "path" | "size"))
            .collect();
        self
    }

    /// name 和 path 都为空时视为未知条目
    pub fn is_unknown(&self) -> bool {
        self.name.is_empty() && self.path.is_empty()
    }

    /// 输出用的制表符分隔行
    pub fn to_tsv_line(&self) -> String {
        let mut cells = vec![self.name.clone(), self.path.clone(), self.size.to_string()];
        cells.extend(self.extended.values().map(|v| match v {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }));
        cells.join("\t")
    }
}

/// SDK 与 es.exe 通道共用的扩展字段
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtendedFields {
    pub extension: String,
    pub date_created: Option<NaiveDateTime>,
    pub date_modified: Option<NaiveDateTime>,
    pub date_accessed: Option<NaiveDateTime>,
    pub attributes: u32,
    pub file_list_file_name: String,
    pub run_count: u32,
    pub date_run: Option<NaiveDateTime>,
    pub date_recently_changed: Option<NaiveDateTime>,
    pub highlighted_file_name: String,
    pub highlighted_path: String,
    pub highlighted_full_path: String,
}

impl ExtendedFields {
    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// 取路径最后一段作为文件名，同时识别 `\` 与 `/`
pub fn file_name_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    trimmed.rsplit(is_separator).next().unwrap_or(trimmed)
}

pub(crate) fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// 把文件名拼到目录下，沿用目录里已有的分隔符
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    if name.is_empty() {
        return dir.to_string();
    }
    let sep = if dir.contains('\\') || !dir.contains('/') { '\\' } else { '/' };
    if dir.ends_with(is_separator) {
        format!("{}{}", dir, name)
    } else {
        format!("{}{}{}", dir, sep, name)
    }
}

/// 比较用的路径形式：小写、统一为 `\`
pub fn normalize_path(path: &str) -> String {
    path.to_lowercase().replace('/', "\\")
}

/// 由目录列和文件名得到完整路径；目录列已经以该文件名结尾时原样返回
pub fn full_path_of(dir: &str, name: &str) -> String {
    if !dir.is_empty() && !name.is_empty() {
        let dir_norm = normalize_path(dir.trim_end_matches(is_separator));
        let tail = format!("\\{}", normalize_path(name));
        if dir_norm.ends_with(&tail) {
            return dir.to_string();
        }
    }
    join_path(dir, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_path_is_not_joined_twice() {
        let full = r"C:\Windows\System32\drivers\etc\hosts";
        assert_eq!(full_path_of(full, "hosts"), full);
        assert_eq!(full_path_of("c:/windows/etc/HOSTS", "hosts"), "c:/windows/etc/HOSTS");
        assert_eq!(full_path_of(r"C:\etc", "hosts"), r"C:\etc\hosts");
        // 目录名只是以文件名结尾，仍需拼接
        assert_eq!(full_path_of(r"C:\myhosts", "hosts"), r"C:\myhosts\hosts");
        assert_eq!(full_path_of("", "hosts"), "hosts");
    }

    #[test]
    fn unknown_records() {
        assert!(SearchRecord::new("", "", 0).is_unknown());
        assert!(!SearchRecord::new("hosts", "", 0).is_unknown());
    }

    #[test]
    fn file_name_handles_both_separators() {
        assert_eq!(file_name_of(r"C:\Windows\System32\drivers\etc\hosts"), "hosts");
        assert_eq!(file_name_of("/mnt/c/temp/file.txt"), "file.txt");
        assert_eq!(file_name_of(r"C:\Temp\"), "Temp");
        assert_eq!(file_name_of("plain"), "plain");
    }

    #[test]
    fn join_keeps_separator_style() {
        assert_eq!(join_path(r"C:\Temp", "a.txt"), r"C:\Temp\a.txt");
        assert_eq!(join_path(r"C:\", "a.txt"), r"C:\a.txt");
        assert_eq!(join_path("/tmp", "a.txt"), "/tmp/a.txt");
        assert_eq!(join_path("", "a.txt"), "a.txt");
    }

    #[test]
    fn extended_map_cannot_shadow_basic_fields() {
        let mut extra = Map::new();
        extra.insert("size".into(), Value::from(1));
        extra.insert("size_column".into(), Value::from(959));
        let rec = SearchRecord::new("hosts", r"C:\hosts", 959).with_extended(extra);
        assert_eq!(rec.extended.len(), 1);
        assert!(rec.extended.contains_key("size_column"));
    }

    #[test]
    fn extended_fields_serialize_dates_as_iso() {
        let fields = ExtendedFields {
            date_modified: crate::timestamp::decode(133_485_408_000_000_000),
            ..Default::default()
        };
        let map = fields.into_map();
        assert_eq!(map["date_modified"], Value::from("2024-01-01T00:00:00"));
        assert_eq!(map["date_created"], Value::Null);
        assert_eq!(map.len(), 12);
    }

    #[test]
    fn zero_count_means_unlimited() {
        assert_eq!(QueryConfig::new("x").with_page(0, 0).limit(), None);
        assert_eq!(QueryConfig::new("x").with_page(5, 10).limit(), Some(10));
    }
}
