//! es.exe CSV 输出解析
//!
//! es.exe 的 CSV 有时带表头（`Name,Path,Size`），有时没有；没有表头时按请求列的
//! 顺序逐列对应。解析从不因为单行异常而整体失败：列数不符的行会被截断或补齐。

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::types::{file_name_of, full_path_of, is_separator};

/// 规范字段名
pub mod field {
    pub const NAME: &str = "name";
    pub const PATH: &str = "path";
    pub const FULL_PATH: &str = "full_path";
    pub const EXTENSION: &str = "extension";
    pub const SIZE: &str = "size";
    pub const DATE_CREATED: &str = "date_created";
    pub const DATE_MODIFIED: &str = "date_modified";
    pub const DATE_ACCESSED: &str = "date_accessed";
    pub const ATTRIBUTES: &str = "attributes";
    pub const FILE_LIST_FILE_NAME: &str = "file_list_file_name";
    pub const RUN_COUNT: &str = "run_count";
    pub const DATE_RUN: &str = "date_run";
    pub const DATE_RECENTLY_CHANGED: &str = "date_recently_changed";
    pub const HIGHLIGHTED_FILE_NAME: &str = "highlighted_file_name";
    pub const HIGHLIGHTED_PATH: &str = "highlighted_path";
    pub const HIGHLIGHTED_FULL_PATH: &str = "highlighted_full_path";
}

/// 表头词表：去掉空格、下划线、连字符并转小写后的列名 -> 规范字段名
static HEADER_VOCABULARY: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    use field::*;
    HashMap::from([
        ("name", NAME),
        ("filename", NAME),
        ("path", PATH),
        ("fullpath", FULL_PATH),
        ("fullpathname", FULL_PATH),
        ("fullpathandname", FULL_PATH),
        ("fullpathandfilename", FULL_PATH),
        ("extension", EXTENSION),
        ("ext", EXTENSION),
        ("size", SIZE),
        ("datecreated", DATE_CREATED),
        ("datemodified", DATE_MODIFIED),
        ("dateaccessed", DATE_ACCESSED),
        ("attributes", ATTRIBUTES),
        ("filelistfilename", FILE_LIST_FILE_NAME),
        ("runcount", RUN_COUNT),
        ("daterun", DATE_RUN),
        ("daterecentlychanged", DATE_RECENTLY_CHANGED),
        ("highlightedname", HIGHLIGHTED_FILE_NAME),
        ("highlightedfilename", HIGHLIGHTED_FILE_NAME),
        ("highlightedpath", HIGHLIGHTED_PATH),
        ("highlightedfullpath", HIGHLIGHTED_FULL_PATH),
        ("highlightedfullpathandfilename", HIGHLIGHTED_FULL_PATH),
    ])
});

/// 把表头单元格映射为规范字段名
pub fn canonical_header(cell: &str) -> Option<&'static str> {
    let key: String = cell
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    HEADER_VOCABULARY.get(key.as_str()).copied()
}

/// 首行只要有一个单元格命中表头词表就视为表头
pub fn looks_like_header<S: AsRef<str>>(first_row: &[S]) -> bool {
    first_row
        .iter()
        .any(|cell| canonical_header(cell.as_ref()).is_some())
}

/// 解析出的一行：规范字段名 -> 原始文本，`None` 表示该列缺失
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularRow {
    cells: Vec<(String, Option<String>)>,
}

impl TabularRow {
    /// 取字段值；缺失或不存在都返回 `None`
    pub fn get(&self, field: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == field)
            .and_then(|(_, v)| v.as_deref())
    }

    /// 字段存在于行中（可能为缺失标记）
    pub fn contains(&self, field: &str) -> bool {
        self.cells.iter().any(|(k, _)| k == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    fn set(&mut self, field: &str, value: Option<String>) {
        match self.cells.iter_mut().find(|(k, _)| k == field) {
            Some(slot) => slot.1 = value,
            None => self.cells.push((field.to_string(), value)),
        }
    }

    /// 统一成 name = 文件名、path = 完整路径
    fn reconcile_path(&mut self) {
        let name = self.get(field::NAME).unwrap_or_default().to_string();
        let path = self.get(field::PATH).unwrap_or_default().to_string();
        let full = self.get(field::FULL_PATH).unwrap_or_default().to_string();

        if !full.is_empty() {
            if name.is_empty() {
                self.set(field::NAME, Some(file_name_of(&full).to_string()));
            }
            self.set(field::PATH, Some(full));
        } else if name.contains(is_separator) && path.is_empty() {
            // 文件名列里给的其实是完整路径
            self.set(field::NAME, Some(file_name_of(&name).to_string()));
            self.set(field::PATH, Some(name));
        } else if !name.is_empty() {
            // path 列通常是所在目录，也可能已经是完整路径
            self.set(field::PATH, Some(full_path_of(&path, &name)));
        }
    }
}

/// 解析 CSV 文本
///
/// `requested` 是请求列的顺序，无表头时按位置对应，同时保证每个请求字段都出现在结果里。
pub fn parse(text: &str, requested: &[&str]) -> Vec<TabularRow> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                if record.iter().all(|cell| cell.trim().is_empty()) {
                    continue;
                }
                rows.push(record.iter().map(str::to_string).collect());
            }
            Err(e) => debug!(line, error = %e, "跳过无法解析的 CSV 行"),
        }
    }

    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let (columns, data): (Vec<Option<String>>, &[Vec<String>]) = if looks_like_header(first.as_slice()) {
        let columns = first
            .iter()
            .map(|cell| canonical_header(cell).map(str::to_string))
            .collect();
        (columns, &rows[1..])
    } else {
        let columns = requested.iter().map(|f| Some(f.to_string())).collect();
        (columns, &rows[..])
    };

    data.iter()
        .map(|cells| build_row(cells, &columns, requested))
        .collect()
}

fn build_row(cells: &[String], columns: &[Option<String>], requested: &[&str]) -> TabularRow {
    let mut row = TabularRow::default();
    // 多出的列直接丢弃，缺少的列补为缺失
    for (i, column) in columns.iter().enumerate() {
        if let Some(name) = column {
            row.set(name, cells.get(i).cloned());
        }
    }
    for name in requested {
        if !row.contains(name) {
            row.set(name, None);
        }
    }
    row.reconcile_path();
    row
}

/// 解析大小列；千分位逗号会被去掉，无法解析时按 0 处理
pub fn parse_size(raw: Option<&str>) -> u64 {
    raw.map(|s| s.trim().replace(',', ""))
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0)
}
