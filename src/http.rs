//! Everything 内置 HTTP 服务器通道

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::HttpEndpoint;
use crate::error::{Result, SearchError};
use crate::searcher::{apply_limit, ensure_pattern, SearchAdapter};
use crate::types::{full_path_of, QueryConfig, SearchRecord, SortKey};

const BASIC_COLUMNS: &[&str] = &["file_name_column", "path_column", "size_column"];

const EXTENDED_COLUMNS: &[&str] = &[
    "file_name_column",
    "path_column",
    "full_path_column",
    "size_column",
    "extension_column",
    "date_created_column",
    "date_modified_column",
    "date_accessed_column",
    "attributes_column",
    "file_list_file_name_column",
    "run_count_column",
    "date_run_column",
    "date_recently_changed_column",
    "highlighted_file_name_column",
    "highlighted_path_column",
    "highlighted_full_path_column",
];

/// `json=1` 时服务器返回的结构
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "totalResults", default)]
    total_results: Option<u64>,
    #[serde(default)]
    results: Vec<Value>,
}

pub struct HttpSearcher {
    endpoint: HttpEndpoint,
    client: reqwest::blocking::Client,
}

impl HttpSearcher {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().build()?;
        info!(url = %endpoint.base_url(), "使用 Everything HTTP 服务器");
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &HttpEndpoint {
        &self.endpoint
    }

    /// 请求参数，顺序固定
    pub fn build_params(config: &QueryConfig) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("search", config.pattern.clone()),
            ("offset", config.offset.to_string()),
        ];
        // 0 表示不限，交给服务器默认
        if config.count > 0 {
            params.push(("count", config.count.to_string()));
        }
        params.push(("json", "1".to_string()));

        let columns = if config.extended_fields {
            EXTENDED_COLUMNS
        } else {
            BASIC_COLUMNS
        };
        params.extend(columns.iter().map(|c| (*c, "1".to_string())));

        for (enabled, name) in [
            (config.match_path, "path"),
            (config.match_case, "case"),
            (config.match_whole_word, "wholeword"),
            (config.use_regex, "regex"),
        ] {
            if enabled {
                params.push((name, "1".to_string()));
            }
        }
        if let Some(order) = config.sort {
            params.push(("sort", sort_name(order.key).to_string()));
            params.push(("ascending", if order.ascending { "1" } else { "0" }.to_string()));
        }
        params
    }
}

impl SearchAdapter for HttpSearcher {
    fn name(&self) -> &'static str {
        "http"
    }

    fn search(&mut self, config: &QueryConfig) -> Result<Vec<SearchRecord>> {
        ensure_pattern(config)?;
        let params = Self::build_params(config);
        debug!(url = %self.endpoint.base_url(), ?params, "HTTP 查询");

        let response = self
            .client
            .get(self.endpoint.base_url())
            .query(&params)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::HttpStatus {
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        let mut records = parse_response(&body, config.extended_fields)?;
        apply_limit(&mut records, config);
        debug!(count = records.len(), "HTTP 查询完成");
        Ok(records)
    }
}

/// 解析响应体；缺少 `results` 视为没有结果
pub fn parse_response(body: &str, extended: bool) -> Result<Vec<SearchRecord>> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SearchError::MalformedResponse(e.to_string()))?;
    if !value.is_object() {
        return Err(SearchError::MalformedResponse("响应不是 JSON 对象".to_string()));
    }
    let response: SearchResponse =
        serde_json::from_value(value).map_err(|e| SearchError::MalformedResponse(e.to_string()))?;
    debug!(total = ?response.total_results, "HTTP 响应");

    let mut records = Vec::with_capacity(response.results.len());
    for item in response.results {
        match item {
            Value::Object(obj) => records.push(to_record(obj, extended)),
            other => debug!(item = %other, "跳过非对象结果"),
        }
    }
    Ok(records)
}

fn to_record(obj: Map<String, Value>, extended: bool) -> SearchRecord {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    };
    let name = text(&["name", "file_name_column"]);
    let dir = text(&["path", "path_column"]);
    let size = ["size", "size_column"]
        .iter()
        .find_map(|k| obj.get(*k))
        .map(parse_size)
        .unwrap_or(0);

    let record = SearchRecord::new(name.clone(), full_path_of(&dir, &name), size);
    if extended {
        // 服务器的键名原样透传
        record.with_extended(obj)
    } else {
        record
    }
}

/// 大小可能是数字或数字字符串
fn parse_size(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(0),
        _ => 0,
    }
}

fn sort_name(key: SortKey) -> &'static str {
    match key {
        SortKey::Name => "name",
        SortKey::Path => "path",
        SortKey::Size => "size",
        SortKey::Extension => "extension",
        SortKey::TypeName => "type_name",
        SortKey::DateCreated => "date_created",
        SortKey::DateModified => "date_modified",
        SortKey::DateAccessed => "date_accessed",
        SortKey::Attributes => "attributes",
        SortKey::FileListFileName => "file_list_file_name",
        SortKey::RunCount => "run_count",
        SortKey::DateRecentlyChanged => "date_recently_changed",
        SortKey::DateRun => "date_run",
    }
}
