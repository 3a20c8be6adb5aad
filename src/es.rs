//! es.exe 子进程通道

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tracing::{debug, info};

use crate::config;
use crate::error::{Result, SearchError};
use crate::searcher::{apply_limit, ensure_pattern, SearchAdapter};
use crate::tabular::{self, field, TabularRow};
use crate::timestamp;
use crate::types::{ExtendedFields, QueryConfig, SearchRecord, SortKey};

/// 基本模式的列参数与对应字段（顺序一致）
const BASIC_COLUMNS: &[(&str, &str)] = &[
    ("-name", field::NAME),
    ("-path-column", field::PATH),
    ("-size", field::SIZE),
];

const EXTENDED_COLUMNS: &[(&str, &str)] = &[
    ("-name", field::NAME),
    ("-path-column", field::PATH),
    ("-extension", field::EXTENSION),
    ("-size", field::SIZE),
    ("-date-created", field::DATE_CREATED),
    ("-date-modified", field::DATE_MODIFIED),
    ("-date-accessed", field::DATE_ACCESSED),
    ("-attributes", field::ATTRIBUTES),
    ("-file-list-file-name", field::FILE_LIST_FILE_NAME),
    ("-run-count", field::RUN_COUNT),
    ("-date-run", field::DATE_RUN),
    ("-date-recently-changed", field::DATE_RECENTLY_CHANGED),
];

/// 子进程执行结果
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// 退出码；被信号终止时为 `None`
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// 执行外部命令
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput>;
}

/// 直接启动进程，不经过 shell
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let output = cmd.output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// es.exe 搜索器
pub struct EsSearcher<R: CommandRunner = SystemRunner> {
    es_path: PathBuf,
    instance: Option<String>,
    runner: R,
}

impl EsSearcher<SystemRunner> {
    pub fn with_path(es_path: impl Into<PathBuf>) -> Self {
        Self {
            es_path: es_path.into(),
            instance: None,
            runner: SystemRunner,
        }
    }

    /// 在系统搜索路径、随附目录、当前目录与常见安装位置中查找 es.exe
    pub fn locate() -> Result<Self> {
        let es_path = locate_executable()?;
        info!(path = %es_path.display(), "使用 es.exe");
        Ok(Self::with_path(es_path))
    }
}

impl<R: CommandRunner> EsSearcher<R> {
    pub fn with_runner<T: CommandRunner>(self, runner: T) -> EsSearcher<T> {
        EsSearcher {
            es_path: self.es_path,
            instance: self.instance,
            runner,
        }
    }

    /// Everything 1.5a 等命名实例；空名称等同于默认实例
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        let instance = instance.into();
        self.instance = (!instance.trim().is_empty()).then_some(instance);
        self
    }

    pub fn es_path(&self) -> &Path {
        &self.es_path
    }

    /// 查询 Everything 服务版本；服务不可达时返回 `None`
    pub fn everything_version(&self) -> Result<Option<String>> {
        let mut args = self.instance_args();
        args.push("-get-everything-version".to_string());
        let output = self.execute(&args)?;
        let version = decode_output(&output.stdout).trim().to_string();
        if version.is_empty() || version == "0.0.0.0" {
            return Ok(None);
        }
        Ok(Some(version))
    }

    fn instance_args(&self) -> Vec<String> {
        match &self.instance {
            Some(name) => vec!["-instance".to_string(), name.clone()],
            None => Vec::new(),
        }
    }

    /// 构造完整参数列表
    pub fn build_args(&self, config: &QueryConfig) -> Vec<String> {
        let mut args = self.instance_args();
        args.extend(columns(config).iter().map(|(flag, _)| flag.to_string()));
        args.push("-csv".to_string());
        if config.extended_fields {
            // FILETIME 刻度，与 SDK 通道共用解码
            args.extend(["-date-format".to_string(), "2".to_string()]);
        }
        if config.match_case {
            args.push("-case".to_string());
        }
        if config.match_whole_word {
            args.push("-whole-word".to_string());
        }
        if config.use_regex {
            args.push("-regex".to_string());
        }
        if config.match_path {
            args.push("-match-path".to_string());
        }
        if let Some(order) = config.sort {
            args.push("-sort".to_string());
            args.push(sort_name(order.key).to_string());
            args.push(if order.ascending { "-sort-ascending" } else { "-sort-descending" }.to_string());
        }
        if config.offset > 0 {
            args.push("-offset".to_string());
            args.push(config.offset.to_string());
        }
        if config.count > 0 {
            args.push("-n".to_string());
            args.push(config.count.to_string());
        }
        args.extend(split_query(&config.pattern));
        args
    }

    fn execute(&self, args: &[String]) -> Result<CommandOutput> {
        debug!(command = %shell_words::join(args), "执行 es.exe");
        let output = self.runner.run(&self.es_path, args).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SearchError::ExecutableNotFound {
                    checked: vec![self.es_path.clone()],
                }
            } else {
                SearchError::Spawn(e)
            }
        })?;
        if output.code != Some(0) {
            return Err(SearchError::ProcessFailed {
                code: output.code,
                stderr: decode_output(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl<R: CommandRunner> SearchAdapter for EsSearcher<R> {
    fn name(&self) -> &'static str {
        "es"
    }

    fn search(&mut self, config: &QueryConfig) -> Result<Vec<SearchRecord>> {
        ensure_pattern(config)?;
        let args = self.build_args(config);
        let output = self.execute(&args)?;
        let stdout = decode_output(&output.stdout);
        if stdout.trim().is_empty() {
            debug!("es.exe 无输出");
            return Ok(Vec::new());
        }

        let requested: Vec<&str> = columns(config).iter().map(|(_, f)| *f).collect();
        let mut records: Vec<SearchRecord> = tabular::parse(&stdout, &requested)
            .iter()
            .map(|row| to_record(row, config.extended_fields))
            .collect();
        apply_limit(&mut records, config);
        debug!(count = records.len(), "es.exe 查询完成");
        Ok(records)
    }
}

fn columns(config: &QueryConfig) -> &'static [(&'static str, &'static str)] {
    if config.extended_fields {
        EXTENDED_COLUMNS
    } else {
        BASIC_COLUMNS
    }
}

fn sort_name(key: SortKey) -> &'static str {
    match key {
        SortKey::Name => "name",
        SortKey::Path => "path",
        SortKey::Size => "size",
        SortKey::Extension => "extension",
        SortKey::TypeName => "type-name",
        SortKey::DateCreated => "date-created",
        SortKey::DateModified => "date-modified",
        SortKey::DateAccessed => "date-accessed",
        SortKey::Attributes => "attributes",
        SortKey::FileListFileName => "file-list-file-name",
        SortKey::RunCount => "run-count",
        SortKey::DateRecentlyChanged => "date-recently-changed",
        SortKey::DateRun => "date-run",
    }
}

fn to_record(row: &TabularRow, extended: bool) -> SearchRecord {
    let text = |f: &str| row.get(f).unwrap_or_default().to_string();
    let record = SearchRecord::new(
        text(field::NAME),
        text(field::PATH),
        tabular::parse_size(row.get(field::SIZE)),
    );
    if !extended {
        return record;
    }

    let date = |f: &str| row.get(f).and_then(timestamp::decode_text);
    let number = |f: &str| row.get(f).and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0);
    let mut map = ExtendedFields {
        extension: text(field::EXTENSION),
        date_created: date(field::DATE_CREATED),
        date_modified: date(field::DATE_MODIFIED),
        date_accessed: date(field::DATE_ACCESSED),
        attributes: number(field::ATTRIBUTES),
        file_list_file_name: text(field::FILE_LIST_FILE_NAME),
        run_count: number(field::RUN_COUNT),
        date_run: date(field::DATE_RUN),
        date_recently_changed: date(field::DATE_RECENTLY_CHANGED),
        ..Default::default()
    }
    .into_map();

    // 不是刻度的日期文本原样保留
    for f in [
        field::DATE_CREATED,
        field::DATE_MODIFIED,
        field::DATE_ACCESSED,
        field::DATE_RUN,
        field::DATE_RECENTLY_CHANGED,
    ] {
        if let Some(raw) = row.get(f).map(str::trim) {
            if !raw.is_empty() && raw.parse::<u64>().is_err() {
                map.insert(f.to_string(), Value::String(raw.to_string()));
            }
        }
    }
    record.with_extended(map)
}

/// 按空白切分查询，双引号内的空白不切分，引号本身保留
///
/// es.exe 自己解析 Everything 语法，所以反斜杠和引号都原样传递。
pub fn split_query(pattern: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in pattern.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// 先按 UTF-8 解码，不合法时按 GBK
pub fn decode_output(bytes: &[u8]) -> String {
    let (utf8, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
    let text = if !had_errors {
        utf8.into_owned()
    } else {
        let (gbk, _, _) = encoding_rs::GBK.decode(bytes);
        gbk.into_owned()
    };
    text.trim_start_matches('\u{feff}').to_string()
}

/// 查找 es.exe
pub fn locate_executable() -> Result<PathBuf> {
    if let Ok(found) = which::which(config::ES_EXECUTABLE) {
        return Ok(found);
    }

    let mut candidates: Vec<PathBuf> = config::bundled_dirs()
        .into_iter()
        .map(|d| d.join(config::ES_EXECUTABLE))
        .collect();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(config::ES_EXECUTABLE));
        candidates.push(cwd.join("lib").join(config::ES_EXECUTABLE));
    }
    candidates.extend(config::es_install_locations());

    match candidates.iter().find(|p| p.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(SearchError::ExecutableNotFound { checked: candidates }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_segments_survive() {
        assert_eq!(
            split_query(r#"path:"\windows\system32\drivers\etc" hosts"#),
            vec![r#"path:"\windows\system32\drivers\etc""#, "hosts"]
        );
        assert_eq!(split_query(r#""program files" *.exe"#), vec![r#""program files""#, "*.exe"]);
        assert_eq!(split_query("  a   b\tc "), vec!["a", "b", "c"]);
        assert!(split_query("   ").is_empty());
    }

    #[test]
    fn unterminated_quote_keeps_the_rest() {
        assert_eq!(split_query(r#"foo "bar baz"#), vec!["foo", r#""bar baz"#]);
    }

    #[test]
    fn basic_args_order() {
        let es = EsSearcher::with_path("es.exe");
        let config = QueryConfig::new("foo bar").with_page(0, 10);
        assert_eq!(
            es.build_args(&config),
            vec!["-name", "-path-column", "-size", "-csv", "-match-path", "-n", "10", "foo", "bar"]
        );
    }

    #[test]
    fn extended_args_request_filetime_and_options() {
        let es = EsSearcher::with_path("es.exe").with_instance("1.5a");
        let mut config = QueryConfig::new("x")
            .with_page(20, 0)
            .with_extended_fields(true)
            .with_sort(crate::types::SortOrder::descending(SortKey::DateModified));
        config.match_path = false;
        config.match_case = true;
        let args = es.build_args(&config);
        assert_eq!(&args[..2], &["-instance", "1.5a"]);
        assert!(args.windows(2).any(|w| w == ["-date-format", "2"]));
        assert!(args.windows(3).any(|w| w == ["-sort", "date-modified", "-sort-descending"]));
        assert!(args.windows(2).any(|w| w == ["-offset", "20"]));
        assert!(args.contains(&"-case".to_string()));
        assert!(!args.contains(&"-match-path".to_string()));
        assert!(!args.contains(&"-n".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("x"));
    }

    #[test]
    fn blank_instance_is_default() {
        let es = EsSearcher::with_path("es.exe").with_instance("  ");
        assert!(es.instance_args().is_empty());
    }

    #[test]
    fn decodes_gbk_fallback() {
        assert_eq!(decode_output("中文".as_bytes()), "中文");
        // "中文" 的 GBK 编码
        assert_eq!(decode_output(&[0xD6, 0xD0, 0xCE, 0xC4]), "中文");
        assert_eq!(decode_output(b"\xEF\xBB\xBFName"), "Name");
    }

    #[test]
    fn raw_dates_are_kept_when_not_ticks() {
        let rows = tabular::parse(
            "a.txt,C:\\x,txt,1,133485408000000000,2024-01-01 10:00,,32,,3,0,\n",
            &EXTENDED_COLUMNS.iter().map(|(_, f)| *f).collect::<Vec<_>>(),
        );
        let record = to_record(&rows[0], true);
        assert_eq!(record.path, r"C:\x\a.txt");
        assert_eq!(record.extended["date_created"], Value::String("2024-01-01T00:00:00".into()));
        assert_eq!(record.extended["date_modified"], Value::String("2024-01-01 10:00".into()));
        assert_eq!(record.extended["date_accessed"], Value::Null);
        assert_eq!(record.extended["attributes"], Value::from(32));
        assert_eq!(record.extended["run_count"], Value::from(3));
        assert_eq!(record.extended["date_run"], Value::Null);
    }
}
