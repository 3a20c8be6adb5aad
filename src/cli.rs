use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::diagnostic::{self, FsSizeSource};
use crate::searcher::{open_adapter, AdapterOptions, Method};
use crate::types::{QueryConfig, SortKey, SortOrder};

#[derive(Parser, Debug)]
#[command(author, version, about = "Everything 搜索命令行（SDK / es.exe / HTTP）", long_about = None)]
pub struct CliArgs {
    /// 搜索通道
    #[arg(short = 'm', long = "method", value_enum, default_value_t = Method::Es)]
    pub method: Method,

    /// 搜索关键词（Everything 查询语法）
    #[arg(short = 's', long = "search", required_unless_present = "test")]
    pub search: Option<String>,

    #[arg(long = "offset", default_value_t = 0)]
    pub offset: u32,

    /// 最大结果数，0 表示不限
    #[arg(short = 'n', long = "count", default_value_t = crate::config::DEFAULT_COUNT)]
    pub count: u32,

    /// 输出全部扩展字段
    #[arg(short = 'a', long = "all-fields")]
    pub all_fields: bool,

    /// 以 JSON 输出
    #[arg(long = "json")]
    pub json: bool,

    /// 运行连通性自检
    #[arg(long = "test")]
    pub test: bool,

    #[arg(long = "match-case")]
    pub match_case: bool,

    #[arg(long = "whole-word")]
    pub whole_word: bool,

    #[arg(long = "regex")]
    pub regex: bool,

    /// 关键词只匹配文件名，不匹配完整路径
    #[arg(long = "no-match-path")]
    pub no_match_path: bool,

    #[arg(long = "sort", value_enum)]
    pub sort: Option<SortKey>,

    /// 降序排序（需配合 --sort）
    #[arg(long = "descending", requires = "sort")]
    pub descending: bool,

    /// HTTP 服务器地址（默认读取 EVERYTHING_HOST）
    #[arg(long = "host")]
    pub host: Option<String>,

    /// HTTP 服务器端口（默认读取 EVERYTHING_PORT）
    #[arg(long = "port")]
    pub port: Option<u16>,

    /// Everything64.dll 路径
    #[arg(long = "dll-path")]
    pub dll_path: Option<PathBuf>,

    /// es.exe 路径
    #[arg(long = "es-path")]
    pub es_path: Option<PathBuf>,

    /// Everything 实例名（如 1.5a）
    #[arg(long = "instance")]
    pub instance: Option<String>,

    /// 输出调试日志
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl CliArgs {
    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            dll_path: self.dll_path.clone(),
            es_path: self.es_path.clone(),
            instance: self.instance.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }

    pub fn query_config(&self) -> QueryConfig {
        let mut config = QueryConfig::new(self.search.clone().unwrap_or_default())
            .with_page(self.offset, self.count)
            .with_extended_fields(self.all_fields);
        config.match_path = !self.no_match_path;
        config.match_case = self.match_case;
        config.match_whole_word = self.whole_word;
        config.use_regex = self.regex;
        if let Some(key) = self.sort {
            config = config.with_sort(if self.descending {
                SortOrder::descending(key)
            } else {
                SortOrder::ascending(key)
            });
        }
        config
    }
}

// CLI入口
pub fn run_cli(args: CliArgs) -> anyhow::Result<()> {
    let mut adapter = open_adapter(args.method, &args.adapter_options())
        .with_context(|| format!("无法初始化搜索通道 {:?}", args.method))?;

    if args.test {
        let diagnosis = diagnostic::diagnose(adapter.as_mut(), &FsSizeSource)
            .with_context(|| format!("{} 通道自检失败", adapter.name()))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&diagnosis.to_json())?);
        } else {
            println!("{}", diagnosis.message());
        }
        return Ok(());
    }

    let config = args.query_config();
    let records = adapter
        .search(&config)
        .with_context(|| format!("{} 通道搜索失败", adapter.name()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!("{}", record.to_tsv_line());
        }
    }
    Ok(())
}
