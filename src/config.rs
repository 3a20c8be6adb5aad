use std::path::PathBuf;

use crate::error::{Result, SearchError};

/// Everything SDK 动态库（仅支持 64 位）
pub const SDK_LIBRARY: &str = "Everything64.dll";

/// Everything 命令行工具
pub const ES_EXECUTABLE: &str = "es.exe";

/// 固定输出缓冲区大小（UTF-16 码元）
pub const BUFFER_CHARS: usize = 260;

/// 默认每页结果数
pub const DEFAULT_COUNT: u32 = 100;

pub const HOST_ENV: &str = "EVERYTHING_HOST";
pub const PORT_ENV: &str = "EVERYTHING_PORT";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 80;

/// 连通性自检使用的系统文件，任何 Windows 上都存在
pub const HOSTS_PATH: &str = r"C:\Windows\System32\drivers\etc\hosts";

/// 随程序分发的组件目录：exe 同级的 lib 目录，其次是 exe 所在目录
pub fn bundled_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.join("lib"));
            dirs.push(exe_dir.to_path_buf());
        }
    }
    dirs
}

/// es.exe 的常见安装位置
pub fn es_install_locations() -> Vec<PathBuf> {
    let program_files =
        std::env::var("ProgramFiles").unwrap_or_else(|_| r"C:\Program Files".to_string());
    let program_files_x86 = std::env::var("ProgramFiles(x86)")
        .unwrap_or_else(|_| r"C:\Program Files (x86)".to_string());
    vec![
        PathBuf::from(r"C:\bin").join(ES_EXECUTABLE),
        PathBuf::from(program_files).join("Everything").join(ES_EXECUTABLE),
        PathBuf::from(program_files_x86).join("Everything").join(ES_EXECUTABLE),
    ]
}

/// Everything HTTP 服务器地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEndpoint {
    pub host: String,
    pub port: u16,
}

impl HttpEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// 优先级：显式参数 > 环境变量 > 默认值
    pub fn resolve(host: Option<&str>, port: Option<u16>) -> Result<Self> {
        let host = host
            .filter(|h| !h.trim().is_empty())
            .map(str::to_string)
            .or_else(|| non_empty_env(HOST_ENV))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        // 显式端口存在时不读取环境变量
        let port = match port {
            Some(port) => port,
            None => match non_empty_env(PORT_ENV) {
                Some(raw) => parse_port(&raw)?,
                None => DEFAULT_PORT,
            },
        };
        Ok(Self { host, port })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

impl Default for HttpEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(SearchError::InvalidPort {
            name: PORT_ENV,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_parsing() {
        assert_eq!(parse_port("8080").unwrap(), 8080);
        assert!(parse_port("abc").is_err());
        assert!(parse_port("0").is_err());
        assert!(parse_port("70000").is_err());
    }

    #[test]
    fn base_url_format() {
        assert_eq!(HttpEndpoint::new("localhost", 8888).base_url(), "http://localhost:8888/");
        assert_eq!(HttpEndpoint::default().base_url(), "http://127.0.0.1:80/");
    }

    #[test]
    fn install_locations_end_with_es() {
        for p in es_install_locations() {
            assert!(p.ends_with(ES_EXECUTABLE));
        }
    }
}
