//! 集成测试共用的模拟提供方

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use everything_search::es::{CommandOutput, CommandRunner};
use everything_search::sdk::{DateField, EverythingSdk, SdkVersion, StringField};

/// 模拟索引中的一条记录
#[derive(Debug, Clone, Default)]
pub struct FakeEntry {
    pub full_path: String,
    pub size: i64,
    pub extension: String,
    pub date_modified: u64,
    pub attributes: u32,
    pub run_count: u32,
}

impl FakeEntry {
    pub fn new(full_path: &str, size: i64) -> Self {
        let extension = full_path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default();
        Self {
            full_path: full_path.to_string(),
            size,
            extension,
            ..Default::default()
        }
    }
}

/// 记录 SDK 调用，会话被释放后仍可检查
#[derive(Debug, Default)]
pub struct SdkLog {
    pub pattern: String,
    pub match_path: bool,
    pub match_case: bool,
    pub offset: u32,
    pub max: u32,
    pub request_flags: u32,
    pub sort: Option<u32>,
    pub queries: u32,
    pub resets: u32,
    pub clean_ups: u32,
    /// 完整路径 getter 被调用时传入的缓冲区长度
    pub full_path_buffers: Vec<usize>,
}

/// 模拟 Everything SDK 入口表
pub struct FakeSdk {
    pub entries: Vec<FakeEntry>,
    /// 查询失败时的错误码
    pub fail_with: Option<u32>,
    /// 字符串字段是否提供缓冲区形式
    pub buffer_strings: bool,
    /// 字符串字段是否提供指针形式
    pub pointer_strings: bool,
    pub log: Rc<RefCell<SdkLog>>,
    visible: Vec<FakeEntry>,
    last_error: u32,
}

impl FakeSdk {
    pub fn new(entries: Vec<FakeEntry>) -> Self {
        Self {
            entries,
            fail_with: None,
            buffer_strings: false,
            pointer_strings: true,
            log: Rc::new(RefCell::new(SdkLog::default())),
            visible: Vec::new(),
            last_error: 0,
        }
    }

    fn entry(&self, index: u32) -> Option<&FakeEntry> {
        self.visible.get(index as usize)
    }

    fn string(&self, field: StringField, index: u32) -> Option<String> {
        let entry = self.entry(index)?;
        let (dir, name) = entry
            .full_path
            .rsplit_once('\\')
            .unwrap_or(("", entry.full_path.as_str()));
        Some(match field {
            StringField::FileName => name.to_string(),
            StringField::Path => dir.to_string(),
            StringField::Extension => entry.extension.clone(),
            StringField::FileListFileName => String::new(),
            StringField::HighlightedFileName => format!("*{name}*"),
            StringField::HighlightedPath => dir.to_string(),
            StringField::HighlightedFullPath => entry.full_path.clone(),
        })
    }
}

fn copy_wide(value: &str, buf: &mut [u16]) -> u32 {
    let wide: Vec<u16> = value.encode_utf16().collect();
    if buf.is_empty() {
        return wide.len() as u32;
    }
    let copied = wide.len().min(buf.len() - 1);
    buf[..copied].copy_from_slice(&wide[..copied]);
    buf[copied] = 0;
    copied as u32
}

impl EverythingSdk for FakeSdk {
    fn set_search(&mut self, pattern: &str) {
        self.log.borrow_mut().pattern = pattern.to_string();
    }

    fn set_match_path(&mut self, enable: bool) {
        self.log.borrow_mut().match_path = enable;
    }

    fn set_match_case(&mut self, enable: bool) {
        self.log.borrow_mut().match_case = enable;
    }

    fn set_match_whole_word(&mut self, _enable: bool) {}

    fn set_regex(&mut self, _enable: bool) {}

    fn set_offset(&mut self, offset: u32) {
        self.log.borrow_mut().offset = offset;
    }

    fn set_max(&mut self, max: u32) {
        self.log.borrow_mut().max = max;
    }

    fn set_request_flags(&mut self, flags: u32) {
        self.log.borrow_mut().request_flags = flags;
    }

    fn set_sort(&mut self, sort: u32) {
        self.log.borrow_mut().sort = Some(sort);
    }

    fn query(&mut self) -> bool {
        let mut log = self.log.borrow_mut();
        log.queries += 1;
        if let Some(code) = self.fail_with {
            self.last_error = code;
            return false;
        }
        self.visible = self
            .entries
            .iter()
            .skip(log.offset as usize)
            .take(log.max as usize)
            .cloned()
            .collect();
        true
    }

    fn num_results(&self) -> u32 {
        self.visible.len() as u32
    }

    fn result_full_path(&self, index: u32, buf: &mut [u16]) -> u32 {
        self.log.borrow_mut().full_path_buffers.push(buf.len());
        match self.entry(index) {
            Some(entry) => copy_wide(&entry.full_path, buf),
            None => 0,
        }
    }

    fn result_size(&self, index: u32) -> Option<i64> {
        self.entry(index).map(|e| e.size)
    }

    fn result_date(&self, field: DateField, index: u32) -> Option<u64> {
        let entry = self.entry(index)?;
        match field {
            DateField::Modified => Some(entry.date_modified),
            _ => None,
        }
    }

    fn result_attributes(&self, index: u32) -> u32 {
        self.entry(index).map(|e| e.attributes).unwrap_or(0xFFFF_FFFF)
    }

    fn result_run_count(&self, index: u32) -> u32 {
        self.entry(index).map(|e| e.run_count).unwrap_or(0)
    }

    fn result_string_buffer(&self, field: StringField, index: u32, buf: &mut [u16]) -> Option<u32> {
        if !self.buffer_strings {
            return None;
        }
        let value = self.string(field, index)?;
        Some(copy_wide(&value, buf))
    }

    fn result_string_pointer(&self, field: StringField, index: u32) -> Option<String> {
        if !self.pointer_strings {
            return None;
        }
        self.string(field, index)
    }

    fn last_error(&self) -> u32 {
        self.last_error
    }

    fn is_db_loaded(&self) -> bool {
        true
    }

    fn version(&self) -> SdkVersion {
        SdkVersion {
            major: 1,
            minor: 4,
            revision: 1,
            build: 1026,
        }
    }

    fn reset(&mut self) {
        self.visible.clear();
        self.log.borrow_mut().resets += 1;
    }

    fn clean_up(&mut self) {
        self.log.borrow_mut().clean_ups += 1;
    }
}

/// 按顺序返回预置输出的进程执行器
#[derive(Clone, Default)]
pub struct FakeRunner {
    pub outputs: Rc<RefCell<VecDeque<io::Result<CommandOutput>>>>,
    pub calls: Rc<RefCell<Vec<(PathBuf, Vec<String>)>>>,
}

impl FakeRunner {
    pub fn with_stdout(stdout: &str) -> Self {
        let runner = Self::default();
        runner.push(Ok(CommandOutput {
            code: Some(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }));
        runner
    }

    pub fn push(&self, output: io::Result<CommandOutput>) {
        self.outputs.borrow_mut().push_back(output);
    }

    pub fn last_args(&self) -> Vec<String> {
        self.calls
            .borrow()
            .last()
            .map(|(_, args)| args.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        self.calls
            .borrow_mut()
            .push((program.to_path_buf(), args.to_vec()));
        self.outputs
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput { code: Some(0), ..Default::default() }))
    }
}
