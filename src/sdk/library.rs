//! 通过 LoadLibraryW 绑定 Everything64.dll

use std::ffi::{CString, OsStr};
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use windows::core::{PCSTR, PCWSTR};
use windows::Win32::Foundation::{FreeLibrary, FILETIME, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use super::{DateField, EverythingSdk, SdkVersion, StringField, INVALID_FILE_ATTRIBUTES};
use crate::config;
use crate::error::{Result, SearchError};
use crate::timestamp;

type SetText = unsafe extern "system" fn(*const u16);
type SetFlag = unsafe extern "system" fn(i32);
type SetNumber = unsafe extern "system" fn(u32);
type Query = unsafe extern "system" fn(i32) -> i32;
type GetNumber = unsafe extern "system" fn() -> u32;
type GetBool = unsafe extern "system" fn() -> i32;
type Action = unsafe extern "system" fn();
type FullPathGetter = unsafe extern "system" fn(u32, *mut u16, u32) -> u32;
type SizeGetter = unsafe extern "system" fn(u32, *mut i64) -> i32;
type DateGetter = unsafe extern "system" fn(u32, *mut FILETIME) -> i32;
type IndexNumber = unsafe extern "system" fn(u32) -> u32;
type PointerGetter = unsafe extern "system" fn(u32) -> *const u16;

/// 入口函数表；基本查询需要的入口缺失时加载失败，其余为可选
struct EntryPoints {
    set_search: SetText,
    set_match_path: SetFlag,
    set_match_case: Option<SetFlag>,
    set_match_whole_word: Option<SetFlag>,
    set_regex: Option<SetFlag>,
    set_offset: SetNumber,
    set_max: SetNumber,
    set_request_flags: SetNumber,
    set_sort: Option<SetNumber>,
    query: Query,
    num_results: GetNumber,
    full_path: FullPathGetter,
    size: SizeGetter,
    dates: [Option<DateGetter>; 5],
    attributes: Option<IndexNumber>,
    run_count: Option<IndexNumber>,
    strings: [Option<PointerGetter>; 7],
    last_error: GetNumber,
    is_db_loaded: Option<GetBool>,
    versions: [Option<GetNumber>; 4],
    reset: Action,
    clean_up: Action,
}

const DATE_FIELDS: [DateField; 5] = [
    DateField::Created,
    DateField::Modified,
    DateField::Accessed,
    DateField::Run,
    DateField::RecentlyChanged,
];

const STRING_FIELDS: [StringField; 7] = [
    StringField::FileName,
    StringField::Path,
    StringField::Extension,
    StringField::FileListFileName,
    StringField::HighlightedFileName,
    StringField::HighlightedPath,
    StringField::HighlightedFullPath,
];

impl EntryPoints {
    unsafe fn bind(module: HMODULE) -> Result<Self> {
        Ok(Self {
            set_search: required(module, "Everything_SetSearchW")?,
            set_match_path: required(module, "Everything_SetMatchPath")?,
            set_match_case: optional(module, "Everything_SetMatchCase"),
            set_match_whole_word: optional(module, "Everything_SetMatchWholeWord"),
            set_regex: optional(module, "Everything_SetRegex"),
            set_offset: required(module, "Everything_SetOffset")?,
            set_max: required(module, "Everything_SetMax")?,
            set_request_flags: required(module, "Everything_SetRequestFlags")?,
            set_sort: optional(module, "Everything_SetSort"),
            query: required(module, "Everything_QueryW")?,
            num_results: required(module, "Everything_GetNumResults")?,
            full_path: required(module, "Everything_GetResultFullPathNameW")?,
            size: required(module, "Everything_GetResultSize")?,
            dates: DATE_FIELDS.map(|f| unsafe { optional(module, f.entry_point()) }),
            attributes: optional(module, "Everything_GetResultAttributes"),
            run_count: optional(module, "Everything_GetResultRunCount"),
            strings: STRING_FIELDS.map(|f| unsafe { optional(module, f.entry_point()) }),
            last_error: required(module, "Everything_GetLastError")?,
            is_db_loaded: optional(module, "Everything_IsDBLoaded"),
            versions: [
                optional(module, "Everything_GetMajorVersion"),
                optional(module, "Everything_GetMinorVersion"),
                optional(module, "Everything_GetRevision"),
                optional(module, "Everything_GetBuildNumber"),
            ],
            reset: required(module, "Everything_Reset")?,
            clean_up: required(module, "Everything_CleanUp")?,
        })
    }
}

unsafe fn optional<T: Copy>(module: HMODULE, name: &str) -> Option<T> {
    let symbol = CString::new(name).ok()?;
    let proc = GetProcAddress(module, PCSTR(symbol.as_ptr() as *const u8))?;
    // 入口表里的类型都是与 FARPROC 等宽的函数指针
    Some(std::mem::transmute_copy(&proc))
}

unsafe fn required<T: Copy>(module: HMODULE, name: &'static str) -> Result<T> {
    optional(module, name).ok_or(SearchError::MissingEntryPoint(name))
}

fn to_wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

unsafe fn wide_ptr_to_string(ptr: *const u16) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    Some(String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len)))
}

/// 已加载的 Everything64.dll
///
/// 模块句柄是裸指针，所以这个类型既不是 `Send` 也不是 `Sync`。
pub struct LoadedSdk {
    module: HMODULE,
    location: String,
    api: EntryPoints,
}

impl LoadedSdk {
    /// 加载顺序：显式路径；否则 exe 同级 lib 目录、exe 目录、当前目录，最后交给系统搜索路径
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut checked = Vec::new();
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => {
                let mut dirs = config::bundled_dirs();
                if let Ok(cwd) = std::env::current_dir() {
                    dirs.push(cwd);
                }
                let mut paths = Vec::new();
                for path in dirs.into_iter().map(|d| d.join(config::SDK_LIBRARY)) {
                    if path.is_file() {
                        paths.push(path);
                    } else {
                        checked.push(path.display().to_string());
                    }
                }
                // 交给系统 DLL 搜索路径
                paths.push(PathBuf::from(config::SDK_LIBRARY));
                paths
            }
        };

        for candidate in candidates {
            let wide = to_wide(candidate.as_os_str());
            match unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) } {
                Ok(module) => {
                    let api = match unsafe { EntryPoints::bind(module) } {
                        Ok(api) => api,
                        Err(e) => {
                            unsafe {
                                let _ = FreeLibrary(module);
                            }
                            return Err(e);
                        }
                    };
                    let location = candidate.display().to_string();
                    info!(%location, "已加载 Everything SDK");
                    return Ok(Self { module, location, api });
                }
                Err(e) => {
                    debug!(path = %candidate.display(), error = %e, "加载 SDK 失败");
                    checked.push(candidate.display().to_string());
                }
            }
        }
        Err(SearchError::LibraryNotFound { checked })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn date_getter(&self, field: DateField) -> Option<DateGetter> {
        let slot = DATE_FIELDS.iter().position(|f| *f == field)?;
        self.api.dates[slot]
    }

    fn string_getter(&self, field: StringField) -> Option<PointerGetter> {
        let slot = STRING_FIELDS.iter().position(|f| *f == field)?;
        self.api.strings[slot]
    }
}

impl Drop for LoadedSdk {
    fn drop(&mut self) {
        unsafe {
            let _ = FreeLibrary(self.module);
        }
    }
}

impl EverythingSdk for LoadedSdk {
    fn set_search(&mut self, pattern: &str) {
        let wide = to_wide(OsStr::new(pattern));
        unsafe { (self.api.set_search)(wide.as_ptr()) }
    }

    fn set_match_path(&mut self, enable: bool) {
        unsafe { (self.api.set_match_path)(enable as i32) }
    }

    fn set_match_case(&mut self, enable: bool) {
        if let Some(f) = self.api.set_match_case {
            unsafe { f(enable as i32) }
        }
    }

    fn set_match_whole_word(&mut self, enable: bool) {
        if let Some(f) = self.api.set_match_whole_word {
            unsafe { f(enable as i32) }
        }
    }

    fn set_regex(&mut self, enable: bool) {
        if let Some(f) = self.api.set_regex {
            unsafe { f(enable as i32) }
        }
    }

    fn set_offset(&mut self, offset: u32) {
        unsafe { (self.api.set_offset)(offset) }
    }

    fn set_max(&mut self, max: u32) {
        unsafe { (self.api.set_max)(max) }
    }

    fn set_request_flags(&mut self, flags: u32) {
        unsafe { (self.api.set_request_flags)(flags) }
    }

    fn set_sort(&mut self, sort: u32) {
        if let Some(f) = self.api.set_sort {
            unsafe { f(sort) }
        }
    }

    fn query(&mut self) -> bool {
        unsafe { (self.api.query)(1) != 0 }
    }

    fn num_results(&self) -> u32 {
        unsafe { (self.api.num_results)() }
    }

    fn result_full_path(&self, index: u32, buf: &mut [u16]) -> u32 {
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let ptr = if buf.is_empty() {
            std::ptr::null_mut()
        } else {
            buf.as_mut_ptr()
        };
        unsafe { (self.api.full_path)(index, ptr, len) }
    }

    fn result_size(&self, index: u32) -> Option<i64> {
        let mut size = 0i64;
        let ok = unsafe { (self.api.size)(index, &mut size) };
        (ok != 0).then_some(size)
    }

    fn result_date(&self, field: DateField, index: u32) -> Option<u64> {
        let getter = self.date_getter(field)?;
        let mut ft = FILETIME::default();
        let ok = unsafe { getter(index, &mut ft) };
        (ok != 0).then(|| timestamp::ticks_from_parts(ft.dwLowDateTime, ft.dwHighDateTime))
    }

    fn result_attributes(&self, index: u32) -> u32 {
        match self.api.attributes {
            Some(f) => unsafe { f(index) },
            None => INVALID_FILE_ATTRIBUTES,
        }
    }

    fn result_run_count(&self, index: u32) -> u32 {
        match self.api.run_count {
            Some(f) => unsafe { f(index) },
            None => 0,
        }
    }

    fn result_string_buffer(&self, _field: StringField, _index: u32, _buf: &mut [u16]) -> Option<u32> {
        // DLL 里这些字段只有指针返回形式
        None
    }

    fn result_string_pointer(&self, field: StringField, index: u32) -> Option<String> {
        let getter = self.string_getter(field)?;
        unsafe { wide_ptr_to_string(getter(index)) }
    }

    fn last_error(&self) -> u32 {
        unsafe { (self.api.last_error)() }
    }

    fn is_db_loaded(&self) -> bool {
        match self.api.is_db_loaded {
            Some(f) => unsafe { f() != 0 },
            None => false,
        }
    }

    fn version(&self) -> SdkVersion {
        let read = |slot: usize| match self.api.versions[slot] {
            Some(f) => unsafe { f() },
            None => 0,
        };
        SdkVersion {
            major: read(0),
            minor: read(1),
            revision: read(2),
            build: read(3),
        }
    }

    fn reset(&mut self) {
        unsafe { (self.api.reset)() }
    }

    fn clean_up(&mut self) {
        unsafe { (self.api.clean_up)() }
    }
}
