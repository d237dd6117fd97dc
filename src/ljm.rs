use anyhow::{Context, Result};
use libloading::Library;
use log::{info, warn};
use once_cell::sync::OnceCell;
use std::ffi::{CStr, CString};
use std::net::Ipv4Addr;
use std::os::raw::{c_char, c_double, c_int};
use std::path::{Path, PathBuf};
use crate::drivers::{AcquisitionDevice, MonitorError};
// LJM_MAX_NAME_SIZE from LabJackM.h
const ERROR_STRING_SIZE: usize = 256;
#[cfg(target_os = "windows")]
const DEFAULT_LIBRARY: &str = "LabJackM.dll";
#[cfg(target_os = "macos")]
const DEFAULT_LIBRARY: &str = "libLabJackM.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_LIBRARY: &str = "libLabJackM.so";
struct LjmApi {
    #[allow(dead_code)]
    lib: Library,
    open_s: unsafe extern "C" fn(*const c_char, *const c_char, *const c_char, *mut c_int) -> c_int,
    close: unsafe extern "C" fn(c_int) -> c_int,
    get_handle_info: unsafe extern "C" fn(
        c_int,
        *mut c_int,
        *mut c_int,
        *mut c_int,
        *mut c_int,
        *mut c_int,
        *mut c_int,
    ) -> c_int,
    e_write_names:
        unsafe extern "C" fn(c_int, c_int, *const *const c_char, *const c_double, *mut c_int) -> c_int,
    e_read_names:
        unsafe extern "C" fn(c_int, c_int, *const *const c_char, *mut c_double, *mut c_int) -> c_int,
    error_to_string: unsafe extern "C" fn(c_int, *mut c_char),
}
impl LjmApi {
    fn load(path: &Path) -> Result<Self> {
        let lib = unsafe { Library::new(path) }
            .with_context(|| format!("LabJack LJM library not found at {}", path.display()))?;
        // Safety: signatures follow LabJackM.h.
        unsafe {
            Ok(Self {
                open_s: *lib.get(b"LJM_OpenS\0")?,
                close: *lib.get(b"LJM_Close\0")?,
                get_handle_info: *lib.get(b"LJM_GetHandleInfo\0")?,
                e_write_names: *lib.get(b"LJM_eWriteNames\0")?,
                e_read_names: *lib.get(b"LJM_eReadNames\0")?,
                error_to_string: *lib.get(b"LJM_ErrorToString\0")?,
                lib,
            })
        }
    }
    /// Loaded once per process; later calls ignore `path`.
    fn instance(path: Option<&Path>) -> Result<&'static LjmApi> {
        static API: OnceCell<LjmApi> = OnceCell::new();
        API.get_or_try_init(|| {
            let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY));
            Self::load(&path)
        })
    }
    fn describe_error(&self, code: c_int) -> String {
        let mut buf = [0 as c_char; ERROR_STRING_SIZE];
        unsafe { (self.error_to_string)(code, buf.as_mut_ptr()) };
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
        text.to_string_lossy().into_owned()
    }
    fn check(&self, code: c_int, ctx: &str) -> Result<(), MonitorError> {
        if code == 0 {
            Ok(())
        } else {
            Err(MonitorError::Device(format!(
                "{ctx} failed (LJM error {code}: {})",
                self.describe_error(code)
            )))
        }
    }
}
fn to_cstrings(names: &[String]) -> Result<Vec<CString>, MonitorError> {
    names
        .iter()
        .map(|name| {
            CString::new(name.as_str())
                .map_err(|_| MonitorError::Device(format!("register name `{name}` contains NUL")))
        })
        .collect()
}
/// Identity reported by `LJM_GetHandleInfo`.
#[derive(Clone, Copy, Debug)]
pub struct HandleInfo {
    pub device_type: i32,
    pub connection_type: i32,
    pub serial_number: i32,
    pub ip_address: Ipv4Addr,
    pub port: i32,
    pub max_bytes_per_mb: i32,
}
/// LabJack T-series device driven through the LJM shared library.
pub struct LjmDevice {
    api: &'static LjmApi,
    handle: c_int,
    info: HandleInfo,
    closed: bool,
}
impl LjmDevice {
    /// `LJM_OpenS(device_type, connection_type, identifier)`, e.g. `("T7", "ANY", "ANY")`.
    pub fn open(
        device_type: &str,
        connection_type: &str,
        identifier: &str,
        library_path: Option<&Path>,
    ) -> Result<Self> {
        let api = LjmApi::instance(library_path)?;
        let device_type_c = CString::new(device_type).context("device type contains NUL")?;
        let connection_c = CString::new(connection_type).context("connection type contains NUL")?;
        let identifier_c = CString::new(identifier).context("identifier contains NUL")?;
        let mut handle: c_int = 0;
        api.check(
            unsafe {
                (api.open_s)(
                    device_type_c.as_ptr(),
                    connection_c.as_ptr(),
                    identifier_c.as_ptr(),
                    &mut handle as *mut c_int,
                )
            },
            "LJM_OpenS",
        )?;
        let mut raw = [0 as c_int; 6];
        let info_code = unsafe {
            let [a, b, c, d, e, f] = &mut raw;
            (api.get_handle_info)(handle, a, b, c, d, e, f)
        };
        if let Err(err) = api.check(info_code, "LJM_GetHandleInfo") {
            unsafe { (api.close)(handle) };
            return Err(err.into());
        }
        let info = HandleInfo {
            device_type: raw[0],
            connection_type: raw[1],
            serial_number: raw[2],
            ip_address: Ipv4Addr::from(raw[3] as u32),
            port: raw[4],
            max_bytes_per_mb: raw[5],
        };
        info!(
            "Connected to LabJack {device_type} | Serial: {}, IP: {}",
            info.serial_number, info.ip_address
        );
        Ok(Self {
            api,
            handle,
            info,
            closed: false,
        })
    }
    fn ensure_open(&self) -> Result<(), MonitorError> {
        if self.closed {
            Err(MonitorError::Device("LJM handle already closed".into()))
        } else {
            Ok(())
        }
    }
}
impl AcquisitionDevice for LjmDevice {
    fn describe(&self) -> String {
        format!(
            "LabJack type {} serial {} at {} (connection {}, port {}, {} bytes/packet)",
            self.info.device_type,
            self.info.serial_number,
            self.info.ip_address,
            self.info.connection_type,
            self.info.port,
            self.info.max_bytes_per_mb
        )
    }
    fn configure(&mut self, settings: &[(String, f64)]) -> Result<(), MonitorError> {
        self.ensure_open()?;
        if settings.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = settings.iter().map(|(name, _)| name.clone()).collect();
        let values: Vec<c_double> = settings.iter().map(|(_, value)| *value).collect();
        let names_c = to_cstrings(&names)?;
        let ptrs: Vec<*const c_char> = names_c.iter().map(|n| n.as_ptr()).collect();
        let mut error_address: c_int = -1;
        let code = unsafe {
            (self.api.e_write_names)(
                self.handle,
                ptrs.len() as c_int,
                ptrs.as_ptr(),
                values.as_ptr(),
                &mut error_address as *mut c_int,
            )
        };
        self.api
            .check(code, &format!("LJM_eWriteNames (address {error_address})"))?;
        info!("Configured {} registers", settings.len());
        Ok(())
    }
    fn read_batch(&mut self, channel_names: &[String]) -> Result<Vec<f64>, MonitorError> {
        self.ensure_open()?;
        let names_c = to_cstrings(channel_names)?;
        let ptrs: Vec<*const c_char> = names_c.iter().map(|n| n.as_ptr()).collect();
        let mut values = vec![0.0 as c_double; ptrs.len()];
        let mut error_address: c_int = -1;
        let code = unsafe {
            (self.api.e_read_names)(
                self.handle,
                ptrs.len() as c_int,
                ptrs.as_ptr(),
                values.as_mut_ptr(),
                &mut error_address as *mut c_int,
            )
        };
        self.api
            .check(code, &format!("LJM_eReadNames (address {error_address})"))?;
        Ok(values)
    }
    fn close(&mut self) -> Result<(), MonitorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.api
            .check(unsafe { (self.api.close)(self.handle) }, "LJM_Close")?;
        info!("LabJack connection closed");
        Ok(())
    }
}
impl Drop for LjmDevice {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("{err}");
        }
    }
}
