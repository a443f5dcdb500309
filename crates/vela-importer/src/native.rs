//! Native extension loading
//!
//! Cross-platform dynamic library support for extension modules. An
//! extension ships as a shared library exporting the init entry point
//!
//! ```c
//! int vela_module_init(void);
//! ```
//!
//! which registers the module's functions with the host runtime and returns
//! zero on success. The library handle must stay alive for as long as the
//! module is importable; the importer keeps loaded handles for the process
//! lifetime.

use std::ffi::CString;
use std::os::raw::c_int;
use std::path::Path;

use thiserror::Error;

/// Symbol every extension module must export.
pub const ENTRY_SYMBOL: &str = "vela_module_init";

/// Errors that can occur while loading an extension module.
#[derive(Debug, Error)]
pub enum NativeLoadError {
    /// Library file could not be opened by the dynamic linker
    #[error("cannot open extension library: {path}")]
    OpenFailed {
        /// Path plus the linker's own diagnostic
        path: String,
    },

    /// Entry symbol missing from the library
    #[error("symbol {symbol} not found in {library}")]
    SymbolNotFound { symbol: String, library: String },

    /// Entry point ran and reported failure
    #[error("{ENTRY_SYMBOL} in {library} returned status {status}")]
    InitFailed { library: String, status: i32 },

    /// Path is not representable for the platform loader
    #[error("invalid extension path: {0}")]
    InvalidPath(String),
}

/// Cross-platform dynamic library handle.
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl Library {
    /// Load a shared library with the platform's dynamic linker.
    ///
    /// Unix uses `dlopen(RTLD_NOW | RTLD_LOCAL)`; Windows uses
    /// `LoadLibraryW`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, NativeLoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| NativeLoadError::InvalidPath(format!("{path_ref:?}")))?;

        let handle = LibraryHandle::load(path_str)?;
        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Resolve [`ENTRY_SYMBOL`] and run it.
    ///
    /// A nonzero status from the entry point is an initialization failure.
    pub fn initialize_module(&self) -> Result<(), NativeLoadError> {
        type InitFn = extern "C" fn() -> c_int;

        // Safety: the entry point contract fixes the signature of
        // ENTRY_SYMBOL; the handle outlives the call.
        let init: InitFn = unsafe { self.handle.symbol(ENTRY_SYMBOL, &self.path)? };
        let status = init();
        if status != 0 {
            return Err(NativeLoadError::InitFailed {
                library: self.path.clone(),
                status,
            });
        }
        Ok(())
    }

    /// The path this library was loaded from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix implementation (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, NativeLoadError> {
        let c_path = CString::new(path)
            .map_err(|_| NativeLoadError::InvalidPath(path.to_string()))?;

        let handle = unsafe {
            // RTLD_NOW: resolve all symbols immediately
            // RTLD_LOCAL: symbols not visible to later loads
            libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL)
        };

        if handle.is_null() {
            return Err(NativeLoadError::OpenFailed {
                path: format!("{path}: {}", last_dl_error()),
            });
        }

        Ok(UnixLibrary { handle })
    }

    unsafe fn symbol<T>(&self, name: &str, lib_path: &str) -> Result<T, NativeLoadError> {
        let c_name = CString::new(name)
            .map_err(|_| NativeLoadError::InvalidPath(name.to_string()))?;

        // Clear any stale error state before the lookup.
        libc::dlerror();
        let symbol = libc::dlsym(self.handle, c_name.as_ptr());

        if symbol.is_null() || !libc::dlerror().is_null() {
            return Err(NativeLoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: lib_path.to_string(),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown error".to_string()
        } else {
            std::ffi::CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

// Safety: the handle is only used for symbol lookup, which the platform
// loaders allow from any thread.
#[cfg(unix)]
unsafe impl Send for UnixLibrary {}
#[cfg(unix)]
unsafe impl Sync for UnixLibrary {}

// ============================================================================
// Windows implementation
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(windows)]
impl WindowsLibrary {
    fn load(path: &str) -> Result<Self, NativeLoadError> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            let error = unsafe { GetLastError() };
            return Err(NativeLoadError::OpenFailed {
                path: format!("{path} (error code: {error})"),
            });
        }

        Ok(WindowsLibrary { handle })
    }

    unsafe fn symbol<T>(&self, name: &str, lib_path: &str) -> Result<T, NativeLoadError> {
        let c_name = CString::new(name)
            .map_err(|_| NativeLoadError::InvalidPath(name.to_string()))?;

        let symbol = GetProcAddress(self.handle, c_name.as_ptr());
        if symbol.is_null() {
            return Err(NativeLoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: lib_path.to_string(),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(windows)]
impl Drop for WindowsLibrary {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

#[cfg(windows)]
unsafe impl Send for WindowsLibrary {}
#[cfg(windows)]
unsafe impl Sync for WindowsLibrary {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut std::ffi::c_void;
    fn GetProcAddress(
        module: *mut std::ffi::c_void,
        procname: *const i8,
    ) -> *mut std::ffi::c_void;
    fn FreeLibrary(module: *mut std::ffi::c_void) -> i32;
    fn GetLastError() -> u32;
}
