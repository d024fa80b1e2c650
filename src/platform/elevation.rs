//! Privilege detection.
//!
//! Elevation is probed, not assumed: on Unix we try to open a file only root
//! can read, on Windows we ask the process token.

#[cfg(windows)]
pub fn is_elevated() -> bool {
    use std::mem;
    use std::ptr;
    use winapi::ctypes::c_void;

    unsafe {
        let mut handle: *mut c_void = ptr::null_mut();

        if winapi::um::processthreadsapi::OpenProcessToken(
            winapi::um::processthreadsapi::GetCurrentProcess(),
            winapi::um::winnt::TOKEN_QUERY,
            &mut handle,
        ) == 0
        {
            return false;
        }

        let mut elevation: winapi::um::winnt::TOKEN_ELEVATION = mem::zeroed();
        let mut size: u32 = 0;

        let result = winapi::um::securitybaseapi::GetTokenInformation(
            handle,
            winapi::um::winnt::TokenElevation,
            &mut elevation as *mut _ as *mut c_void,
            mem::size_of::<winapi::um::winnt::TOKEN_ELEVATION>() as u32,
            &mut size,
        );

        winapi::um::handleapi::CloseHandle(handle);

        result != 0 && elevation.TokenIsElevated != 0
    }
}

/// Files that are mode 0440/0400 root-owned on stock systems.
#[cfg(unix)]
const ROOT_ONLY_FILES: [&str; 2] = ["/etc/sudoers", "/etc/shadow"];

#[cfg(unix)]
pub fn is_elevated() -> bool {
    use std::path::Path;

    for path in ROOT_ONLY_FILES {
        if !Path::new(path).exists() {
            continue;
        }
        return match std::fs::File::open(path) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Privilege probe on {} failed: {}", path, e);
                false
            }
        };
    }

    // No probe file (Termux, minimal containers): fall back to the effective uid
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(any(unix, windows)))]
pub fn is_elevated() -> bool {
    false
}
