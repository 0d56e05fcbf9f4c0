use std::{
    ffi::OsStr,
    os::windows::prelude::{AsHandle, AsRawHandle, HandleOrInvalid, OsStrExt, OwnedHandle, RawHandle},
    ptr::{null, null_mut},
};

use windows_sys::Win32::{
    Foundation::{GetLastError, HANDLE, WIN32_ERROR},
    Storage::FileSystem::{CreateFileW, FILE_FLAG_OVERLAPPED, FILE_SHARE_MODE, OPEN_EXISTING},
};

/// Wrapper around `CreateFile` for overlapped device I/O
pub fn create_file(
    path: &OsStr,
    access: u32,
    share_mode: FILE_SHARE_MODE,
) -> Result<OwnedHandle, WIN32_ERROR> {
    let wide_name: Vec<u16> = path.encode_wide().chain(Some(0)).collect();

    unsafe {
        let r = CreateFileW(
            wide_name.as_ptr(),
            access,
            share_mode,
            null(),
            OPEN_EXISTING,
            FILE_FLAG_OVERLAPPED,
            null_mut(),
        );
        HandleOrInvalid::from_raw_handle(r as RawHandle)
            .try_into()
            .map_err(|_| GetLastError())
    }
}

pub fn raw_handle(h: impl AsHandle) -> HANDLE {
    h.as_handle().as_raw_handle() as HANDLE
}

/// Decode a fixed-size buffer filled with a string that is nul-terminated
/// unless it fills the whole buffer.
pub fn from_wide_buffer(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

#[test]
fn test_wide_strings() {
    let wide: Vec<u16> = "Macropad\0".encode_utf16().collect();
    assert_eq!(from_wide_buffer(&wide[..3]), "Mac");

    let mut buf = [0u16; 16];
    buf[..wide.len()].copy_from_slice(&wide);
    assert_eq!(from_wide_buffer(&buf), "Macropad");
    assert_eq!(from_wide_buffer(&[]), "");
}
