use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::{AsFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::ffi;

/// A virtual path backed by a file descriptor the embedder handed us. The
/// descriptor is owned and closed when the registration is dropped.
pub struct VfsFile {
    virtual_path: String,
    fd: OwnedFd,
}

impl VfsFile {
    pub fn new(virtual_path: impl Into<String>, fd: OwnedFd) -> Self {
        Self {
            virtual_path: virtual_path.into(),
            fd,
        }
    }

    /// Takes ownership of a raw descriptor.
    ///
    /// # Safety
    /// `fd` must be open and not owned elsewhere.
    pub unsafe fn from_raw_fd(virtual_path: impl Into<String>, fd: RawFd) -> Self {
        Self::new(virtual_path, OwnedFd::from_raw_fd(fd))
    }

    pub fn virtual_path(&self) -> &str {
        &self.virtual_path
    }

    /// Re-opens the backing descriptor as an independent read-only file
    /// (dup semantics: the registered fd stays valid).
    pub fn reopen(&self) -> std::io::Result<File> {
        let dup = self.fd.as_fd().try_clone_to_owned()?;
        let mut file = File::from(dup);
        file.seek(SeekFrom::Start(0))?;
        Ok(file)
    }
}

static REGISTRY: Lazy<Mutex<Vec<VfsFile>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn register(files: Vec<VfsFile>) {
    *REGISTRY.lock() = files;
}

pub fn reset() {
    REGISTRY.lock().clear();
}

/// Reads the whole content behind a registered virtual path; used when a
/// core wants game bytes rather than a path.
pub fn read_virtual(path: &str) -> Option<Vec<u8>> {
    let registry = REGISTRY.lock();
    let file = registry.iter().find(|f| f.virtual_path == path)?;
    let mut data = Vec::new();
    file.reopen().ok()?.read_to_end(&mut data).ok()?;
    Some(data)
}

/// One open stream as seen by the core. Lives behind the opaque
/// `ffi::VfsFileHandle` pointer.
pub struct VfsStream {
    file: File,
    path: CString,
    size: i64,
}

static INTERFACE: ffi::VfsInterface = ffi::VfsInterface {
    get_path: vfs_get_path,
    open: vfs_open,
    close: vfs_close,
    size: vfs_size,
    tell: vfs_tell,
    seek: vfs_seek,
    read: vfs_read,
    write: vfs_write,
    flush: vfs_flush,
    remove: vfs_remove,
    rename: vfs_rename,
    truncate: vfs_truncate,
};

/// Pointer handed to cores through `GET_VFS_INTERFACE`.
pub fn interface() -> *mut ffi::VfsInterface {
    &INTERFACE as *const _ as *mut _
}

unsafe fn stream<'a>(handle: *mut ffi::VfsFileHandle) -> Option<&'a mut VfsStream> {
    handle.cast::<VfsStream>().as_mut()
}

unsafe extern "C" fn vfs_get_path(handle: *mut ffi::VfsFileHandle) -> *const c_char {
    match stream(handle) {
        Some(stream) => stream.path.as_ptr(),
        None => std::ptr::null(),
    }
}

unsafe extern "C" fn vfs_open(
    path: *const c_char,
    mode: c_uint,
    _hints: c_uint,
) -> *mut ffi::VfsFileHandle {
    if path.is_null() {
        return std::ptr::null_mut();
    }
    let Ok(path) = CStr::from_ptr(path).to_str() else {
        return std::ptr::null_mut();
    };

    let opened = open_virtual(path).or_else(|| open_native(path, mode));
    match opened {
        Some(stream) => Box::into_raw(Box::new(stream)).cast(),
        None => std::ptr::null_mut(),
    }
}

fn open_virtual(path: &str) -> Option<VfsStream> {
    let registry = REGISTRY.lock();
    let virtual_file = registry.iter().find(|f| f.virtual_path == path)?;

    debug!(path, "opening virtual file");

    let file = virtual_file
        .reopen()
        .map_err(|err| warn!(path, %err, "failed to dup virtual file"))
        .ok()?;
    let size = file.metadata().map(|m| m.len() as i64).unwrap_or(0);

    Some(VfsStream {
        file,
        path: CString::new(path).ok()?,
        size,
    })
}

fn open_native(path: &str, mode: c_uint) -> Option<VfsStream> {
    let mut options = OpenOptions::new();
    options.read(mode & ffi::VFS_FILE_ACCESS_READ != 0);

    if mode & ffi::VFS_FILE_ACCESS_WRITE != 0 {
        options.write(true);
        if mode & ffi::VFS_FILE_ACCESS_UPDATE_EXISTING == 0 {
            options.create(true).truncate(true);
        }
    }

    let file = match options.open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!(path, %err, "native open failed");
            return None;
        }
    };
    let size = file.metadata().map(|m| m.len() as i64).unwrap_or(0);

    Some(VfsStream {
        file,
        path: CString::new(path).ok()?,
        size,
    })
}

unsafe extern "C" fn vfs_close(handle: *mut ffi::VfsFileHandle) -> c_int {
    if handle.is_null() {
        return -1;
    }
    drop(Box::from_raw(handle.cast::<VfsStream>()));
    0
}

unsafe extern "C" fn vfs_size(handle: *mut ffi::VfsFileHandle) -> i64 {
    match stream(handle) {
        Some(stream) => stream
            .file
            .metadata()
            .map(|m| m.len() as i64)
            .unwrap_or(stream.size),
        None => -1,
    }
}

unsafe extern "C" fn vfs_tell(handle: *mut ffi::VfsFileHandle) -> i64 {
    match stream(handle) {
        Some(stream) => stream
            .file
            .stream_position()
            .map(|p| p as i64)
            .unwrap_or(-1),
        None => -1,
    }
}

unsafe extern "C" fn vfs_seek(
    handle: *mut ffi::VfsFileHandle,
    offset: i64,
    seek_position: c_int,
) -> i64 {
    let Some(stream) = stream(handle) else {
        return -1;
    };

    let target = match seek_position {
        ffi::VFS_SEEK_POSITION_START => SeekFrom::Start(offset.max(0) as u64),
        ffi::VFS_SEEK_POSITION_CURRENT => SeekFrom::Current(offset),
        ffi::VFS_SEEK_POSITION_END => SeekFrom::End(offset),
        _ => return -1,
    };

    stream.file.seek(target).map(|p| p as i64).unwrap_or(-1)
}

unsafe extern "C" fn vfs_read(handle: *mut ffi::VfsFileHandle, s: *mut c_void, len: u64) -> i64 {
    let Some(stream) = stream(handle) else {
        return -1;
    };
    if s.is_null() {
        return -1;
    }

    let out = std::slice::from_raw_parts_mut(s.cast::<u8>(), len as usize);
    let mut total = 0usize;
    // A short read before EOF is legal for File; the VFS contract wants the
    // full requested span when available.
    while total < out.len() {
        match stream.file.read(&mut out[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(_) => return -1,
        }
    }
    total as i64
}

unsafe extern "C" fn vfs_write(
    handle: *mut ffi::VfsFileHandle,
    s: *const c_void,
    len: u64,
) -> i64 {
    let Some(stream) = stream(handle) else {
        return -1;
    };
    if s.is_null() {
        return -1;
    }

    let data = std::slice::from_raw_parts(s.cast::<u8>(), len as usize);
    match stream.file.write_all(data) {
        Ok(()) => len as i64,
        Err(_) => -1,
    }
}

unsafe extern "C" fn vfs_flush(handle: *mut ffi::VfsFileHandle) -> c_int {
    match stream(handle) {
        Some(stream) => stream.file.flush().map(|_| 0).unwrap_or(-1),
        None => -1,
    }
}

unsafe extern "C" fn vfs_remove(path: *const c_char) -> c_int {
    if path.is_null() {
        return -1;
    }
    let Ok(path) = CStr::from_ptr(path).to_str() else {
        return -1;
    };
    std::fs::remove_file(Path::new(path)).map(|_| 0).unwrap_or(-1)
}

unsafe extern "C" fn vfs_rename(old_path: *const c_char, new_path: *const c_char) -> c_int {
    if old_path.is_null() || new_path.is_null() {
        return -1;
    }
    let (Ok(old_path), Ok(new_path)) = (
        CStr::from_ptr(old_path).to_str(),
        CStr::from_ptr(new_path).to_str(),
    ) else {
        return -1;
    };
    std::fs::rename(old_path, new_path).map(|_| 0).unwrap_or(-1)
}

unsafe extern "C" fn vfs_truncate(handle: *mut ffi::VfsFileHandle, length: i64) -> i64 {
    let Some(stream) = stream(handle) else {
        return -1;
    };
    if length < 0 {
        return -1;
    }
    stream.file.set_len(length as u64).map(|_| 0).unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn with_open<T>(path: &str, mode: c_uint, f: impl FnOnce(*mut ffi::VfsFileHandle) -> T) -> T {
        let c_path = CString::new(path).unwrap();
        let handle = unsafe { vfs_open(c_path.as_ptr(), mode, 0) };
        assert!(!handle.is_null(), "open failed for {path}");
        let result = f(handle);
        assert_eq!(unsafe { vfs_close(handle) }, 0);
        result
    }

    #[test]
    fn virtual_open_reads_registered_content_and_keeps_fd_valid() {
        let mut backing = tempfile::NamedTempFile::new().unwrap();
        let content: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
        backing.write_all(&content).unwrap();
        backing.flush().unwrap();

        let fd: OwnedFd = backing.reopen().unwrap().into();
        register(vec![VfsFile::new("/rom.bin", fd)]);

        with_open("/rom.bin", ffi::VFS_FILE_ACCESS_READ, |handle| unsafe {
            assert_eq!(vfs_size(handle), 1024);
            assert_eq!(vfs_seek(handle, 0, ffi::VFS_SEEK_POSITION_START), 0);

            let mut out = vec![0u8; 1024];
            let read = vfs_read(handle, out.as_mut_ptr().cast(), 1024);
            assert_eq!(read, 1024);
            assert_eq!(out, content);
        });

        // The registered descriptor survived the dup + close.
        let again = read_virtual("/rom.bin").unwrap();
        assert_eq!(again, content);

        reset();
    }

    #[test]
    fn unknown_path_falls_through_to_native_filesystem() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"native bytes").unwrap();
        file.flush().unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        with_open(&path, ffi::VFS_FILE_ACCESS_READ, |handle| unsafe {
            let mut out = [0u8; 12];
            assert_eq!(vfs_read(handle, out.as_mut_ptr().cast(), 12), 12);
            assert_eq!(&out, b"native bytes");
        });
    }

    #[test]
    fn seek_tell_and_partial_reads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        with_open(&path, ffi::VFS_FILE_ACCESS_READ, |handle| unsafe {
            assert_eq!(vfs_seek(handle, 4, ffi::VFS_SEEK_POSITION_START), 4);
            assert_eq!(vfs_tell(handle), 4);

            let mut out = [0u8; 3];
            assert_eq!(vfs_read(handle, out.as_mut_ptr().cast(), 3), 3);
            assert_eq!(&out, b"456");

            assert_eq!(vfs_seek(handle, -2, ffi::VFS_SEEK_POSITION_END), 8);
            let mut out = [0u8; 8];
            assert_eq!(vfs_read(handle, out.as_mut_ptr().cast(), 8), 2);
        });
    }

    #[test]
    fn write_and_truncate_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.srm");
        let path_str = path.to_str().unwrap().to_owned();

        with_open(
            &path_str,
            ffi::VFS_FILE_ACCESS_READ_WRITE,
            |handle| unsafe {
                assert_eq!(vfs_write(handle, b"abcdef".as_ptr().cast(), 6), 6);
                assert_eq!(vfs_flush(handle), 0);
                assert_eq!(vfs_truncate(handle, 3), 0);
            },
        );

        assert_eq!(std::fs::read(&path).unwrap(), b"abc");

        let c_path = CString::new(path_str).unwrap();
        assert_eq!(unsafe { vfs_remove(c_path.as_ptr()) }, 0);
        assert!(!path.exists());
    }

    #[test]
    fn open_missing_file_read_only_fails() {
        let c_path = CString::new("/definitely/not/here.bin").unwrap();
        let handle = unsafe { vfs_open(c_path.as_ptr(), ffi::VFS_FILE_ACCESS_READ, 0) };
        assert!(handle.is_null());
    }
}
