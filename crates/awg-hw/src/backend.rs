use std::{
    fs::OpenOptions,
    os::fd::AsRawFd,
    path::Path,
    sync::atomic::{Ordering, fence},
};

use tracing::{info, warn};

use crate::error::HwError;

/// Abstracts the two memory-mapped register windows so the rest of the
/// crate (and its tests) never touch `/dev/mem` directly.
pub trait HwBackend: Send {
    /// Write `word` to the DATA/VALUE register.
    fn write_data(&mut self, word: u32);
    /// Drive the WEN line to its active (`true`) or inactive (`false`) level.
    fn set_wen(&mut self, active: bool);
    /// Unmap and release the backing descriptor. Idempotent.
    fn close(&mut self);
}

/// Real backend: two `mmap`-ed 4 KiB windows over a physical memory device
/// (`/dev/mem` in production, an arbitrary regular file in tests).
pub struct MmapBackend {
    data_ptr: *mut u32,
    wen_ptr: *mut u32,
    window_len: usize,
    active_high: bool,
    closed: bool,
}

// SAFETY: the raw pointers only ever address mmap'd device memory and all
// accesses go through volatile reads/writes with an explicit fence; there is
// no thread-local or non-Send state hiding behind them.
unsafe impl Send for MmapBackend {}

impl MmapBackend {
    /// Map `data_base` and `wen_base`, each `window_len` bytes, from
    /// `mem_device`. Drives DATA to 0 and WEN to its inactive level before
    /// returning.
    pub fn open(
        mem_device: &Path,
        data_base: usize,
        wen_base: usize,
        window_len: usize,
        active_high: bool,
    ) -> Result<Self, HwError> {
        if data_base % page_size() != 0 || wen_base % page_size() != 0 {
            return Err(HwError::InvalidBase);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(mem_device)
            .map_err(|e| HwError::MapFailed(e.raw_os_error().unwrap_or(-1)))?;
        let fd = file.as_raw_fd();

        let data_ptr = map_window(fd, data_base, window_len)?;
        let wen_ptr = map_window(fd, wen_base, window_len)?;

        // `file` can be dropped once mapped: the mapping keeps the pages alive.
        drop(file);

        let mut backend = Self { data_ptr, wen_ptr, window_len, active_high, closed: false };
        backend.write_data(0);
        backend.set_wen(false);
        info!(?data_base, ?wen_base, window_len, "AWG register windows mapped");
        Ok(backend)
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf with a well-known name never fails in a way that
    // invalidates memory safety; a negative result just means "unknown".
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 { sz as usize } else { 4096 }
}

fn map_window(fd: i32, base: usize, len: usize) -> Result<*mut u32, HwError> {
    // SAFETY: fd is a valid, open file descriptor for the lifetime of this
    // call; the returned pointer is checked against MAP_FAILED before use.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            base as libc::off_t,
        )
    };
    if ptr == libc::MAP_FAILED {
        // SAFETY: reading errno immediately after the failing syscall.
        let errno = unsafe { *libc::__errno_location() };
        return Err(HwError::MapFailed(errno));
    }
    Ok(ptr.cast::<u32>())
}

impl HwBackend for MmapBackend {
    #[inline]
    fn write_data(&mut self, word: u32) {
        // SAFETY: data_ptr is a live mapping of at least one u32's worth of
        // device memory for as long as `self` is not closed.
        unsafe { std::ptr::write_volatile(self.data_ptr, word) };
        fence(Ordering::SeqCst);
    }

    #[inline]
    fn set_wen(&mut self, active: bool) {
        let level: u32 = if active { u32::from(self.active_high) } else { u32::from(!self.active_high) };
        // SAFETY: wen_ptr is a live mapping of at least one u32's worth of
        // device memory for as long as `self` is not closed.
        unsafe { std::ptr::write_volatile(self.wen_ptr, level) };
        fence(Ordering::SeqCst);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        // SAFETY: both pointers were produced by a successful mmap of
        // `window_len` bytes each and are only unmapped once.
        unsafe {
            libc::munmap(self.data_ptr.cast(), self.window_len);
            libc::munmap(self.wen_ptr.cast(), self.window_len);
        }
        self.closed = true;
        info!("AWG register windows unmapped");
    }
}

impl Drop for MmapBackend {
    fn drop(&mut self) {
        if !self.closed {
            warn!("MmapBackend dropped without close(); unmapping now");
            self.close();
        }
    }
}
