use thiserror::Error;

#[derive(Error, Debug)]
pub enum HwError {
    #[error("mmap of AWG register window failed (errno {0})")]
    MapFailed(i32),
    #[error("register window base address must be page aligned")]
    InvalidBase,
    #[error("HW layer already closed")]
    AlreadyClosed,
}
