//! Error types for the agent library

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("unknown syscall `{0}`")]
    UnknownSyscall(String),
    #[error("syscall id {id} outside the syscall table (size {max})")]
    SyscallOutOfRange { id: u32, max: u32 },
    #[error("dispatch range {range} must be between 1 and {max}")]
    DispatchRange { range: u32, max: u32 },
    #[error("filter for {syscall}: argument index {index} out of range")]
    ArgIndex { syscall: String, index: u32 },
    #[error("filter for {syscall}: prefix {prefix:?} must be 1..={max} bytes without NUL")]
    InvalidPrefix {
        syscall: String,
        prefix: String,
        max: usize,
    },
    #[error("suppression cache needs at least one slot")]
    EmptyCache,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("syscall id {id} outside the dispatch table (size {size})")]
    OutOfRange { id: u32, size: u32 },
}
