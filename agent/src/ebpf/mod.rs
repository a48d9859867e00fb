//! eBPF program management

pub mod exit_tracer;
pub mod kernel;
pub mod loader;
pub mod maps;

pub use exit_tracer::ExitTracer;
pub use kernel::KernelVersion;
pub use maps::KernelMaps;
