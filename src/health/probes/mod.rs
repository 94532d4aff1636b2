//! Concrete dependency probes.

pub mod filesystem;
pub mod integration;
pub mod memory;
pub mod resource;

pub use filesystem::FilesystemProbe;
pub use integration::HttpIntegrationProbe;
pub use memory::{
    MemoryLimitOverflow, MemoryProbe, MemorySample, MemorySource, ProcMemorySource, MAX_LIMIT_MB,
};
pub use resource::ResourceProbe;

/// Names reserved by the built-in probes.
pub const BUILTIN_PROBE_NAMES: [&str; 4] = ["database", "cache", "filesystem", "memory"];
