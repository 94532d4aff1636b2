//! Process memory pressure.
//!
//! # Responsibilities
//! - Sample resident memory against the memory budget
//! - Classify the ratio: above 90% unhealthy, above 75% degraded
//!
//! # Design Decisions
//! - The budget is the configured limit when set, host memory otherwise
//! - Sampling sits behind `MemorySource` so thresholds are testable
//!   without a real process
//! - A zero total is a broken reading and reports unhealthy

use std::io;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::health::probe::Probe;
use crate::health::status::{HealthState, ServiceStatus};

pub const DEGRADED_RATIO: f64 = 0.75;
pub const UNHEALTHY_RATIO: f64 = 0.90;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Largest `limit_mb` whose byte count fits in a `u64`.
pub const MAX_LIMIT_MB: u64 = u64::MAX / (1024 * 1024);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("memory limit of {0} MB overflows a byte count")]
pub struct MemoryLimitOverflow(pub u64);

/// One reading of memory usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MemorySample {
    pub fn ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64
    }

    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 * 100.0 / self.total_bytes as f64
    }
}

/// Classify a usage ratio.
pub fn classify(ratio: f64) -> HealthState {
    if ratio > UNHEALTHY_RATIO {
        HealthState::Unhealthy
    } else if ratio > DEGRADED_RATIO {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}

/// Where memory readings come from.
#[async_trait]
pub trait MemorySource: Send + Sync {
    /// `Ok(None)` when sampling is unsupported on this platform.
    async fn sample(&self) -> io::Result<Option<MemorySample>>;
}

/// Reads `/proc` on Linux.
pub struct ProcMemorySource {
    limit_bytes: Option<u64>,
}

impl ProcMemorySource {
    pub fn new(limit_mb: Option<u64>) -> Result<Self, MemoryLimitOverflow> {
        let limit_bytes = match limit_mb {
            Some(mb) => Some(mb.checked_mul(1024 * 1024).ok_or(MemoryLimitOverflow(mb))?),
            None => None,
        };
        Ok(Self { limit_bytes })
    }
}

#[async_trait]
impl MemorySource for ProcMemorySource {
    #[cfg(target_os = "linux")]
    async fn sample(&self) -> io::Result<Option<MemorySample>> {
        let status = tokio::fs::read_to_string("/proc/self/status").await?;
        let used_bytes = parse_kib_field(&status, "VmRSS:").ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "VmRSS missing from /proc/self/status")
        })?;

        let total_bytes = match self.limit_bytes {
            Some(limit) => limit,
            None => {
                let meminfo = tokio::fs::read_to_string("/proc/meminfo").await?;
                parse_kib_field(&meminfo, "MemTotal:").ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "MemTotal missing from /proc/meminfo")
                })?
            }
        };

        Ok(Some(MemorySample {
            used_bytes,
            total_bytes,
        }))
    }

    #[cfg(not(target_os = "linux"))]
    async fn sample(&self) -> io::Result<Option<MemorySample>> {
        Ok(None)
    }
}

/// Parse a `Key:   1234 kB` line into bytes.
pub(crate) fn parse_kib_field(contents: &str, key: &str) -> Option<u64> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse::<u64>().ok())
        .and_then(|kib| kib.checked_mul(1024))
}

pub struct MemoryProbe {
    source: Box<dyn MemorySource>,
}

impl MemoryProbe {
    pub fn new(source: impl MemorySource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl Probe for MemoryProbe {
    fn name(&self) -> &str {
        "memory"
    }

    async fn check(&self) -> ServiceStatus {
        let sample = match self.source.sample().await {
            Ok(Some(sample)) => sample,
            Ok(None) => return ServiceStatus::not_configured(),
            Err(e) => return ServiceStatus::unhealthy(format!("memory sampling failed: {e}")),
        };
        if sample.total_bytes == 0 {
            return ServiceStatus::unhealthy("memory total reported as zero")
                .with_detail("usedMb", json!(mb(sample.used_bytes)));
        }

        let percentage = sample.percentage();
        let status = match classify(sample.ratio()) {
            HealthState::Unhealthy => {
                ServiceStatus::unhealthy(format!("memory usage at {percentage:.1}%"))
            }
            HealthState::Degraded => {
                ServiceStatus::degraded(format!("memory usage at {percentage:.1}%"))
            }
            _ => ServiceStatus::healthy(),
        };

        status
            .with_detail("usedMb", json!(mb(sample.used_bytes)))
            .with_detail("totalMb", json!(mb(sample.total_bytes)))
            .with_detail("percentage", json!(percentage))
    }
}

fn mb(bytes: u64) -> u64 {
    (bytes as f64 / BYTES_PER_MB).round() as u64
}
