//! Build stamp and service description for `feelme version` and
//! `GET /version`.
//!
//! Release builds set `FEELME_COMMIT` and `FEELME_BUILD_DATE` in the
//! environment of `cargo build`.

use std::fmt;

use serde::Serialize;

use crate::booking::ExpiryPolicy;

const fn stamp(value: Option<&'static str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "unknown",
    }
}

/// Where this binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_date: &'static str,
}

pub const BUILD: Build = Build {
    version: env!("CARGO_PKG_VERSION"),
    commit: stamp(option_env!("FEELME_COMMIT")),
    build_date: stamp(option_env!("FEELME_BUILD_DATE")),
};

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, built {})", self.version, self.commit, self.build_date)
    }
}

/// The running service: build stamp plus the expiry rules it enforces.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub success: bool,
    pub service: &'static str,
    #[serde(flatten)]
    pub build: Build,
    pub timezone: &'static str,
    pub grace_minutes: i64,
}

impl ServiceInfo {
    pub fn new(policy: &ExpiryPolicy) -> Self {
        Self {
            success: true,
            service: env!("CARGO_PKG_NAME"),
            build: BUILD,
            timezone: policy.timezone.name(),
            grace_minutes: policy.grace.num_minutes(),
        }
    }
}
