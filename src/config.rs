// SPDX-License-Identifier: MIT
//! Process configuration, sourced from environment variables.
//!
//! * `APP_BIND_ADDR` – listen address (default `0.0.0.0:8080`).
//! * `RUST_ENV` – comma-separated active profiles (default `default`;
//!   only `dev` mirrors process events locally).
//! * Telemetry variables are documented on [`crate::telemetry::TelemetryConfig`].
use std::net::SocketAddr;

use anyhow::{Context, Result};

use crate::telemetry::TelemetryConfig;

/// Profile that turns on local mirroring of process events.
pub const DIAGNOSTIC_PROFILE: &str = "dev";

/// Profile active when `RUST_ENV` is unset; never diagnostic.
pub const DEFAULT_PROFILE: &str = "default";

/// Active deployment profiles (e.g. `dev`, `prod`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment {
    profiles: Vec<String>,
}

impl Environment {
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            profiles: profiles.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated profile list; blank entries are dropped.
    pub fn parse(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_ascii_lowercase),
        )
    }

    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var("RUST_ENV").ok().as_deref())
    }

    fn from_env_value(raw: Option<&str>) -> Self {
        Self::parse(raw.unwrap_or(DEFAULT_PROFILE))
    }

    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    pub fn accepts_profile(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p.eq_ignore_ascii_case(profile))
    }

    /// Whether process events are mirrored to the local log stream.
    pub fn is_diagnostic(&self) -> bool {
        self.accepts_profile(DIAGNOSTIC_PROFILE)
    }
}

/// Everything the binary needs at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw_addr = std::env::var("APP_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
        let environment = Environment::from_env();
        let mut telemetry = TelemetryConfig::default();
        telemetry.deployment_environment = environment.profiles().join(",");
        Ok(Self {
            bind_addr: parse_bind_addr(&raw_addr)?,
            environment,
            telemetry,
        })
    }
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid APP_BIND_ADDR `{raw}`"))
}
