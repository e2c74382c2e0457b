//! Minimal runtime configuration helpers. Everything comes from the
//! environment; only the account credentials are mandatory.

use crate::models::tado::{HomeId, OverlayMode};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub tado_username: String,
    pub tado_password: String,
    /// Home to bridge. When unset the account's first home is used.
    pub home_id: Option<HomeId>,
    /// Cadence of the vendor poll loop.
    pub poll_interval: Duration,
    /// Overlay mode applied when a command does not request one.
    pub overlay_fallback: Option<OverlayMode>,
    /// Optional JSON manifest seeding the vacuum device registry.
    pub vacuum_manifest: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let tado_username = match std::env::var("TADO_USERNAME") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return Err("Missing credentials: set TADO_USERNAME".to_string()),
        };
        let tado_password = match std::env::var("TADO_PASSWORD") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return Err("Missing credentials: set TADO_PASSWORD".to_string()),
        };

        let home_id = match std::env::var("HOME_ID") {
            Ok(s) if !s.trim().is_empty() => Some(HomeId(
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| "HOME_ID must be a numeric home id".to_string())?,
            )),
            _ => None,
        };

        let poll_secs = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_SECS);

        let overlay_fallback = match std::env::var("OVERLAY_FALLBACK") {
            Ok(s) if !s.trim().is_empty() => Some(OverlayMode::from_name(s.trim()).ok_or_else(|| {
                format!(
                    "OVERLAY_FALLBACK must be one of TADO_MODE, NEXT_TIME_BLOCK, MANUAL, TIMER, TADO_DEFAULT (got {})",
                    s.trim()
                )
            })?),
            _ => None,
        };

        let vacuum_manifest = std::env::var("VACUUM_MANIFEST")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Config {
            tado_username,
            tado_password,
            home_id,
            poll_interval: Duration::from_secs(poll_secs),
            overlay_fallback,
            vacuum_manifest,
        })
    }
}
