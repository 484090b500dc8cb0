//! Configuration loading for MargaNav

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub mission: MissionConfig,
    #[serde(default)]
    pub grid: GridConfig,
}

/// Serial link settings
#[derive(Clone, Debug, Deserialize)]
pub struct LinkConfig {
    /// Serial device path (default: /dev/serial0)
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate (default: 9600)
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Outbound byte budget per second (default: 480, half of 9600 baud)
    #[serde(default = "default_bytes_per_sec")]
    pub bytes_per_sec: f64,

    /// Maximum bytes per single write (default: 48)
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,

    /// Fixed delay between chunks in milliseconds (default: 5)
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    /// Outbound queue capacity in frames (default: 64)
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

/// Telemetry emission settings
#[derive(Clone, Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Target telemetry rate in Hz; also the control loop tick rate (default: 5.0)
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Number of travelled-path points included in each telemetry frame (default: 30)
    #[serde(default = "default_travel_tail")]
    pub travel_tail: usize,
}

/// Mission and vehicle parameters
#[derive(Clone, Debug, Deserialize)]
pub struct MissionConfig {
    /// Vehicle speed in m/s (default: 1.5)
    #[serde(default = "default_speed_ms")]
    pub speed_ms: f64,

    /// Default exclusion radius registered for a detected hazard, in meters (default: 10.0)
    #[serde(default = "default_obstacle_buffer")]
    pub obstacle_buffer_m: f64,

    /// Safe corridor width; detours clear obstacles by half this margin (default: 2.5)
    #[serde(default = "default_path_width")]
    pub path_width_m: f64,

    /// Range at which a ground-truth hazard becomes detected in simulation (default: 2.0)
    #[serde(default = "default_detection_range")]
    pub detection_range_m: f64,

    /// Distance at which a waypoint counts as reached (default: 0.05)
    #[serde(default = "default_arrival_tolerance")]
    pub arrival_tolerance_m: f64,

    /// Wait for a scan reply before entering a cell, in seconds (default: 60.0)
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_s: f64,

    /// Simulated detection mode; when false each step is gated on a remote scan (default: true)
    #[serde(default = "default_simulate")]
    pub simulate: bool,

    /// Axis-step length of the backtrack route in meters (default: 1.0)
    #[serde(default = "default_backtrack_step")]
    pub backtrack_step_m: f64,

    /// Display scale echoed to the operator console; not used for planning (default: 0.01)
    #[serde(default = "default_metres_per_cm")]
    pub metres_per_cm: f64,
}

/// Planning grid dimensions for the grid backend
#[derive(Clone, Debug, Deserialize)]
pub struct GridConfig {
    /// Grid width in meters, centered on the origin (default: 1000.0)
    #[serde(default = "default_grid_extent")]
    pub width_m: f64,

    /// Grid height in meters, centered on the origin (default: 1000.0)
    #[serde(default = "default_grid_extent")]
    pub height_m: f64,

    /// Cell size in meters (default: 1.0)
    #[serde(default = "default_grid_resolution")]
    pub resolution_m: f64,
}

// Default value functions
fn default_port() -> String {
    "/dev/serial0".to_string()
}
fn default_baud() -> u32 {
    9600
}
fn default_bytes_per_sec() -> f64 {
    480.0
}
fn default_chunk_bytes() -> usize {
    48
}
fn default_chunk_delay_ms() -> u64 {
    5
}
fn default_outbound_capacity() -> usize {
    64
}
fn default_rate_hz() -> f64 {
    5.0
}
fn default_travel_tail() -> usize {
    30
}
fn default_speed_ms() -> f64 {
    1.5
}
fn default_obstacle_buffer() -> f64 {
    10.0
}
fn default_path_width() -> f64 {
    2.5
}
fn default_detection_range() -> f64 {
    2.0
}
fn default_arrival_tolerance() -> f64 {
    0.05
}
fn default_scan_timeout() -> f64 {
    60.0
}
fn default_simulate() -> bool {
    true
}
fn default_backtrack_step() -> f64 {
    1.0
}
fn default_metres_per_cm() -> f64 {
    0.01
}
fn default_grid_extent() -> f64 {
    1000.0
}
fn default_grid_resolution() -> f64 {
    1.0
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
            bytes_per_sec: default_bytes_per_sec(),
            chunk_bytes: default_chunk_bytes(),
            chunk_delay_ms: default_chunk_delay_ms(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            travel_tail: default_travel_tail(),
        }
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            speed_ms: default_speed_ms(),
            obstacle_buffer_m: default_obstacle_buffer(),
            path_width_m: default_path_width(),
            detection_range_m: default_detection_range(),
            arrival_tolerance_m: default_arrival_tolerance(),
            scan_timeout_s: default_scan_timeout(),
            simulate: default_simulate(),
            backtrack_step_m: default_backtrack_step(),
            metres_per_cm: default_metres_per_cm(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width_m: default_grid_extent(),
            height_m: default_grid_extent(),
            resolution_m: default_grid_resolution(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::NavError::Config(format!("failed to read config: {}", e)))?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
