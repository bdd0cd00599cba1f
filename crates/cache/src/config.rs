//! Streamer configuration for tuning limits, timeouts and cache locations.
//!
//! This module provides a centralized configuration for the streaming cache.
//! Configuration can be loaded from a file, environment variables, or created
//! programmatically.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Configuration for the texture streaming cache.
///
/// Covers the fetch scheduler's sweep sizing, the importance estimator's
/// tuning constants, eviction timeouts and the on-disk cache location.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamerConfig {
    /// GPU texture budget in bytes; utilization against it drives the
    /// global discard bias
    pub gpu_budget_bytes: usize,

    /// Minimum number of resources examined per fetch sweep
    pub fetch_slice_min: usize,

    /// Fraction of the registry examined per fetch sweep
    pub fetch_slice_fraction: f32,

    /// Extra camera-direction weighting applied to centered consumers
    pub camera_boost: f32,

    /// Lower clamp for the per-face texture repeat scale
    pub texture_scale_min: f32,

    /// Upper clamp for the per-face texture repeat scale
    pub texture_scale_max: f32,

    /// Bias above which footprint accumulators of off-screen,
    /// unboosted resources are reset
    pub decay_bias_threshold: f32,

    /// Consumer fan-out above which per-consumer scanning is skipped
    /// and the resource is pinned to high priority
    pub fan_out_threshold: usize,

    /// Ticks after which a visibility sample no longer counts as on-screen
    pub sample_staleness_ticks: u64,

    /// Minimum downscale-queue entries processed per tick, budget or not
    pub min_downscale_batch: usize,

    /// Idle seconds before an unreferenced resource is evicted
    pub eviction_idle_secs: u64,

    /// Idle seconds before a last-good fallback buffer is released
    pub last_good_idle_secs: u64,

    /// Seconds between eviction sweeps
    pub sweep_interval_secs: u64,

    /// Maximum number of entries persisted in the prefetch manifest
    pub manifest_cap: usize,

    /// Whether the on-disk fast cache is consulted at all; when disabled,
    /// every resource goes through the full fetch path
    pub fast_cache_enabled: bool,

    /// Root directory for the fast cache and the prefetch manifest
    pub cache_dir: PathBuf,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            gpu_budget_bytes: 512 * 1024 * 1024, // 512 MB
            fetch_slice_min: 32,
            fetch_slice_fraction: 0.05,
            camera_boost: 7.0,
            texture_scale_min: 0.0095,
            texture_scale_max: 25.0,
            decay_bias_threshold: 1.5,
            fan_out_threshold: 1024,
            sample_staleness_ticks: 2,
            min_downscale_batch: 5,
            eviction_idle_secs: 30,
            last_good_idle_secs: 60,
            sweep_interval_secs: 1,
            manifest_cap: 1000,
            fast_cache_enabled: true,
            cache_dir: Self::default_cache_dir(),
        }
    }
}

impl StreamerConfig {
    /// Sets the GPU texture budget in megabytes.
    pub fn with_gpu_budget_mb(mut self, mb: usize) -> Self {
        self.gpu_budget_bytes = mb * 1024 * 1024;
        self
    }

    /// Sets the cache root directory.
    pub fn with_cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_dir = path.as_ref().to_path_buf();
        self
    }

    /// Sets the eviction idle timeout in seconds.
    pub fn with_eviction_idle_secs(mut self, secs: u64) -> Self {
        self.eviction_idle_secs = secs;
        self
    }

    /// Sets the last-good fallback release timeout in seconds.
    pub fn with_last_good_idle_secs(mut self, secs: u64) -> Self {
        self.last_good_idle_secs = secs;
        self
    }

    /// Sets the prefetch manifest entry cap.
    pub fn with_manifest_cap(mut self, cap: usize) -> Self {
        self.manifest_cap = cap;
        self
    }

    /// Sets the minimum downscale batch processed per tick.
    pub fn with_min_downscale_batch(mut self, count: usize) -> Self {
        self.min_downscale_batch = count;
        self
    }

    /// Enables or disables the on-disk fast cache.
    pub fn with_fast_cache_enabled(mut self, enabled: bool) -> Self {
        self.fast_cache_enabled = enabled;
        self
    }

    /// Returns the GPU budget in megabytes.
    pub fn gpu_budget_mb(&self) -> usize {
        self.gpu_budget_bytes / (1024 * 1024)
    }

    /// Directory holding the fast cache entries.
    pub fn fast_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("fastcache")
    }

    /// Path of the persisted prefetch manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.cache_dir.join("manifest.json")
    }

    /// Returns the default cache directory for the current platform.
    ///
    /// - macOS: ~/Library/Caches/texture-streamer
    /// - Linux: ~/.cache/texture-streamer
    /// - Windows: %LOCALAPPDATA%\texture-streamer
    pub fn default_cache_dir() -> PathBuf {
        if let Some(cache_dir) = dirs::cache_dir() {
            cache_dir.join("texture-streamer")
        } else {
            // Fallback to current directory if cache dir unavailable
            PathBuf::from("cache/texture-streamer")
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TEXSTREAM_GPU_BUDGET_MB`: GPU texture budget in MB (default: 512)
    /// - `TEXSTREAM_EVICTION_IDLE_SECS`: eviction idle timeout (default: 30)
    /// - `TEXSTREAM_MANIFEST_CAP`: prefetch manifest cap (default: 1000)
    /// - `TEXSTREAM_FAST_CACHE_ENABLED`: consult the on-disk fast cache (default: true)
    /// - `TEXSTREAM_CACHE_DIR`: cache root directory
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TEXSTREAM_GPU_BUDGET_MB") {
            config.gpu_budget_bytes = val
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue("TEXSTREAM_GPU_BUDGET_MB".to_string()))?
                * 1024
                * 1024;
        }

        if let Ok(val) = std::env::var("TEXSTREAM_EVICTION_IDLE_SECS") {
            config.eviction_idle_secs = val.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue("TEXSTREAM_EVICTION_IDLE_SECS".to_string())
            })?;
        }

        if let Ok(val) = std::env::var("TEXSTREAM_MANIFEST_CAP") {
            config.manifest_cap = val
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue("TEXSTREAM_MANIFEST_CAP".to_string()))?;
        }

        if let Ok(val) = std::env::var("TEXSTREAM_FAST_CACHE_ENABLED") {
            config.fast_cache_enabled = val.parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue("TEXSTREAM_FAST_CACHE_ENABLED".to_string())
            })?;
        }

        if let Ok(val) = std::env::var("TEXSTREAM_CACHE_DIR") {
            config.cache_dir = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format:
    /// ```toml
    /// gpu_budget_mb = 512
    /// eviction_idle_secs = 30
    /// last_good_idle_secs = 60
    /// manifest_cap = 1000
    /// min_downscale_batch = 5
    /// fast_cache_enabled = true
    /// cache_dir = "/path/to/cache"
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(ConfigError::IoError)?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in toml_str.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "gpu_budget_mb" => {
                        config.gpu_budget_bytes = value
                            .parse::<usize>()
                            .map_err(|_| ConfigError::InvalidValue(key.to_string()))?
                            * 1024
                            * 1024;
                    }
                    "eviction_idle_secs" => {
                        config.eviction_idle_secs = value
                            .parse::<u64>()
                            .map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
                    }
                    "last_good_idle_secs" => {
                        config.last_good_idle_secs = value
                            .parse::<u64>()
                            .map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
                    }
                    "manifest_cap" => {
                        config.manifest_cap = value
                            .parse::<usize>()
                            .map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
                    }
                    "min_downscale_batch" => {
                        config.min_downscale_batch = value
                            .parse::<usize>()
                            .map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
                    }
                    "fast_cache_enabled" => {
                        config.fast_cache_enabled = value
                            .parse::<bool>()
                            .map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
                    }
                    "cache_dir" => {
                        config.cache_dir = PathBuf::from(value);
                    }
                    _ => {} // Ignore unknown keys
                }
            }
        }

        Ok(config)
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml = self.to_toml();
        fs::write(path.as_ref(), toml).map_err(ConfigError::IoError)
    }

    /// Converts configuration to TOML format.
    fn to_toml(&self) -> String {
        format!(
            "# Texture Streamer Configuration\n\
             gpu_budget_mb = {}\n\
             eviction_idle_secs = {}\n\
             last_good_idle_secs = {}\n\
             manifest_cap = {}\n\
             min_downscale_batch = {}\n\
             fast_cache_enabled = {}\n\
             cache_dir = \"{}\"\n",
            self.gpu_budget_mb(),
            self.eviction_idle_secs,
            self.last_good_idle_secs,
            self.manifest_cap,
            self.min_downscale_batch,
            self.fast_cache_enabled,
            self.cache_dir.display()
        )
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    InvalidValue(String),
    /// I/O error reading or writing configuration file
    IoError(io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(key) => {
                write!(f, "Invalid value for configuration key: {}", key)
            }
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = StreamerConfig::default();
        assert_eq!(config.gpu_budget_bytes, 512 * 1024 * 1024);
        assert_eq!(config.fetch_slice_min, 32);
        assert_eq!(config.eviction_idle_secs, 30);
        assert_eq!(config.last_good_idle_secs, 60);
        assert_eq!(config.manifest_cap, 1000);
    }

    #[test]
    fn test_builder_methods() {
        let config = StreamerConfig::default()
            .with_gpu_budget_mb(1024)
            .with_eviction_idle_secs(10)
            .with_last_good_idle_secs(20)
            .with_manifest_cap(50)
            .with_min_downscale_batch(2)
            .with_fast_cache_enabled(false)
            .with_cache_dir("/custom/path");

        assert_eq!(config.gpu_budget_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.eviction_idle_secs, 10);
        assert_eq!(config.last_good_idle_secs, 20);
        assert_eq!(config.manifest_cap, 50);
        assert_eq!(config.min_downscale_batch, 2);
        assert!(!config.fast_cache_enabled);
        assert_eq!(config.cache_dir, PathBuf::from("/custom/path"));
    }

    #[test]
    fn test_derived_paths() {
        let config = StreamerConfig::default().with_cache_dir("/tmp/ts");
        assert_eq!(config.fast_cache_dir(), PathBuf::from("/tmp/ts/fastcache"));
        assert_eq!(
            config.manifest_path(),
            PathBuf::from("/tmp/ts/manifest.json")
        );
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // Save and restore env vars to avoid test pollution
        let _guard = EnvGuard::new(&[
            "TEXSTREAM_GPU_BUDGET_MB",
            "TEXSTREAM_EVICTION_IDLE_SECS",
            "TEXSTREAM_MANIFEST_CAP",
            "TEXSTREAM_FAST_CACHE_ENABLED",
            "TEXSTREAM_CACHE_DIR",
        ]);

        env::set_var("TEXSTREAM_GPU_BUDGET_MB", "256");
        env::set_var("TEXSTREAM_EVICTION_IDLE_SECS", "15");
        env::set_var("TEXSTREAM_MANIFEST_CAP", "100");
        env::set_var("TEXSTREAM_FAST_CACHE_ENABLED", "false");
        env::set_var("TEXSTREAM_CACHE_DIR", "/tmp/test-texstream");

        let config = StreamerConfig::from_env().unwrap();
        assert_eq!(config.gpu_budget_bytes, 256 * 1024 * 1024);
        assert_eq!(config.eviction_idle_secs, 15);
        assert_eq!(config.manifest_cap, 100);
        assert!(!config.fast_cache_enabled);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/test-texstream"));
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&[
            "TEXSTREAM_GPU_BUDGET_MB",
            "TEXSTREAM_EVICTION_IDLE_SECS",
            "TEXSTREAM_MANIFEST_CAP",
            "TEXSTREAM_FAST_CACHE_ENABLED",
            "TEXSTREAM_CACHE_DIR",
        ]);

        env::remove_var("TEXSTREAM_EVICTION_IDLE_SECS");
        env::remove_var("TEXSTREAM_MANIFEST_CAP");
        env::remove_var("TEXSTREAM_FAST_CACHE_ENABLED");
        env::remove_var("TEXSTREAM_CACHE_DIR");
        env::set_var("TEXSTREAM_GPU_BUDGET_MB", "128");

        let config = StreamerConfig::from_env().unwrap();
        assert_eq!(config.gpu_budget_bytes, 128 * 1024 * 1024);
        assert_eq!(config.eviction_idle_secs, 30); // default
        assert_eq!(config.manifest_cap, 1000); // default
        assert!(config.fast_cache_enabled); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&["TEXSTREAM_GPU_BUDGET_MB"]);

        env::set_var("TEXSTREAM_GPU_BUDGET_MB", "not_a_number");
        let result = StreamerConfig::from_env();
        assert!(result.is_err());
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = StreamerConfig::default()
            .with_gpu_budget_mb(128)
            .with_eviction_idle_secs(5)
            .with_fast_cache_enabled(false)
            .with_cache_dir("/tmp/cache");
        let toml = config.to_toml();
        let parsed = StreamerConfig::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            # Test configuration
            gpu_budget_mb = 256
            eviction_idle_secs = 12
            last_good_idle_secs = 24
            manifest_cap = 64
            min_downscale_batch = 3
            fast_cache_enabled = false
            cache_dir = "/tmp/test"
        "#;

        let config = StreamerConfig::from_toml(toml).unwrap();
        assert_eq!(config.gpu_budget_bytes, 256 * 1024 * 1024);
        assert_eq!(config.eviction_idle_secs, 12);
        assert_eq!(config.last_good_idle_secs, 24);
        assert_eq!(config.manifest_cap, 64);
        assert_eq!(config.min_downscale_batch, 3);
        assert!(!config.fast_cache_enabled);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/test"));
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
            gpu_budget_mb = 64
        "#;

        let config = StreamerConfig::from_toml(toml).unwrap();
        assert_eq!(config.gpu_budget_bytes, 64 * 1024 * 1024);
        assert_eq!(config.eviction_idle_secs, 30); // default
    }

    #[test]
    fn test_from_toml_invalid_value() {
        let toml = "manifest_cap = lots";
        assert!(StreamerConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_file_save_and_load() {
        let temp_dir = std::env::temp_dir();
        let config_path = temp_dir.join("test_streamer_config.toml");

        let config = StreamerConfig::default()
            .with_gpu_budget_mb(96)
            .with_cache_dir("/tmp/cache");
        config.save_to_file(&config_path).unwrap();

        let loaded = StreamerConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);

        // Cleanup
        let _ = fs::remove_file(config_path);
    }
}
