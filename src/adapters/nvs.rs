//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] on top of its own [`StoragePort`].  The
//! configuration lives as one postcard blob under `wfms/syscfg`.
//!
//! On the host every `(namespace, key)` blob is a file
//! `<root>/<namespace>/<key>`, replaced through a temporary file and a
//! rename so a crash mid-write leaves the previous blob intact.  On the
//! board the same API is backed by the flash key-value store, whose page
//! size bounds every blob to [`MAX_BLOB_SIZE`].

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;
use crate::mesh::NetworkConfig;

const CONFIG_NAMESPACE: &str = "wfms";
const CONFIG_KEY: &str = "syscfg";

/// Largest blob a single key may hold.
pub const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    root: PathBuf,
}

impl NvsAdapter {
    /// Store blobs under `root`.  The directory is created on first write.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("NvsAdapter: blobs under {}", root.display());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root.join(namespace).join(key)
    }

    /// Shared by [`StoragePort::write`] and [`ConfigPort::save`], which
    /// only has `&self`.
    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        let path = self.blob_path(namespace, key);
        write_replace(&path, data).map_err(|e| {
            warn!("NvsAdapter: writing {} failed: {}", path.display(), e);
            StorageError::Backend
        })
    }
}

fn write_replace(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
}

/// Range-check every persisted field.
///
/// A zero command timeout is legal: it disables the in-flight timeout.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    let rules: [(bool, &'static str); 6] = [
        (
            NetworkConfig::channel_valid(cfg.network.channel),
            "channel must be 11..=26",
        ),
        (
            cfg.thresholds.open() < cfg.thresholds.close(),
            "open_th must be < close_th",
        ),
        (
            cfg.dedup_window_ms > 0 && cfg.debounce_ms > 0,
            "guard windows must be non-zero",
        ),
        (cfg.join_window_ms > 0, "join window must be non-zero"),
        (
            cfg.data_check_interval_ms > 0
                && cfg.data_force_interval_ms > 0
                && cfg.heartbeat_interval_ms > 0,
            "report intervals must be non-zero",
        ),
        (cfg.tick_interval_ms > 0, "tick interval must be non-zero"),
    ];
    match rules.iter().find(|(ok, _)| !ok) {
        Some(&(_, rule)) => Err(ConfigError::Invalid(rule)),
        None => Ok(()),
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut blob = vec![0u8; MAX_BLOB_SIZE];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut blob) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: nothing stored, starting from defaults");
                return Ok(SystemConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        let cfg: SystemConfig =
            postcard::from_bytes(&blob[..len]).map_err(|_| ConfigError::Corrupted)?;
        if let Err(e) = validate_config(&cfg) {
            warn!("NvsAdapter: stored config rejected ({})", e);
            return Err(e);
        }
        info!(
            "NvsAdapter: loaded config, pan 0x{:04X} ch {} ({} bytes)",
            cfg.network.pan_id, cfg.network.channel, len
        );
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let blob = postcard::to_allocvec(config).map_err(|_| ConfigError::Corrupted)?;
        if blob.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::TooLarge);
        }
        self.put(CONFIG_NAMESPACE, CONFIG_KEY, &blob)?;
        info!("NvsAdapter: config saved ({} bytes)", blob.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let path = self.blob_path(namespace, key);
        let data = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound,
            _ => {
                warn!("NvsAdapter: reading {} failed: {}", path.display(), e);
                StorageError::Backend
            }
        })?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(namespace, key, data)
    }
}
