use crate::error::TrackerError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TOKEN: &str = "123456";
pub const DEFAULT_PORT: u16 = 8888;
/// User-supplied ports must stay out of the privileged range.
pub const MIN_PORT: u16 = 1024;

/// Shared-secret token and listening port for the data server. Fixed for the
/// lifetime of a running server; changing the port means a server restart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: String,
    pub port: u16,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            token: DEFAULT_TOKEN.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Read-only token lookup the server performs on every request, so a rotated
/// token takes effect without a restart.
pub trait TokenSource: Send + Sync {
    fn current_token(&self) -> String;
}

/// JSON prefs file holding the token and port. Reads always go back to disk;
/// nothing is cached.
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    /// Open the store, persisting the defaults if the file does not exist
    /// yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TrackerError> {
        let store = PrefsStore { path: path.into() };
        if !store.path.exists() {
            store.write(&AuthConfig::default())?;
        }
        Ok(store)
    }

    /// Fresh read of the prefs file. Unreadable or malformed contents fall
    /// back to the defaults; an out-of-range persisted port is replaced by
    /// the default port.
    pub fn load(&self) -> AuthConfig {
        let mut config = fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str::<AuthConfig>(&text).ok())
            .unwrap_or_default();

        if config.port < MIN_PORT {
            warn!(
                "persisted port {} is out of range, using {}",
                config.port, DEFAULT_PORT
            );
            config.port = DEFAULT_PORT;
        }
        config
    }

    /// Persist a new token.
    pub fn set_token(&self, token: &str) -> Result<(), TrackerError> {
        let mut config = self.load();
        config.token = token.to_string();
        self.write(&config)
    }

    /// Persist a new port. Values outside 1024-65535 are rejected here; the
    /// server never validates the port itself.
    pub fn set_port(&self, port: u16) -> Result<(), TrackerError> {
        if port < MIN_PORT {
            return Err(TrackerError::InvalidPort(port));
        }
        let mut config = self.load();
        config.port = port;
        self.write(&config)
    }

    fn write(&self, config: &AuthConfig) -> Result<(), TrackerError> {
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| TrackerError::Config(e.into()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenSource for PrefsStore {
    fn current_token(&self) -> String {
        self.load().token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempPrefs(PathBuf);

    impl TempPrefs {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "gps_prefs_{}_{}.json",
                name,
                std::process::id()
            ));
            let _ = fs::remove_file(&path);
            TempPrefs(path)
        }
    }

    impl Drop for TempPrefs {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn open_persists_defaults() {
        let tmp = TempPrefs::new("defaults");
        let store = PrefsStore::open(&tmp.0).unwrap();

        assert!(tmp.0.exists());
        assert_eq!(store.load(), AuthConfig::default());
        assert_eq!(store.current_token(), DEFAULT_TOKEN);
    }

    #[test]
    fn privileged_ports_are_rejected() {
        let tmp = TempPrefs::new("port_range");
        let store = PrefsStore::open(&tmp.0).unwrap();

        assert!(matches!(
            store.set_port(80),
            Err(TrackerError::InvalidPort(80))
        ));
        // The rejected write left the stored port untouched.
        assert_eq!(store.load().port, DEFAULT_PORT);

        store.set_port(9000).unwrap();
        assert_eq!(store.load().port, 9000);
    }

    #[test]
    fn token_rotation_is_visible_on_next_load() {
        let tmp = TempPrefs::new("rotation");
        let store = PrefsStore::open(&tmp.0).unwrap();

        store.set_token("s3cret").unwrap();
        assert_eq!(store.current_token(), "s3cret");

        // A second handle over the same file sees the rotated token without
        // any restart.
        let other = PrefsStore::open(&tmp.0).unwrap();
        assert_eq!(other.current_token(), "s3cret");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = TempPrefs::new("malformed");
        fs::write(&tmp.0, "not json").unwrap();

        let store = PrefsStore::open(&tmp.0).unwrap();
        assert_eq!(store.load(), AuthConfig::default());
    }

    #[test]
    fn out_of_range_persisted_port_is_replaced_on_load() {
        let tmp = TempPrefs::new("bad_port");
        fs::write(&tmp.0, r#"{"token":"t","port":80}"#).unwrap();

        let store = PrefsStore::open(&tmp.0).unwrap();
        let config = store.load();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.token, "t");
    }
}
