use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_API_PORT: u16 = 3000;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct KiteaConfig {
    pub api_port: u16,
    pub public_url: String,
    pub paths: KiteaPaths,
    pub photos: PhotoConfig,
}

impl KiteaConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("KITEA_BASE_DIR") {
            Ok(raw) if !raw.trim().is_empty() => KiteaPaths::from_base_dir(raw.trim())?,
            _ => KiteaPaths::discover()?,
        };
        let api_port = env::var("KITEA_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_API_PORT);
        let public_url = env::var("KITEA_PUBLIC_URL")
            .ok()
            .map(|raw| raw.trim().trim_end_matches('/').to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| default_public_url(api_port));
        let photos = PhotoConfig::from_env();
        Ok(Self {
            api_port,
            public_url,
            paths,
            photos,
        })
    }

    pub fn new(api_port: u16, paths: KiteaPaths) -> Self {
        Self {
            api_port,
            public_url: default_public_url(api_port),
            paths,
            photos: PhotoConfig::default(),
        }
    }
}

fn default_public_url(api_port: u16) -> String {
    format!("http://localhost:{api_port}")
}

#[derive(Debug, Clone)]
pub struct PhotoConfig {
    pub max_upload_bytes: u64,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl PhotoConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = env::var("KITEA_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        Self { max_upload_bytes }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KiteaPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub files_dir: PathBuf,
    pub photos_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl KiteaPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("kitea.db");
        let files_dir = base.join("files");
        let photos_dir = files_dir.join("photos");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            files_dir,
            photos_dir,
            logs_dir,
        })
    }
}
