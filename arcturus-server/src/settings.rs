use anyhow::Context;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Paths and bind address, resolved once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub arcturus_root: PathBuf,
    pub tileserver_config_path: PathBuf,
    pub tileserver_binary_path: PathBuf,
    pub frontend_dist_path: PathBuf,
    pub listen_addr: SocketAddr,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;

        let arcturus_root = match lookup("ARCTURUS_ROOT") {
            Some(value) => absolute(&cwd, Path::new(&value)),
            None => cwd.clone(),
        };

        let tileserver_config_path = match lookup("TILESERVER_CONFIG_PATH") {
            Some(value) => absolute(&cwd, Path::new(&value)),
            None => arcturus_root.join("tileserver.config.toml"),
        };

        let tileserver_binary_path = match lookup("TILESERVER_RS_BINARY") {
            Some(value) => resolve_binary(&cwd, &value),
            None => arcturus_root
                .parent()
                .unwrap_or(&arcturus_root)
                .join("tileserver-rs")
                .join("target")
                .join("release")
                .join("tileserver-rs"),
        };

        let frontend_dist_path = match lookup("FRONTEND_DIST_PATH") {
            Some(value) => absolute(&cwd, Path::new(&value)),
            None => arcturus_root.join("frontend").join("dist"),
        };

        let listen_addr = lookup("ARCTURUS_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr: SocketAddr = listen_addr
            .parse()
            .with_context(|| format!("Invalid ARCTURUS_LISTEN_ADDR: {}", listen_addr))?;

        Ok(Self {
            arcturus_root,
            tileserver_config_path,
            tileserver_binary_path,
            frontend_dist_path,
            listen_addr,
        })
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// A bare program name is looked up on PATH; anything else is a path
fn resolve_binary(cwd: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.components().count() == 1 && !path.is_absolute() {
        if let Ok(found) = which::which(value) {
            return found;
        }
    }
    absolute(cwd, path)
}
