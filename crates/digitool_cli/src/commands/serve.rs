//! Serve command implementation.

use clap::Args;
use digitool_server::{Server, ServerConfig};
use std::path::PathBuf;
use tracing::info;

/// Options of `digi serve`. Flags override the configuration file.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

impl ServeArgs {
    /// Resolves the effective server configuration.
    pub fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(host) = self.host {
            config = config.with_host(host);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(data_dir) = self.data_dir {
            config = config.with_data_dir(data_dir);
        }
        Ok(config)
    }
}

/// Runs the server until Ctrl-C.
pub fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::open(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(server.run(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn flags_override_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("digitool.json");
        fs::write(&path, br#"{"port": 9000, "host": "0.0.0.0", "timeout": 5}"#).unwrap();

        let args = ServeArgs {
            config: Some(path),
            host: None,
            port: Some(9100),
            data_dir: Some(temp.path().join("data")),
        };
        let config = args.into_config().unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9100");
        assert_eq!(config.timeout, 5);
        assert_eq!(config.data_dir, temp.path().join("data"));
    }

    #[test]
    fn defaults_without_file() {
        let args = ServeArgs {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert_eq!(args.into_config().unwrap(), ServerConfig::default());
    }
}
