//! Configuration settings for NetCopy
//!
//! Defines the CLI arguments, the device connection settings and the
//! JSON device profile they can be loaded from.

use crate::error::{FileCopyError, IoResultExt, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default session timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// NetCopy - Verified SCP file transfer for network devices
#[derive(Parser, Debug, Clone)]
#[command(name = "netcopy")]
#[command(author = "NetCopy Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verified SCP file transfer for network devices")]
#[command(long_about = r#"
NetCopy copies a single file to or from a network device over SCP.

Before transferring it compares the MD5 of both sides and skips the copy when
the destination already matches. After transferring it recomputes both MD5
values and fails if they differ.

Examples:
  netcopy put ios.bin ios.bin -d admin@rtr1          # Upload to flash
  netcopy get running.cfg ./backup.cfg -d admin@rtr1 # Download from device
  netcopy put cfg.txt cfg.txt -d admin@rtr1 -f bootflash:
  netcopy space -d admin@rtr1                        # Free bytes on device
"#)]
pub struct CliArgs {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Device to connect to (user@host or user@host:port)
    #[arg(short = 'd', long, global = true, env = "NETCOPY_DEVICE", value_name = "USER@HOST")]
    pub device: Option<String>,

    /// SSH port (overrides the port in --device and the profile)
    #[arg(long, global = true, value_name = "PORT")]
    pub port: Option<u16>,

    /// SSH private key path
    #[arg(short = 'k', long, global = true, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Name of the environment variable holding the SSH password
    #[arg(long, global = true, value_name = "VAR")]
    pub password_env: Option<String>,

    /// Do not fall back to the SSH agent for authentication
    #[arg(long, global = true)]
    pub no_agent: bool,

    /// Session timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// JSON device profile to load connection settings from
    #[arg(long, global = true, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Device file system (e.g. flash:, bootflash:); auto-detected if omitted
    #[arg(short = 'f', long, global = true, value_name = "FS")]
    pub file_system: Option<String>,

    /// Output format for reports
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Copy a file from the control machine to the device
    #[command(name = "put")]
    Put {
        /// Local source file
        source: PathBuf,
        /// Destination file name on the device
        destination: String,
    },

    /// Copy a file from the device to the control machine
    #[command(name = "get")]
    Get {
        /// Source file name on the device
        source: String,
        /// Local destination file
        destination: PathBuf,
    },

    /// Print the MD5 of a local file
    #[command(name = "md5")]
    Md5 {
        /// Local file
        file: PathBuf,
    },

    /// Print the MD5 of a file on the device
    #[command(name = "remote-md5")]
    RemoteMd5 {
        /// File name on the device
        path: String,
    },

    /// Show free space on the device file system
    #[command(name = "space")]
    Space,

    /// Detect the default device file system
    #[command(name = "detect-fs")]
    DetectFs,
}

/// Direction of a transfer relative to the control machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Control machine to device
    Upload,
    /// Device to control machine
    Download,
}

impl Direction {
    /// Operation name used in messages and on the CLI
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Upload => "put",
            Self::Download => "get",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation())
    }
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Device connection settings, also the on-disk device profile
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Device hostname or IP
    pub host: String,
    /// Username
    pub user: String,
    /// Port
    pub port: u16,
    /// SSH key path
    pub key_path: Option<PathBuf>,
    /// Environment variable the password is read from
    pub password_env: Option<String>,
    /// Resolved password, never written back to a profile
    #[serde(skip)]
    pub password: Option<String>,
    /// Try SSH agent identities when no key or password is set
    pub use_agent: bool,
    /// Session timeout in seconds (0 = none)
    pub timeout_secs: u64,
    /// Device file system root; auto-detected if absent
    pub file_system: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            port: DEFAULT_SSH_PORT,
            key_path: None,
            password_env: None,
            password: None,
            use_agent: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            file_system: None,
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("key_path", &self.key_path)
            .field("password_env", &self.password_env)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("use_agent", &self.use_agent)
            .field("timeout_secs", &self.timeout_secs)
            .field("file_system", &self.file_system)
            .finish()
    }
}

impl RemoteConfig {
    /// Create settings for `user@host` on the default port
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// `host:port` socket address string
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Load a device profile from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).with_path(path)?;
        serde_json::from_str(&json)
            .map_err(|e| FileCopyError::config(format!("{}: {}", path.display(), e)))
    }

    /// Save as a JSON device profile
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_path(path)?;
        Ok(())
    }

    /// Build settings from CLI arguments, layered over an optional profile
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.profile {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(device) = &args.device {
            let (user, host, port) = parse_device(device).ok_or_else(|| {
                FileCopyError::config(format!("Invalid device '{}', expected user@host[:port]", device))
            })?;
            config.user = user;
            config.host = host;
            if let Some(port) = port {
                config.port = port;
            }
        }

        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(key) = &args.key {
            config.key_path = Some(key.clone());
        }
        if let Some(var) = &args.password_env {
            config.password_env = Some(var.clone());
        }
        if args.no_agent {
            config.use_agent = false;
        }
        if let Some(timeout) = args.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(fs) = &args.file_system {
            config.file_system = Some(fs.clone());
        }

        config.resolve_password()?;
        config.validate()?;
        Ok(config)
    }

    /// Read the password from the configured environment variable
    pub fn resolve_password(&mut self) -> Result<()> {
        if let Some(var) = &self.password_env {
            let password = std::env::var(var).map_err(|_| {
                FileCopyError::config(format!("Password variable '{}' is not set", var))
            })?;
            self.password = Some(password);
        }
        Ok(())
    }

    /// Check that the settings are usable for a connection
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(FileCopyError::config("No device host given (use --device or a profile)"));
        }
        if self.user.is_empty() {
            return Err(FileCopyError::config("No device user given"));
        }
        if self.port == 0 {
            return Err(FileCopyError::config("Port must be non-zero"));
        }
        if self.key_path.is_none() && self.password.is_none() && !self.use_agent {
            return Err(FileCopyError::config(
                "No authentication method: give --key, --password-env or allow the agent",
            ));
        }
        Ok(())
    }
}

/// Parse a device string (user@host, user@host:port or user@[v6]:port)
///
/// An unbracketed host with more than one `:` is taken as a bare IPv6
/// address without a port.
pub fn parse_device(device: &str) -> Option<(String, String, Option<u16>)> {
    let (user, host_port) = device.split_once('@')?;
    if user.is_empty() || host_port.is_empty() {
        return None;
    }

    let (host, port) = if let Some(rest) = host_port.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        match after {
            "" => (host, None),
            _ => (host, Some(after.strip_prefix(':')?.parse().ok()?)),
        }
    } else if host_port.matches(':').count() > 1 {
        (host_port, None)
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port.parse().ok()?)),
            None => (host_port, None),
        }
    };

    if host.is_empty() {
        return None;
    }

    Some((user.to_string(), host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_device() {
        assert_eq!(
            parse_device("admin@rtr1"),
            Some(("admin".to_string(), "rtr1".to_string(), None))
        );
        assert_eq!(
            parse_device("admin@10.0.0.1:2222"),
            Some(("admin".to_string(), "10.0.0.1".to_string(), Some(2222)))
        );
        assert!(parse_device("rtr1").is_none());
        assert!(parse_device("@rtr1").is_none());
        assert!(parse_device("admin@rtr1:ssh").is_none());
    }

    #[test]
    fn test_parse_device_ipv6() {
        assert_eq!(
            parse_device("admin@::1"),
            Some(("admin".to_string(), "::1".to_string(), None))
        );
        assert_eq!(
            parse_device("admin@[2001:db8::1]:2222"),
            Some(("admin".to_string(), "2001:db8::1".to_string(), Some(2222)))
        );
        assert_eq!(
            parse_device("admin@[fe80::1]"),
            Some(("admin".to_string(), "fe80::1".to_string(), None))
        );
        assert!(parse_device("admin@[::1]2222").is_none());
        assert!(parse_device("admin@[::1").is_none());
        assert!(parse_device("admin@[]:22").is_none());
    }

    #[test]
    fn test_address_brackets_ipv6() {
        assert_eq!(RemoteConfig::new("rtr1", "admin").address(), "rtr1:22");

        let mut config = RemoteConfig::new("2001:db8::1", "admin");
        config.port = 830;
        assert_eq!(config.address(), "[2001:db8::1]:830");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Upload.to_string(), "put");
        assert_eq!(Direction::Download.to_string(), "get");
        assert_eq!(serde_json::to_string(&Direction::Upload).unwrap(), "\"upload\"");
    }

    #[test]
    fn test_from_cli() {
        let cli = args(&[
            "netcopy", "put", "a.bin", "a.bin", "-d", "admin@rtr1:830", "-f", "bootflash:",
        ]);
        let config = RemoteConfig::from_cli(&cli).unwrap();
        assert_eq!(config.host, "rtr1");
        assert_eq!(config.user, "admin");
        assert_eq!(config.port, 830);
        assert_eq!(config.file_system.as_deref(), Some("bootflash:"));
        assert!(config.use_agent);
    }

    #[test]
    fn test_from_cli_requires_device() {
        let cli = args(&["netcopy", "space"]);
        assert!(matches!(
            RemoteConfig::from_cli(&cli),
            Err(FileCopyError::Config(_))
        ));
    }

    #[test]
    fn test_no_auth_method_rejected() {
        let mut config = RemoteConfig::new("rtr1", "admin");
        config.use_agent = false;
        assert!(config.validate().is_err());

        config.key_path = Some(PathBuf::from("/home/admin/.ssh/id_ed25519"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profile_roundtrip_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rtr1.json");

        let mut profile = RemoteConfig::new("rtr1", "admin");
        profile.port = 2222;
        profile.password = Some("secret".to_string());
        profile.save(&path).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(!saved.contains("secret"));

        let cli = args(&[
            "netcopy", "space", "--profile", path.to_str().unwrap(), "--port", "22",
        ]);
        let config = RemoteConfig::from_cli(&cli).unwrap();
        assert_eq!(config.host, "rtr1");
        assert_eq!(config.port, 22);
        assert!(config.password.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = RemoteConfig::new("rtr1", "admin");
        config.password = Some("hunter2".to_string());
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
