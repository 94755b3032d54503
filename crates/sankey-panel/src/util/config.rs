use anyhow::Context;
use directories::ProjectDirs;
use sankey_core::{LayoutConfig, HOVERED_TIME_CHANGED};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub socket_path: String,
    pub width: f64,
    pub height: f64,
    /// Kept free above and below the diagram.
    pub vertical_margin: f64,
    pub hover_event: String,
    pub debounce_ms: u64,
    pub layout: LayoutConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            socket_path: default_uds_path(),
            width: 800.0,
            height: 400.0,
            vertical_margin: 10.0,
            hover_event: HOVERED_TIME_CHANGED.to_string(),
            debounce_ms: 100,
            layout: LayoutConfig::default(),
        }
    }
}

impl PanelConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_uds_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        format!("{dir}/sankey.sock")
    } else {
        "/tmp/sankey.sock".to_string()
    }
}

fn config_file_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "sankey")?;
    Some(proj.config_dir().join("panel.toml"))
}

pub fn load_or_default() -> PanelConfig {
    let Some(path) = config_file_path() else {
        return PanelConfig::default();
    };
    load_or_default_from_path(&path)
}

pub fn load_or_default_from_path(path: &Path) -> PanelConfig {
    let Ok(contents) = fs::read_to_string(path) else {
        return PanelConfig::default();
    };
    toml::from_str(&contents).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "ignoring invalid panel config");
        PanelConfig::default()
    })
}

pub fn save(cfg: &PanelConfig) -> anyhow::Result<()> {
    let Some(path) = config_file_path() else {
        return Err(anyhow::anyhow!("no config directory available"));
    };
    save_to_path(cfg, &path)
}

pub fn save_to_path(cfg: &PanelConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(cfg).context("failed to serialize panel config")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write panel config {}", path.display()))?;
    Ok(())
}

/// Command-line values that win over the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub socket: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub write_config: bool,
}

impl CliOverrides {
    pub fn apply(&self, mut cfg: PanelConfig) -> PanelConfig {
        if let Some(socket) = &self.socket {
            cfg.socket_path = socket.clone();
        }
        if let Some(width) = self.width {
            cfg.width = width;
        }
        if let Some(height) = self.height {
            cfg.height = height;
        }
        cfg
    }

    /// Config file named by `--config`, or the platform default.
    pub fn load(&self) -> PanelConfig {
        let base = match &self.config {
            Some(path) => load_or_default_from_path(path),
            None => load_or_default(),
        };
        self.apply(base)
    }

    pub fn persist(&self, cfg: &PanelConfig) -> anyhow::Result<()> {
        match &self.config {
            Some(path) => save_to_path(cfg, path),
            None => save(cfg),
        }
    }
}

pub fn parse_args() -> anyhow::Result<CliOverrides> {
    parse_args_from(std::env::args_os().skip(1))
}

fn parse_dimension(flag: &str, value: Option<OsString>) -> anyhow::Result<f64> {
    let Some(value) = value else {
        anyhow::bail!("{flag} expects a number");
    };
    let text = value.to_string_lossy();
    let parsed: f64 = text
        .trim()
        .parse()
        .with_context(|| format!("{flag}: not a number: {text}"))?;
    if !parsed.is_finite() || parsed < 0.0 {
        anyhow::bail!("{flag} must be a non-negative number, got {text}");
    }
    Ok(parsed)
}

fn parse_args_from<I>(args: I) -> anyhow::Result<CliOverrides>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = CliOverrides::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--config" {
            let Some(path) = args.next() else {
                anyhow::bail!("--config expects a path");
            };
            out.config = Some(PathBuf::from(path));
        } else if arg == "--socket" {
            let Some(path) = args.next() else {
                anyhow::bail!("--socket expects a path");
            };
            out.socket = Some(path.to_string_lossy().into_owned());
        } else if arg == "--width" {
            out.width = Some(parse_dimension("--width", args.next())?);
        } else if arg == "--height" {
            out.height = Some(parse_dimension("--height", args.next())?);
        } else if arg == "--write-config" {
            out.write_config = true;
        } else {
            anyhow::bail!("unknown argument: {:?}", arg);
        }
    }

    Ok(out)
}
