//! Configuration: rc file + environment overlay and plot settings.

use std::{
    collections::HashMap,
    env, fmt, fs,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Duration,
};

use anyhow::{bail, Result};
use directories::BaseDirs;

/// Default device/terminal configuration for inline plotting.
pub const DEFAULT_TERMSPEC: &str = "pngcairo size 385, 256 font \"Arial,10\"";

/// Default patient prompt timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read the rc file if it exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(|l| l.ok()) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if k.starts_with("GNUPLOT_KERNEL_") {
                map.insert(k, v);
            }
        }

        Self {
            inner: map,
            config_path,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    /// Override one entry, taking precedence over the rc file and the
    /// environment. Used for command-line overrides.
    pub fn set(&mut self, key: &str, value: &str) {
        self.inner.insert(key.to_string(), value.to_string());
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    /// Shell command used to start the gnuplot process.
    pub fn gnuplot_command(&self) -> String {
        self.get("GNUPLOT_KERNEL_COMMAND")
            .unwrap_or_else(|| "gnuplot".to_string())
    }

    /// Patient prompt timeout for long-running computations.
    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(
            self.get_u64("GNUPLOT_KERNEL_TIMEOUT")
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("gnuplot-kernel").join("rc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("GNUPLOT_KERNEL_BACKEND".into(), "inline".into());
    m.insert("GNUPLOT_KERNEL_TERMSPEC".into(), DEFAULT_TERMSPEC.into());
    m.insert("GNUPLOT_KERNEL_FORMAT".into(), "png".into());
    m.insert("GNUPLOT_KERNEL_COMMAND".into(), "gnuplot".into());
    m.insert(
        "GNUPLOT_KERNEL_TIMEOUT".into(),
        DEFAULT_TIMEOUT_SECS.to_string(),
    );
    m
}

/// Image format for inline plot artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Svg,
    Jpg,
}

impl ImageFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            other => bail!("unsupported image format: {other}"),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Jpg => "jpg",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Jpg => "image/jpeg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Plot settings consumed by the session: where plot output goes and
/// how it is rendered.
#[derive(Debug, Clone)]
pub struct PlotSettings {
    /// `inline` redirects plots to capture files; anything else is a
    /// direct device left entirely to the user.
    pub backend: String,
    /// Raw terminal configuration passed to `set terminal`.
    pub termspec: String,
    pub format: ImageFormat,
}

impl PlotSettings {
    /// Resolve settings from config with optional overrides, applying
    /// the documented defaults for anything absent.
    pub fn resolve(
        cfg: &Config,
        backend: Option<&str>,
        termspec: Option<&str>,
        format: Option<&str>,
    ) -> Result<Self> {
        let backend = backend
            .map(str::to_string)
            .or_else(|| cfg.get("GNUPLOT_KERNEL_BACKEND"))
            .unwrap_or_else(|| "inline".to_string());
        let termspec = termspec
            .map(str::to_string)
            .or_else(|| cfg.get("GNUPLOT_KERNEL_TERMSPEC"))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TERMSPEC.to_string());

        // The terminal token implies the artifact format unless the
        // format is given explicitly.
        let terminal = termspec.split_whitespace().next().unwrap_or_default();
        let format = match format {
            Some(name) => ImageFormat::parse(name)?,
            None => match terminal {
                "svg" => ImageFormat::Svg,
                "jpeg" => ImageFormat::Jpg,
                _ => cfg
                    .get("GNUPLOT_KERNEL_FORMAT")
                    .map_or(Ok(ImageFormat::Png), |f| ImageFormat::parse(&f))?,
            },
        };

        if backend == "inline" && !matches!(terminal, "pngcairo" | "png" | "jpeg" | "svg") {
            bail!("for inline plots, the terminal must be one of pngcairo, jpeg, svg or png");
        }

        Ok(Self {
            backend,
            termspec,
            format,
        })
    }

    pub fn is_inline(&self) -> bool {
        self.backend == "inline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_given() {
        let cfg = Config::load();
        let settings = PlotSettings::resolve(&cfg, None, None, None).expect("resolve");
        assert!(settings.is_inline());
        assert_eq!(settings.format, ImageFormat::Png);
        assert_eq!(settings.termspec, DEFAULT_TERMSPEC);
    }

    #[test]
    fn terminal_token_implies_format() {
        let cfg = Config::load();
        let settings = PlotSettings::resolve(&cfg, None, Some("svg enhanced size 560,420"), None)
            .expect("resolve");
        assert_eq!(settings.format, ImageFormat::Svg);

        let settings =
            PlotSettings::resolve(&cfg, None, Some("jpeg nointerlace"), None).expect("resolve");
        assert_eq!(settings.format, ImageFormat::Jpg);
    }

    #[test]
    fn inline_backend_rejects_interactive_terminals() {
        let cfg = Config::load();
        assert!(PlotSettings::resolve(&cfg, Some("inline"), Some("qt"), None).is_err());
        assert!(PlotSettings::resolve(&cfg, Some("qt"), Some("qt"), None).is_ok());
    }
}
