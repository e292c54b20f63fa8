use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level verification config. Every key is optional; the defaults are
/// the constants the procedure was written against.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    /// Page under test and the elements to look for.
    pub target: TargetConfig,

    /// Browser launch configuration.
    pub browser: BrowserConfig,

    /// Wait bounds.
    pub timeouts: Timeouts,

    /// How to wait after each click.
    pub settle: SettleConfig,

    /// Where screenshots go.
    pub output: OutputConfig,

    /// Comparison of the expanded state against the initial state.
    pub round_trip: RoundTripConfig,
}

impl VerifyConfig {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse config from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self> {
        // An empty document means "all defaults".
        let config: VerifyConfig = if yaml.trim().is_empty() {
            VerifyConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the config.
    pub fn validate(&self) -> Result<()> {
        if self.target.url.trim().is_empty() {
            return Err(Error::Config("target.url is required".into()));
        }
        if self.target.heading.trim().is_empty() {
            return Err(Error::Config("target.heading must not be empty".into()));
        }
        if self.target.toggle_label.trim().is_empty() {
            return Err(Error::Config(
                "target.toggle_label must not be empty".into(),
            ));
        }
        let viewport = &self.browser.viewport;
        if viewport.width == 0 || viewport.height == 0 {
            return Err(Error::Config(format!(
                "browser.viewport must be non-zero, got {}x{}",
                viewport.width, viewport.height
            )));
        }
        if self.timeouts.heading_ms == 0 {
            return Err(Error::Config(
                "timeouts.heading_ms must be at least 1".into(),
            ));
        }
        if self.settle.max_ms == 0 {
            return Err(Error::Config("settle.max_ms must be at least 1".into()));
        }
        if self.settle.strategy == SettleStrategy::StableLayout {
            if self.settle.poll_interval_ms == 0 {
                return Err(Error::Config(
                    "settle.poll_interval_ms must be at least 1".into(),
                ));
            }
            if self.settle.poll_interval_ms > self.settle.max_ms {
                return Err(Error::Config(format!(
                    "settle.poll_interval_ms ({}) exceeds settle.max_ms ({})",
                    self.settle.poll_interval_ms, self.settle.max_ms
                )));
            }
        }
        let threshold = self.round_trip.max_diff_percent;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "round_trip.max_diff_percent must be between 0 and 100, got {}",
                threshold
            )));
        }
        Ok(())
    }
}

/// The application under test.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// URL to navigate to. The server is expected to be running already.
    pub url: String,

    /// Accessible name of the heading that marks the page as rendered.
    pub heading: String,

    /// Accessible label of the sidebar toggle control.
    pub toggle_label: String,

    /// Require whole-string, case-sensitive name matches instead of
    /// case-insensitive substring matches.
    pub exact: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".into(),
            heading: "Astrodynamics Playground".into(),
            toggle_label: "Toggle sidebar".into(),
            exact: false,
        }
    }
}

/// Browser launch configuration. The browser always runs headless.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    /// Viewport size.
    pub viewport: Viewport,
}

/// Viewport dimensions.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Maximum wait for the heading to become visible.
    pub heading_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { heading_ms: 30_000 }
    }
}

/// Settle wait after each click.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettleConfig {
    pub strategy: SettleStrategy,

    /// Upper bound of a settle wait. For `fixed` this is the whole wait.
    pub max_ms: u64,

    /// Layout sampling interval for `stable_layout`.
    pub poll_interval_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            strategy: SettleStrategy::StableLayout,
            max_ms: 1_000,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SettleStrategy {
    /// Poll the layout until two consecutive samples match.
    #[default]
    StableLayout,
    /// Sleep for `max_ms`.
    Fixed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory the screenshots are written to.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoundTripConfig {
    /// Fail the run when the first click leaves the layout unchanged or the
    /// expanded layout differs from the initial one.
    pub enabled: bool,

    /// Also fail when the initial and expanded screenshots differ by more
    /// than `max_diff_percent`. Off by default: animated content changes
    /// pixels without the sidebar moving.
    pub pixels: bool,

    /// Largest tolerated share of differing pixels, in percent. Above it a
    /// warning is logged, or the run fails when `pixels` is set.
    pub max_diff_percent: f64,
}

impl Default for RoundTripConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pixels: false,
            max_diff_percent: 0.5,
        }
    }
}
