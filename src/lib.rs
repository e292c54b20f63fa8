//! # sidebar-verify
//!
//! Headless browser smoke test for a sidebar toggle. Opens the app, waits for
//! its heading, clicks the toggle twice and saves a screenshot at each step.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sidebar_verify::{verify, VerifyConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> sidebar_verify::Result<()> {
//! let config = VerifyConfig::default();
//! let report = verify(&config).await?;
//! println!("Success: {}", report.success());
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod compare;
mod config;
mod runner;

pub use artifacts::{ArtifactDir, Checkpoint};
pub use compare::PixelDiff;
pub use config::{
    BrowserConfig, OutputConfig, RoundTripConfig, SettleConfig, SettleStrategy, TargetConfig,
    Timeouts, VerifyConfig, Viewport,
};
pub use runner::{
    verify, verify_with, LayoutSample, RegionBox, RoundTrip, RunReport, Runner, SettleRecord,
};

/// Result type for sidebar-verify operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading or a verification run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: eoka::Error,
    },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("{count} elements match {what}, expected exactly one")]
    AmbiguousElement { what: String, count: usize },

    #[error("cannot click {what}: {reason}")]
    NotClickable { what: String, reason: String },

    #[error("round trip mismatch: {0}")]
    RoundTripMismatch(String),
}

/// Coarse classification of an [`Error`], for callers that branch on why a
/// run failed rather than on its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Config,
    Navigation,
    Timeout,
    Locator,
    Io,
    RoundTrip,
    Browser,
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Config(_) | Self::Yaml(_) => FailureKind::Config,
            Self::Navigation { .. } => FailureKind::Navigation,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::ElementNotFound(_)
            | Self::AmbiguousElement { .. }
            | Self::NotClickable { .. } => FailureKind::Locator,
            Self::Io(_) | Self::Image(_) => FailureKind::Io,
            Self::RoundTripMismatch(_) => FailureKind::RoundTrip,
            Self::Browser(_) => FailureKind::Browser,
        }
    }
}
