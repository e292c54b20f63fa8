mod locate;
mod settle;

pub use settle::{LayoutSample, RegionBox, SettleRecord};

use crate::artifacts::{ArtifactDir, Checkpoint};
use crate::compare::{self, PixelDiff};
use crate::config::{BrowserConfig, RoundTripConfig, VerifyConfig};
use crate::{Error, Result};
use eoka::{Browser, Page};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of one verification run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// The step failure that ended the run early, if any.
    pub failure: Option<Error>,
    /// Screenshots written, in order.
    pub screenshots: Vec<(Checkpoint, PathBuf)>,
    /// One record per click.
    pub settles: Vec<SettleRecord>,
    /// Initial vs. expanded comparison, when the run got that far.
    pub round_trip: Option<RoundTrip>,
    /// Total duration.
    pub duration: Duration,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Whether a screenshot was written for `checkpoint`.
    pub fn captured(&self, checkpoint: Checkpoint) -> bool {
        self.screenshots.iter().any(|(c, _)| *c == checkpoint)
    }
}

/// Comparison of the expanded state with the initial state.
#[derive(Debug, Clone)]
pub struct RoundTrip {
    /// Layout sampled after the second click equals the one before the first.
    pub layout_restored: bool,
    pub pixels: PixelDiff,
}

impl RoundTrip {
    /// Whether the round trip passes. Pixels only count when
    /// `config.pixels` is set.
    pub fn matches(&self, config: &RoundTripConfig) -> bool {
        self.layout_restored && (!config.pixels || self.pixels.within(config.max_diff_percent))
    }
}

/// Owns the headless browser and its single page for one run.
pub struct Runner {
    browser: Browser,
    page: Page,
    quiet: bool,
}

impl Runner {
    /// Launch a headless browser with one page at the configured viewport.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: true,
            viewport_width: config.viewport.width,
            viewport_height: config.viewport.height,
            ..Default::default()
        };

        debug!(
            "Launching headless browser ({}x{})",
            config.viewport.width, config.viewport.height
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            page,
            quiet: false,
        })
    }

    /// Suppress progress lines on stdout.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn progress(&self, message: &str) {
        info!("{}", message);
        if !self.quiet {
            println!("{}", message);
        }
    }

    /// Run the toggle sequence once.
    ///
    /// A failing step is recorded in the report after an error screenshot is
    /// saved. Only a failure to save that screenshot is returned as `Err`.
    pub async fn run(&mut self, config: &VerifyConfig) -> Result<RunReport> {
        let start = Instant::now();
        let artifacts = ArtifactDir::new(&config.output.dir);
        artifacts.prepare()?;

        let mut report = RunReport::default();
        match self.steps(config, &artifacts, &mut report).await {
            Ok(()) => {
                self.progress("Verification script completed successfully.");
            }
            Err(e) => {
                let message = format!("Verification script failed: {}", e);
                if self.quiet {
                    error!("{}", message);
                } else {
                    self.progress(&message);
                }
                let png = self.page.screenshot().await?;
                let path = artifacts.write(Checkpoint::Error, &png)?;
                report.screenshots.push((Checkpoint::Error, path));
                report.failure = Some(e);
            }
        }

        report.duration = start.elapsed();
        Ok(report)
    }

    async fn steps(
        &self,
        config: &VerifyConfig,
        artifacts: &ArtifactDir,
        report: &mut RunReport,
    ) -> Result<()> {
        let target = &config.target;

        self.progress("Navigating to home page...");
        self.page
            .goto(&target.url)
            .await
            .map_err(|source| Error::Navigation {
                url: target.url.clone(),
                source,
            })?;

        self.progress("Waiting for page content...");
        locate::wait_for_heading(
            &self.page,
            &target.heading,
            target.exact,
            config.timeouts.heading_ms,
        )
        .await?;

        self.progress("Taking initial screenshot (sidebar open)...");
        let initial = self.capture(artifacts, Checkpoint::Initial, report).await?;

        let toggle = self.toggle(config).await?;
        let before = settle::sample_layout(&self.page).await?;

        self.progress("Collapsing sidebar...");
        self.page.click(&toggle).await?;
        let record = settle::settle(&self.page, &config.settle).await?;
        let collapsed_layout = record.layout.clone();
        report.settles.push(record);

        self.progress("Taking screenshot (sidebar collapsed)...");
        let collapsed = self.capture(artifacts, Checkpoint::Collapsed, report).await?;

        if config.round_trip.enabled {
            let pixels = compare::diff_png(&initial, &collapsed)?;
            if let Some(message) = unchanged_message(&before, &collapsed_layout, &pixels, config) {
                return Err(Error::RoundTripMismatch(message));
            }
        }

        // Re-resolve: the app may have re-rendered the control.
        let toggle = self.toggle(config).await?;
        self.progress("Expanding sidebar...");
        self.page.click(&toggle).await?;
        let record = settle::settle(&self.page, &config.settle).await?;
        let after = record.layout.clone();
        report.settles.push(record);

        self.progress("Taking screenshot (sidebar expanded again)...");
        let expanded = self.capture(artifacts, Checkpoint::Expanded, report).await?;

        let round_trip = RoundTrip {
            layout_restored: before == after,
            pixels: compare::diff_png(&initial, &expanded)?,
        };
        debug!(
            "Round trip: layout restored={}, {:.3}% pixels differ",
            round_trip.layout_restored, round_trip.pixels.diff_percent
        );
        let threshold = config.round_trip.max_diff_percent;
        let differs = !round_trip.layout_restored || !round_trip.pixels.within(threshold);
        let fails = config.round_trip.enabled && !round_trip.matches(&config.round_trip);
        report.round_trip = Some(round_trip);

        if differs {
            let message = mismatch_message(report.round_trip.as_ref(), &before, &after, threshold);
            if fails {
                return Err(Error::RoundTripMismatch(message));
            }
            warn!("{}", message);
        }

        Ok(())
    }

    /// Locate the toggle, bring it into view and make sure a click reaches it.
    async fn toggle(&self, config: &VerifyConfig) -> Result<String> {
        let target = &config.target;
        let selector = locate::locate_by_label(&self.page, &target.toggle_label, target.exact).await?;
        locate::ensure_clickable(&self.page, &selector, &target.toggle_label).await?;
        Ok(selector)
    }

    async fn capture(
        &self,
        artifacts: &ArtifactDir,
        checkpoint: Checkpoint,
        report: &mut RunReport,
    ) -> Result<Vec<u8>> {
        let png = self.page.screenshot().await?;
        let path = artifacts.write(checkpoint, &png)?;
        report.screenshots.push((checkpoint, path));
        Ok(png)
    }

    /// Close the browser.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

/// Describes a first click that changed neither the sampled layout nor the
/// screenshot. `None` when the click had a visible effect.
fn unchanged_message(
    before: &LayoutSample,
    collapsed: &LayoutSample,
    pixels: &PixelDiff,
    config: &VerifyConfig,
) -> Option<String> {
    if before != collapsed || !pixels.within(config.round_trip.max_diff_percent) {
        return None;
    }
    Some(format!(
        "clicking '{}' changed nothing: layout unchanged, {:.2}% of pixels differ",
        config.target.toggle_label, pixels.diff_percent
    ))
}

fn mismatch_message(
    round_trip: Option<&RoundTrip>,
    before: &LayoutSample,
    after: &LayoutSample,
    threshold: f64,
) -> String {
    let mut parts = Vec::new();
    if before != after {
        let changed: Vec<&str> = after
            .regions
            .iter()
            .filter(|r| !before.regions.contains(r))
            .map(|r| r.key.as_str())
            .collect();
        if changed.is_empty() {
            parts.push("layout regions differ".to_string());
        } else {
            parts.push(format!("layout changed for {}", changed.join(", ")));
        }
    }
    if let Some(rt) = round_trip {
        if !rt.pixels.same_size {
            parts.push("screenshot sizes differ".to_string());
        } else if rt.pixels.diff_percent > threshold {
            parts.push(format!(
                "{:.2}% of pixels differ (threshold {:.2}%)",
                rt.pixels.diff_percent, threshold
            ));
        }
    }
    format!("expanded state does not match initial state: {}", parts.join("; "))
}

/// Launch, run, and always close the browser.
///
/// `Err` means the run could not start (browser launch) or its error
/// screenshot could not be written; step failures land in
/// [`RunReport::failure`].
pub async fn verify(config: &VerifyConfig) -> Result<RunReport> {
    verify_with(config, false).await
}

/// [`verify`] with control over progress output.
pub async fn verify_with(config: &VerifyConfig, quiet: bool) -> Result<RunReport> {
    let mut runner = Runner::launch(&config.browser).await?.quiet(quiet);
    let outcome = runner.run(config).await;
    let closed = runner.close().await;
    if let Err(ref e) = closed {
        warn!("Failed to close browser: {}", e);
    }
    let report = outcome?;
    closed?;
    Ok(report)
}
