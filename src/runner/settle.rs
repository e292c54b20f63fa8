//! Waiting for the page to settle after a click.

use super::locate::TOGGLE_MARKER;
use crate::config::{SettleConfig, SettleStrategy};
use crate::{Error, Result};
use eoka::Page;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Position, size and visibility of one page region.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionBox {
    /// What the region is: `toggle`, `controls`, or the sidebar candidate's
    /// tag, id and document index.
    pub key: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub visible: bool,
}

/// Layout of the toggle and the regions it is likely to affect.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayoutSample {
    pub viewport_width: i64,
    pub regions: Vec<RegionBox>,
}

/// How a settle wait went.
#[derive(Debug, Clone)]
pub struct SettleRecord {
    pub strategy: SettleStrategy,
    /// Time between the click returning and the wait ending.
    pub waited: Duration,
    /// Layout samples taken.
    pub samples: usize,
    /// Whether two consecutive samples matched before the bound.
    /// Always false for `fixed`.
    pub stable: bool,
    /// Layout at the end of the wait.
    pub layout: LayoutSample,
}

const LAYOUT_JS: &str = r#"(() => {
    const marker = __MARKER__;
    const boxOf = (key, el) => {
        const rect = el.getBoundingClientRect();
        const style = getComputedStyle(el);
        return {
            key,
            x: Math.round(rect.x),
            y: Math.round(rect.y),
            width: Math.round(rect.width),
            height: Math.round(rect.height),
            visible: rect.width > 0 && rect.height > 0
                && style.visibility !== 'hidden' && style.display !== 'none'
                && parseFloat(style.opacity) > 0,
        };
    };
    const regions = [];
    const toggle = document.querySelector('[' + marker + '="toggle"]');
    if (toggle) {
        regions.push(boxOf('toggle', toggle));
        const controls = toggle.getAttribute('aria-controls');
        if (controls) {
            for (const id of controls.split(/\s+/)) {
                const el = document.getElementById(id);
                if (el) regions.push(boxOf('controls#' + id, el));
            }
        }
    }
    const SIDEBAR = 'aside, nav, [role="navigation"], [role="complementary"], [data-sidebar], [class*="sidebar" i]';
    document.querySelectorAll(SIDEBAR).forEach((el, i) => {
        const id = el.id ? '#' + el.id : '';
        regions.push(boxOf(el.tagName.toLowerCase() + id + '@' + i, el));
    });
    return JSON.stringify({ viewport_width: window.innerWidth, regions });
})()"#;

/// Sample the current layout.
pub async fn sample_layout(page: &Page) -> Result<LayoutSample> {
    let marker = serde_json::to_string(TOGGLE_MARKER)
        .map_err(|e| Error::Config(format!("cannot encode marker: {}", e)))?;
    let js = LAYOUT_JS.replace("__MARKER__", &marker);
    let json: String = page.evaluate(&js).await?;
    serde_json::from_str(&json).map_err(|e| {
        Error::Browser(eoka::Error::CdpSimple(format!(
            "layout parse error: {}",
            e
        )))
    })
}

/// Wait after a click according to `config`.
pub async fn settle(page: &Page, config: &SettleConfig) -> Result<SettleRecord> {
    match config.strategy {
        SettleStrategy::Fixed => {
            let start = Instant::now();
            page.wait(config.max_ms).await;
            let waited = start.elapsed();
            let layout = sample_layout(page).await?;
            debug!("Fixed settle: {}ms", waited.as_millis());
            Ok(SettleRecord {
                strategy: SettleStrategy::Fixed,
                waited,
                samples: 1,
                stable: false,
                layout,
            })
        }
        SettleStrategy::StableLayout => {
            poll_until_stable(
                Duration::from_millis(config.max_ms),
                Duration::from_millis(config.poll_interval_ms),
                || sample_layout(page),
            )
            .await
        }
    }
}

/// Sample every `interval` until two consecutive samples are equal, or
/// until `max` has passed. Running out of time is not an error; the record
/// says whether the layout became stable.
pub async fn poll_until_stable<F, Fut>(
    max: Duration,
    interval: Duration,
    mut sample: F,
) -> Result<SettleRecord>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<LayoutSample>>,
{
    let start = Instant::now();
    let deadline = start + max;
    let mut previous: Option<LayoutSample> = None;
    let mut samples = 0;

    loop {
        let now = Instant::now();
        let nap = interval.min(deadline.saturating_duration_since(now));
        if !nap.is_zero() {
            tokio::time::sleep(nap).await;
        }

        let current = sample().await?;
        samples += 1;

        if previous.as_ref() == Some(&current) {
            let waited = start.elapsed();
            debug!(
                "Layout stable after {}ms ({} samples)",
                waited.as_millis(),
                samples
            );
            return Ok(SettleRecord {
                strategy: SettleStrategy::StableLayout,
                waited,
                samples,
                stable: true,
                layout: current,
            });
        }

        if Instant::now() >= deadline {
            let waited = start.elapsed();
            warn!(
                "Layout still changing after {}ms, continuing",
                waited.as_millis()
            );
            return Ok(SettleRecord {
                strategy: SettleStrategy::StableLayout,
                waited,
                samples,
                stable: false,
                layout: current,
            });
        }

        previous = Some(current);
    }
}
