//! Accessible-name lookups evaluated inside the page.

use crate::{Error, Result};
use eoka::Page;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Attribute placed on the located control so it can be clicked by selector.
pub const TOGGLE_MARKER: &str = "data-sidebar-verify";

/// CSS selector of the marked control.
pub fn toggle_selector() -> String {
    format!("[{}=\"toggle\"]", TOGGLE_MARKER)
}

const HEADING_POLL_MS: u64 = 100;

/// Shared helpers: whitespace normalization, name matching, visibility.
const NAME_HELPERS_JS: &str = r#"
    const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
    const wanted = norm(args.name);
    const matches = (candidate) => {
        const c = norm(candidate);
        if (!c) return false;
        return args.exact ? c === wanted : c.toLowerCase().includes(wanted.toLowerCase());
    };
    const textOfIds = (ids) => ids.split(/\s+/)
        .map(id => document.getElementById(id))
        .filter(Boolean)
        .map(el => el.textContent)
        .join(' ');
    const isVisible = (el) => {
        const rect = el.getBoundingClientRect();
        const style = getComputedStyle(el);
        return rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden' && style.display !== 'none';
    };
    const ariaHidden = (el) => !!el.closest('[aria-hidden="true"]');
"#;

/// Counts visible headings (`h1`-`h6`, `role=heading`) whose accessible
/// name matches. Hidden matches are left out of `count`, the way a role
/// lookup skips them, and reported separately in `hidden`.
const HEADING_JS: &str = r#"(() => {
    const args = __ARGS__;
    __HELPERS__
    const nameOf = (el) => {
        const labelledBy = el.getAttribute('aria-labelledby');
        if (labelledBy) return textOfIds(labelledBy);
        return el.getAttribute('aria-label') || el.textContent;
    };
    let count = 0;
    let hidden = 0;
    for (const el of document.querySelectorAll('h1, h2, h3, h4, h5, h6, [role="heading"]')) {
        if (ariaHidden(el) || !matches(nameOf(el))) continue;
        if (isVisible(el)) count++;
        else hidden++;
    }
    return JSON.stringify({ count, visible: count, hidden });
})()"#;

/// Finds elements labelled by `aria-label`, `aria-labelledby` or an
/// associated `<label>`. Marks the element when exactly one matches.
const LABEL_JS: &str = r#"(() => {
    const args = __ARGS__;
    __HELPERS__
    for (const old of document.querySelectorAll('[' + args.marker + ']')) {
        old.removeAttribute(args.marker);
    }
    const found = [];
    for (const el of document.querySelectorAll('*')) {
        const names = [];
        const aria = el.getAttribute('aria-label');
        if (aria) names.push(aria);
        const labelledBy = el.getAttribute('aria-labelledby');
        if (labelledBy) names.push(textOfIds(labelledBy));
        if (el.labels) for (const l of el.labels) names.push(l.textContent);
        if (names.some(matches)) found.push(el);
    }
    if (found.length === 1) found[0].setAttribute(args.marker, 'toggle');
    return JSON.stringify({ count: found.length, visible: found.filter(isVisible).length });
})()"#;

/// Scrolls the marked control to the middle of the viewport and reports
/// what the pointer would hit at its center.
const CLICK_TARGET_JS: &str = r#"(() => {
    const el = document.querySelector(__SELECTOR__);
    if (!el) return JSON.stringify({ found: false, hit: false, blocker: null });
    el.scrollIntoView({ behavior: 'instant', block: 'center', inline: 'center' });
    const rect = el.getBoundingClientRect();
    const x = rect.left + rect.width / 2;
    const y = rect.top + rect.height / 2;
    const top = document.elementFromPoint(x, y);
    const hit = !!top && (top === el || el.contains(top));
    let blocker = null;
    if (!hit) {
        blocker = top
            ? top.tagName.toLowerCase() + (top.id ? '#' + top.id : '')
            : 'nothing (outside the viewport)';
    }
    return JSON.stringify({ found: true, hit, blocker });
})()"#;

#[derive(Serialize)]
struct LookupArgs<'a> {
    name: &'a str,
    exact: bool,
    marker: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    count: usize,
    visible: usize,
    #[serde(default)]
    hidden: usize,
}

#[derive(Debug, Deserialize)]
struct ClickTarget {
    found: bool,
    hit: bool,
    blocker: Option<String>,
}

fn build_js(template: &str, name: &str, exact: bool) -> Result<String> {
    let args = LookupArgs {
        name,
        exact,
        marker: TOGGLE_MARKER,
    };
    let args = serde_json::to_string(&args)
        .map_err(|e| Error::Config(format!("cannot encode lookup args: {}", e)))?;
    Ok(template
        .replace("__HELPERS__", NAME_HELPERS_JS)
        .replace("__ARGS__", &args))
}

async fn lookup(page: &Page, template: &str, name: &str, exact: bool) -> Result<LookupResult> {
    let js = build_js(template, name, exact)?;
    let json: String = page.evaluate(&js).await?;
    serde_json::from_str(&json).map_err(|e| {
        Error::Browser(eoka::Error::CdpSimple(format!(
            "lookup parse error: {} (got: {})",
            e, json
        )))
    })
}

/// Wait until exactly one heading named `name` is visible.
///
/// Hidden headings are ignored. More than one visible match fails
/// immediately; no visible match before `timeout_ms` is a [`Error::Timeout`].
pub async fn wait_for_heading(page: &Page, name: &str, exact: bool, timeout_ms: u64) -> Result<()> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let found = lookup(page, HEADING_JS, name, exact).await?;
        if found.count > 1 {
            return Err(Error::AmbiguousElement {
                what: format!("heading '{}'", name),
                count: found.count,
            });
        }
        if found.visible == 1 {
            debug!("Heading '{}' visible", name);
            return Ok(());
        }
        if Instant::now() >= deadline {
            let state = if found.hidden == 0 { "not found" } else { "not visible" };
            return Err(Error::Timeout(format!(
                "heading '{}' {} after {}ms",
                name, state, timeout_ms
            )));
        }
        tokio::time::sleep(Duration::from_millis(HEADING_POLL_MS)).await;
    }
}

/// Locate the single element labelled `label` and return a selector for it.
pub async fn locate_by_label(page: &Page, label: &str, exact: bool) -> Result<String> {
    let found = lookup(page, LABEL_JS, label, exact).await?;
    debug!(
        "Label '{}': {} match(es), {} visible",
        label, found.count, found.visible
    );
    match found.count {
        0 => Err(Error::ElementNotFound(format!("label '{}'", label))),
        1 if found.visible == 0 => Err(Error::NotClickable {
            what: format!("label '{}'", label),
            reason: "element is not visible".into(),
        }),
        1 => Ok(toggle_selector()),
        count => Err(Error::AmbiguousElement {
            what: format!("label '{}'", label),
            count,
        }),
    }
}

/// Scroll the control behind `selector` into view and check that a click at
/// its center reaches it rather than an element covering it.
pub async fn ensure_clickable(page: &Page, selector: &str, label: &str) -> Result<()> {
    let selector_json = serde_json::to_string(selector)
        .map_err(|e| Error::Config(format!("cannot encode selector: {}", e)))?;
    let js = CLICK_TARGET_JS.replace("__SELECTOR__", &selector_json);
    let json: String = page.evaluate(&js).await?;
    let target: ClickTarget = serde_json::from_str(&json).map_err(|e| {
        Error::Browser(eoka::Error::CdpSimple(format!(
            "click target parse error: {} (got: {})",
            e, json
        )))
    })?;
    check_click_target(&target, label)
}

fn check_click_target(target: &ClickTarget, label: &str) -> Result<()> {
    let what = format!("label '{}'", label);
    if !target.found {
        return Err(Error::ElementNotFound(what));
    }
    if !target.hit {
        let blocker = target.blocker.as_deref().unwrap_or("another element");
        return Err(Error::NotClickable {
            what,
            reason: format!("click would land on {}", blocker),
        });
    }
    debug!("Label '{}' is clickable", label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_js_escapes_name() {
        let js = build_js(LABEL_JS, "Toggle \"side\" bar", false).unwrap();
        assert!(js.contains(r#""name":"Toggle \"side\" bar""#));
        assert!(js.contains(r#""exact":false"#));
        assert!(!js.contains("__ARGS__"));
        assert!(!js.contains("__HELPERS__"));
    }

    #[test]
    fn test_toggle_selector() {
        assert_eq!(toggle_selector(), r#"[data-sidebar-verify="toggle"]"#);
    }

    #[test]
    fn test_lookup_result_parses() {
        let r: LookupResult = serde_json::from_str(r#"{"count":2,"visible":1}"#).unwrap();
        assert_eq!(r.count, 2);
        assert_eq!(r.visible, 1);
        assert_eq!(r.hidden, 0);

        let r: LookupResult =
            serde_json::from_str(r#"{"count":1,"visible":1,"hidden":1}"#).unwrap();
        assert_eq!(r.hidden, 1);
    }

    #[test]
    fn test_heading_lookup_skips_hidden_matches() {
        let js = build_js(HEADING_JS, "Astrodynamics Playground", false).unwrap();
        assert!(js.contains("if (isVisible(el)) count++;"));
        assert!(js.contains("else hidden++;"));
    }

    #[test]
    fn test_click_target_hit() {
        let target: ClickTarget =
            serde_json::from_str(r#"{"found":true,"hit":true,"blocker":null}"#).unwrap();
        assert!(check_click_target(&target, "Toggle sidebar").is_ok());
    }

    #[test]
    fn test_click_target_covered_by_overlay() {
        let target: ClickTarget =
            serde_json::from_str(r#"{"found":true,"hit":false,"blocker":"div#overlay"}"#)
                .unwrap();
        let err = check_click_target(&target, "Toggle sidebar").unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Locator);
        assert!(err.to_string().contains("div#overlay"), "{}", err);
    }

    #[test]
    fn test_click_target_gone() {
        let target: ClickTarget =
            serde_json::from_str(r#"{"found":false,"hit":false,"blocker":null}"#).unwrap();
        let err = check_click_target(&target, "Toggle sidebar").unwrap_err();
        assert!(matches!(err, Error::ElementNotFound(_)));
    }
}
