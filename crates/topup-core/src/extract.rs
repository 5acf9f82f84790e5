//! Reads the remaining data volume from the dashboard.

use crate::page::PortalPage;
use crate::selectors::LayoutTable;
use crate::types::{CycleError, CycleResult, Measurement, Plan};
use regex::Regex;
use std::sync::OnceLock;

/// MB per GB as the portal counts them.
const MB_PER_GB: f64 = 1024.0;

fn volume_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s?(GB|MB)?").expect("volume pattern is valid")
    })
}

/// Parse a volume such as `"2,5 GB"` or `"512 MB"` into GB.
///
/// A figure without a unit is taken as GB.
pub fn parse_volume(raw: &str) -> CycleResult<f64> {
    let caps = volume_pattern()
        .captures(raw)
        .ok_or_else(|| CycleError::Extraction(format!("unexpected volume format: {raw:?}")))?;

    let value: f64 = caps[1]
        .replace(',', ".")
        .parse()
        .map_err(|e| CycleError::Extraction(format!("bad number in {raw:?}: {e}")))?;

    let is_mb = caps
        .get(2)
        .is_some_and(|unit| unit.as_str().eq_ignore_ascii_case("MB"));

    Ok(if is_mb { value / MB_PER_GB } else { value })
}

/// Selector-tolerant reader for the usage meter.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    layout: LayoutTable,
}

impl Extractor {
    pub fn new(layout: LayoutTable) -> Self {
        Self { layout }
    }

    /// Read the plan and remaining volume from a loaded dashboard.
    pub async fn read(&self, page: &dyn PortalPage) -> CycleResult<Measurement> {
        tracing::info!("reading remaining volume");

        let plan = match first_text(page, self.layout.label).await {
            Some(label) => self.layout.plan_from_label(&label),
            None => {
                tracing::warn!("plan label not found, assuming standard plan");
                Plan::Standard
            }
        };
        tracing::info!(plan = plan.as_str(), "plan detected");

        let selectors = self.layout.for_plan(plan).quantity;
        let raw = first_text(page, selectors).await.ok_or_else(|| {
            CycleError::Extraction("no volume selector matched".to_string())
        })?;

        let quantity = parse_volume(&raw)?;
        Ok(Measurement::new(quantity, plan))
    }
}

/// Text of the first selector that yields non-empty content.
async fn first_text(page: &dyn PortalPage, selectors: &[&str]) -> Option<String> {
    for selector in selectors {
        match page.text_content(selector).await {
            Ok(Some(text)) if !text.trim().is_empty() => return Some(text.trim().to_string()),
            Ok(_) => {}
            Err(e) => tracing::warn!("selector {selector} unavailable: {e}"),
        }
    }
    None
}
