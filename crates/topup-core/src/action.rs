//! Books more volume when the remaining amount runs low.

use crate::page::PortalPage;
use crate::retry::RetryPolicy;
use crate::selectors::{LayoutTable, ACTION_CONTROL};
use crate::types::{CycleError, CycleResult, Measurement, PageError, TopUp, TopUpPath};

/// When to top up and which control does it.
#[derive(Debug, Clone, PartialEq)]
pub struct TopUpPolicy {
    /// Top up when the remaining volume drops below this many GB.
    pub threshold_gb: f64,
    /// Label of the top-up control, e.g. `"1 GB"`.
    pub label: String,
}

impl Default for TopUpPolicy {
    fn default() -> Self {
        Self {
            threshold_gb: 1.0,
            label: "1 GB".to_string(),
        }
    }
}

impl TopUpPolicy {
    pub fn needs_top_up(&self, quantity: f64) -> bool {
        quantity < self.threshold_gb
    }

    fn matches(&self, text: &str) -> bool {
        normalize(text).contains(&normalize(&self.label))
    }
}

/// Collapse non-breaking and repeated whitespace so `"1\u{a0}GB"` matches `"1 GB"`.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds and clicks the top-up control.
#[derive(Debug, Clone)]
pub struct ActionTrigger {
    layout: LayoutTable,
    policy: TopUpPolicy,
    click: RetryPolicy,
}

impl Default for ActionTrigger {
    fn default() -> Self {
        Self::new(LayoutTable::default(), TopUpPolicy::default())
    }
}

impl ActionTrigger {
    pub fn new(layout: LayoutTable, policy: TopUpPolicy) -> Self {
        Self {
            layout,
            policy,
            click: RetryPolicy::click(),
        }
    }

    /// Retry budget for clicking a matched control.
    pub fn with_click_policy(mut self, click: RetryPolicy) -> Self {
        self.click = click;
        self
    }

    pub fn policy(&self) -> &TopUpPolicy {
        &self.policy
    }

    /// Top up if `measurement` is below the threshold.
    pub async fn maybe_top_up(
        &self,
        page: &dyn PortalPage,
        measurement: &Measurement,
    ) -> CycleResult<TopUp> {
        if !self.policy.needs_top_up(measurement.quantity) {
            return Ok(TopUp::NotNeeded);
        }

        tracing::info!(
            "{:.2} GB left, trying to book {}",
            measurement.quantity,
            self.policy.label
        );

        if self.structured(page, measurement).await {
            return Ok(TopUp::Performed(TopUpPath::Structured));
        }

        tracing::info!("top-up control not found in the usage meter, scanning the page");
        match self.broad_scan(page).await {
            Ok(true) => Ok(TopUp::Performed(TopUpPath::BroadScan)),
            Ok(false) => Err(CycleError::ActionNotFound {
                quantity: measurement.quantity,
            }),
            Err(e) => {
                tracing::warn!("broad scan failed: {e}");
                Err(CycleError::ActionNotFound {
                    quantity: measurement.quantity,
                })
            }
        }
    }

    /// Plan-specific selectors, first visible control with the label wins.
    async fn structured(&self, page: &dyn PortalPage, measurement: &Measurement) -> bool {
        for selector in self.layout.for_plan(measurement.plan).action {
            match self.click_matching(page, selector).await {
                Ok(true) => {
                    tracing::info!("top-up clicked via {selector}");
                    return true;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("top-up via {selector} failed: {e}"),
            }
        }
        false
    }

    /// Every action control on the page, matched on label only.
    async fn broad_scan(&self, page: &dyn PortalPage) -> Result<bool, PageError> {
        let clicked = self.click_matching(page, ACTION_CONTROL).await?;
        if clicked {
            tracing::info!("top-up clicked via page scan");
        }
        Ok(clicked)
    }

    async fn click_matching(&self, page: &dyn PortalPage, selector: &str) -> Result<bool, PageError> {
        let controls = page.elements(selector).await?;
        for (index, control) in controls.iter().enumerate() {
            if !control.visible {
                continue;
            }
            tracing::debug!("control text: {}", control.text.trim());
            if self.policy.matches(&control.text) {
                self.click
                    .run(selector, || page.click_nth(selector, index))
                    .await
                    .map_err(|e| PageError::Interaction {
                        selector: selector.to_string(),
                        reason: format!("{} attempts: {}", e.attempts, e.last_error),
                    })?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ElementSnapshot;
    use crate::selectors::PORTAL_LAYOUT;
    use crate::testing::FakePortal;
    use crate::types::Plan;
    use std::time::Duration;

    fn position(log: &[String], entry: &str) -> usize {
        log.iter()
            .position(|l| l == entry)
            .unwrap_or_else(|| panic!("{entry} not in {log:?}"))
    }

    #[tokio::test]
    async fn test_above_threshold_does_nothing() {
        let portal = FakePortal::new();
        let result = ActionTrigger::default()
            .maybe_top_up(&portal.page(), &Measurement::new(1.0, Plan::Standard))
            .await
            .unwrap();
        assert_eq!(result, TopUp::NotNeeded);
        assert!(portal.log().is_empty());
    }

    #[tokio::test]
    async fn test_structured_path_skips_invisible_controls() {
        let portal = FakePortal::new();
        portal.set_elements(
            PORTAL_LAYOUT.plus.action[0],
            vec![
                ElementSnapshot::new(false, "1 GB"),
                ElementSnapshot::new(true, "Details"),
                ElementSnapshot::new(true, "+ 1\u{a0}GB"),
            ],
        );
        let result = ActionTrigger::default()
            .maybe_top_up(&portal.page(), &Measurement::new(0.3, Plan::Plus))
            .await
            .unwrap();
        assert_eq!(result, TopUp::Performed(TopUpPath::Structured));
        assert!(portal
            .log()
            .contains(&format!("click:{}#2", PORTAL_LAYOUT.plus.action[0])));
    }

    #[tokio::test]
    async fn test_structured_click_is_retried_until_it_goes_through() {
        let portal = FakePortal::new();
        let selector = PORTAL_LAYOUT.plus.action[0];
        portal.set_elements(selector, vec![ElementSnapshot::new(true, "+ 1 GB")]);
        portal.fail_clicks(selector, 1);

        let trigger = ActionTrigger::default()
            .with_click_policy(RetryPolicy::new(3, Duration::from_millis(50), Duration::ZERO));
        let result = trigger
            .maybe_top_up(&portal.page(), &Measurement::new(0.3, Plan::Plus))
            .await
            .unwrap();
        assert_eq!(result, TopUp::Performed(TopUpPath::Structured));

        let log = portal.log();
        let clicks = log.iter().filter(|l| **l == format!("click:{selector}#0")).count();
        assert_eq!(clicks, 2);
        assert!(!log.contains(&format!("elements:{ACTION_CONTROL}")));
    }

    #[tokio::test]
    async fn test_standard_plan_tries_its_selectors_before_broad_scan() {
        let portal = FakePortal::new();
        portal.set_elements(
            ACTION_CONTROL,
            vec![
                ElementSnapshot::new(true, "Tarif wechseln"),
                ElementSnapshot::new(true, "1 GB nachbuchen"),
            ],
        );
        let result = ActionTrigger::default()
            .maybe_top_up(&portal.page(), &Measurement::new(0.8, Plan::Standard))
            .await
            .unwrap();
        assert_eq!(result, TopUp::Performed(TopUpPath::BroadScan));

        let log = portal.log();
        let first = position(&log, &format!("elements:{}", PORTAL_LAYOUT.standard.action[0]));
        let second = position(&log, &format!("elements:{}", PORTAL_LAYOUT.standard.action[1]));
        let scan = position(&log, &format!("elements:{ACTION_CONTROL}"));
        assert!(first < second && second < scan);
        assert!(!log.iter().any(|l| l.contains("usage-meter:nth-child(2)")));
        assert!(log.contains(&format!("click:{ACTION_CONTROL}#1")));
    }

    #[tokio::test]
    async fn test_nothing_found_is_action_not_found() {
        let portal = FakePortal::new();
        portal.set_elements(ACTION_CONTROL, vec![ElementSnapshot::new(true, "Abmelden")]);
        let err = ActionTrigger::default()
            .maybe_top_up(&portal.page(), &Measurement::new(0.2, Plan::Standard))
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::ActionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_custom_threshold_and_label() {
        let portal = FakePortal::new();
        portal.set_text(PORTAL_LAYOUT.standard.action[1], "5 GB buchen");
        let trigger = ActionTrigger::new(
            PORTAL_LAYOUT,
            TopUpPolicy {
                threshold_gb: 2.0,
                label: "5 GB".into(),
            },
        );
        let result = trigger
            .maybe_top_up(&portal.page(), &Measurement::new(1.5, Plan::Standard))
            .await
            .unwrap();
        assert_eq!(result, TopUp::Performed(TopUpPath::Structured));
    }

    #[test]
    fn test_label_normalization() {
        let policy = TopUpPolicy::default();
        assert!(policy.matches("1\u{a0}GB"));
        assert!(policy.matches("  1   GB  "));
        assert!(!policy.matches("10 GB"));
        assert!(!policy.matches("1GB"));
    }
}
