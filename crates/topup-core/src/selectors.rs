//! Declarative selector table for the portal dashboard.
//!
//! The dashboard exists in two DOM layouts: usage meters as direct children
//! of the meter stack, or wrapped in a nested `one-stack`. Every list below
//! carries both variants in the order they are tried.

use crate::types::Plan;

/// Substring of the plan label that identifies the plus plan.
pub const PLUS_MARKER: &str = "Inland & EU";

/// Heading shown on the dashboard once logged in.
pub const DASHBOARD_HEADING: &str = r#"one-heading[level="h1"]"#;

/// Text the dashboard heading contains when the session is live.
pub const DASHBOARD_HEADING_TEXT: &str = "Übersicht";

pub const IDENTIFIER_FIELD: &str = "#input-5";
pub const SECRET_FIELD: &str = "#input-6";

/// Submit control on the login form.
pub const LOGIN_SUBMIT: &str = r#"one-button[data-type="main-action"] button"#;

/// Submit control used after a stale session was discarded.
pub const FALLBACK_LOGIN_SUBMIT: &str =
    r#"[class="button button--solid button--medium button--color-default button--has-label"]"#;

/// Every action control on the page, used by the broad scan.
pub const ACTION_CONTROL: &str = "one-button";

/// Consent banner "deny all" button.
pub const CONSENT_DENY: &str = r#"button[data-testid="uc-deny-all-button"]"#;

/// Button texts that decline the consent banner.
pub const CONSENT_DENY_KEYWORDS: &[&str] = &["Verweigern", "Ablehnen", "Decline"];

/// Selector lists for one plan.
#[derive(Debug, Clone, Copy)]
pub struct PlanSelectors {
    /// Where the volume figure ("12,5 GB") is rendered.
    pub quantity: &'static [&'static str],
    /// Candidate top-up buttons.
    pub action: &'static [&'static str],
}

/// Selector table keyed by [`Plan`].
#[derive(Debug, Clone, Copy)]
pub struct LayoutTable {
    /// Plan label; probed before the plan is known.
    pub label: &'static [&'static str],
    pub standard: PlanSelectors,
    pub plus: PlanSelectors,
}

impl LayoutTable {
    pub fn for_plan(&self, plan: Plan) -> &PlanSelectors {
        match plan {
            Plan::Standard => &self.standard,
            Plan::Plus => &self.plus,
        }
    }

    /// Plan detection from the label text.
    pub fn plan_from_label(&self, label: &str) -> Plan {
        Plan::from_flag(label.contains(PLUS_MARKER))
    }
}

impl Default for LayoutTable {
    fn default() -> Self {
        PORTAL_LAYOUT
    }
}

/// Layout of the production portal.
pub const PORTAL_LAYOUT: LayoutTable = LayoutTable {
    label: &[
        "one-stack.usage-meter:nth-child(1) > one-usage-meter:nth-child(1) > one-button:nth-child(2)",
        "one-stack.usage-meter:nth-child(1) > one-stack:nth-child(1) > one-usage-meter:nth-child(1) > one-button:nth-child(2)",
    ],
    standard: PlanSelectors {
        quantity: &[
            "one-stack.usage-meter:nth-child(1) > one-usage-meter:nth-child(1) > one-group:nth-child(1) > one-heading:nth-child(2)",
            "one-stack.usage-meter:nth-child(1) > one-stack:nth-child(1) > one-usage-meter:nth-child(1) > one-group:nth-child(1) > one-heading:nth-child(2)",
        ],
        action: &[
            "one-stack.usage-meter:nth-child(1) > one-usage-meter:nth-child(1) > one-button:nth-child(3)",
            "one-stack.usage-meter:nth-child(1) > one-stack:nth-child(1) > one-usage-meter:nth-child(1) > one-button:nth-child(3)",
        ],
    },
    plus: PlanSelectors {
        quantity: &[
            "one-stack.usage-meter:nth-child(2) > one-usage-meter:nth-child(1) > one-group:nth-child(1) > one-heading:nth-child(2)",
            "one-stack.usage-meter:nth-child(2) > one-stack:nth-child(1) > one-usage-meter:nth-child(1) > one-group:nth-child(1) > one-heading:nth-child(2)",
        ],
        action: &[
            "one-stack.usage-meter:nth-child(2) > one-usage-meter:nth-child(1) > one-button:nth-child(3)",
            "one-stack.usage-meter:nth-child(2) > one-stack:nth-child(1) > one-usage-meter:nth-child(1) > one-button:nth-child(3)",
        ],
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_detection() {
        let table = LayoutTable::default();
        assert_eq!(table.plan_from_label("Inland & EU Datenvolumen"), Plan::Plus);
        assert_eq!(table.plan_from_label("Datenvolumen"), Plan::Standard);
        assert_eq!(table.plan_from_label(""), Plan::Standard);
    }

    #[test]
    fn test_every_list_has_both_layout_variants() {
        let table = LayoutTable::default();
        for plan in [Plan::Standard, Plan::Plus] {
            let s = table.for_plan(plan);
            assert_eq!(s.quantity.len(), 2);
            assert_eq!(s.action.len(), 2);
            assert!(s.quantity[1].contains("> one-stack:nth-child(1) >"));
        }
        assert!(table.plus.quantity[0].starts_with("one-stack.usage-meter:nth-child(2)"));
        assert!(table.standard.action[0].starts_with("one-stack.usage-meter:nth-child(1)"));
    }
}
