//! Plain-text statistics reports.

use std::collections::BTreeMap;
use std::path::Path;

use composite_common::{CompositeResult, SetLabel};
use tracing::info;

use crate::compare::{Comparison, ComparisonStats};

/// Mean differences of several Sets against one reference dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    reference: String,
    variable: String,
    entries: Vec<(SetLabel, ComparisonStats)>,
}

impl StatsReport {
    pub fn new(reference: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            variable: variable.into(),
            entries: Vec::new(),
        }
    }

    /// Report over `comparisons`, listing Sets in `order`. Labels missing
    /// from `comparisons` are skipped.
    pub fn from_comparisons(
        reference: impl Into<String>,
        variable: impl Into<String>,
        comparisons: &BTreeMap<SetLabel, Comparison>,
        order: &[SetLabel],
    ) -> Self {
        let mut report = Self::new(reference, variable);
        for label in order {
            if let Some(c) = comparisons.get(label) {
                report.push(label.clone(), c.stats);
            }
        }
        report
    }

    pub fn push(&mut self, label: SetLabel, stats: ComparisonStats) {
        self.entries.push((label, stats));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Report lines: every mean difference, then every mean % difference,
    /// then every absolute mean % difference.
    pub fn lines(&self) -> Vec<String> {
        let sections: [(&str, fn(&ComparisonStats) -> f64); 3] = [
            ("Average difference", |s| s.mean_diff),
            ("Average % difference", |s| s.mean_pct_diff),
            ("Absolute average % difference", |s| s.mean_abs_pct_diff),
        ];

        let mut lines = Vec::with_capacity(self.entries.len() * 3);
        for (prefix, value) in sections {
            for (label, stats) in &self.entries {
                lines.push(format!(
                    "{} between {} {} set for {} {:.2}",
                    prefix,
                    self.reference,
                    label,
                    self.variable,
                    value(stats)
                ));
            }
        }
        lines
    }

    pub fn render(&self) -> String {
        let mut out = self.lines().join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> CompositeResult<()> {
        std::fs::write(path.as_ref(), self.render())?;
        info!(path = %path.as_ref().display(), entries = self.entries.len(), "Wrote stats report");
        Ok(())
    }
}
