//! Decision distribution over a finished batch.

use std::collections::HashMap;

use serde::Serialize;

use super::types::AgentResult;

/// Decision counts for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSummary {
    pub attribute: String,
    pub total: usize,
    /// Decision (trimmed, lowercased) to count, in first-seen order.
    pub decisions: Vec<(String, usize)>,
}

impl AttributeSummary {
    pub fn count(&self, decision: &str) -> usize {
        let key = normalize(decision);
        self.decisions
            .iter()
            .find(|(d, _)| *d == key)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    /// Share of this attribute's results with `decision`, in percent.
    pub fn percentage(&self, decision: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(decision) as f64 * 100.0 / self.total as f64
    }
}

/// Per-attribute decision distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionSummary {
    pub attributes: Vec<AttributeSummary>,
}

impl DecisionSummary {
    /// Groups results by attribute, keeping the order attributes first appear.
    pub fn from_results(results: &[AgentResult]) -> Self {
        let mut attributes: Vec<AttributeSummary> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for result in results {
            let slot = *index.entry(result.attribute.as_str()).or_insert_with(|| {
                attributes.push(AttributeSummary {
                    attribute: result.attribute.clone(),
                    total: 0,
                    decisions: Vec::new(),
                });
                attributes.len() - 1
            });

            let summary = &mut attributes[slot];
            summary.total += 1;

            let key = normalize(&result.result.decision);
            match summary.decisions.iter_mut().find(|(d, _)| *d == key) {
                Some((_, n)) => *n += 1,
                None => summary.decisions.push((key, 1)),
            }
        }

        Self { attributes }
    }

    pub fn attribute(&self, attribute: &str) -> Option<&AttributeSummary> {
        self.attributes.iter().find(|a| a.attribute == attribute)
    }

    /// Percentage of `attribute`'s results that chose `decision`. Zero when
    /// the attribute has no results.
    pub fn percentage(&self, attribute: &str, decision: &str) -> f64 {
        self.attribute(attribute)
            .map(|a| a.percentage(decision))
            .unwrap_or(0.0)
    }

    /// Number of successful results summarized.
    pub fn succeeded(&self) -> usize {
        self.attributes.iter().map(|a| a.total).sum()
    }
}

fn normalize(decision: &str) -> String {
    decision.trim().to_lowercase()
}
