//! Per-unit outcomes collected after the barrier.

use serde::Serialize;

/// How a single unit's run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Succeeded,
    /// The unit returned an error. It is expected to have recorded the
    /// failure on its own target.
    Failed { reason: String },
    /// The unit panicked. Its target keeps whatever it mutated beforehand.
    Panicked { reason: String },
}

impl UnitStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub target: String,
    #[serde(flatten)]
    pub status: UnitStatus,
    pub elapsed_ms: u64,
}

/// Outcomes for one pass, in registry order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub outcomes: Vec<UnitOutcome>,
}

impl PassReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(target: &str, status: UnitStatus) -> UnitOutcome {
        UnitOutcome {
            target: target.into(),
            status,
            elapsed_ms: 3,
        }
    }

    #[test]
    fn counts_split_success_and_failure() {
        let report = PassReport {
            outcomes: vec![
                outcome("a", UnitStatus::Succeeded),
                outcome("b", UnitStatus::Failed { reason: "404".into() }),
                outcome("c", UnitStatus::Panicked { reason: "boom".into() }),
            ],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
        let names: Vec<_> = report.failures().map(|o| o.target.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn serializes_flat_status() {
        let json = serde_json::to_value(outcome(
            "b",
            UnitStatus::Failed {
                reason: "timeout".into(),
            },
        ))
        .unwrap();
        assert_eq!(json["target"], "b");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");
    }
}
