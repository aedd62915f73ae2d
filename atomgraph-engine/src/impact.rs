//! Risk scoring over traversal results
//!
//! Turns a traversal into an impact assessment: each reached atom
//! contributes its criticality decayed by distance, and the overall
//! severity is the strongest contribution, with a floor for critical
//! atoms reached at any depth.

use serde::{Deserialize, Serialize};

use crate::atom::{AtomId, Criticality};
use crate::graph::GraphSnapshot;
use crate::traversal::TraversalResult;

/// Overall severity classification, ordered
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    fn from_criticality(c: Criticality) -> Self {
        match c {
            Criticality::Low => Self::Low,
            Criticality::Medium => Self::Medium,
            Criticality::High => Self::High,
            Criticality::Critical => Self::Critical,
        }
    }

    /// Lower this severity by `tiers`, flooring at LOW
    fn decay(self, tiers: u32) -> Self {
        let mut current = self;
        for _ in 0..tiers {
            current = match current {
                Self::Critical => Self::High,
                Self::High => Self::Medium,
                Self::Medium | Self::Low => Self::Low,
            };
        }
        current
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// Scoring policy
///
/// The decay schedule and the critical-atom floor are tunable defaults,
/// not frozen constants.
#[derive(Debug, Clone)]
pub struct ImpactPolicy {
    /// Depth at and below which contributions keep their full weight
    pub full_weight_depth: u32,
    /// Maximum number of tiers a contribution can decay, however deep the
    /// atom was reached
    pub max_decay_tiers: u32,
    /// Minimum overall severity when any reached atom is CRITICAL
    pub critical_floor: Severity,
}

impl Default for ImpactPolicy {
    fn default() -> Self {
        Self {
            full_weight_depth: 1,
            max_decay_tiers: 2,
            critical_floor: Severity::Medium,
        }
    }
}

/// One reached atom's contribution to the assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactContribution {
    pub id: AtomId,
    pub depth: u32,
    pub criticality: Criticality,
    /// Criticality after depth decay
    pub contribution: Severity,
}

/// Assessment of a traversal result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAssessment {
    pub severity: Severity,
    pub contributions: Vec<ImpactContribution>,
    /// Set when the traversal reached nothing, to distinguish "no impact"
    /// from a failed analysis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Scores traversal results against a policy
#[derive(Debug, Clone, Default)]
pub struct ImpactScorer {
    policy: ImpactPolicy,
}

impl ImpactScorer {
    pub fn new(policy: ImpactPolicy) -> Self {
        Self { policy }
    }

    /// Assess a traversal result
    ///
    /// Atoms at depth `full_weight_depth` or less contribute their full
    /// criticality; each hop beyond that lowers the contribution one tier,
    /// capped at `max_decay_tiers` tiers and floored at LOW. The overall
    /// severity is the maximum contribution, raised to `critical_floor`
    /// when any reached atom is CRITICAL.
    pub fn score(&self, result: &TraversalResult, snapshot: &GraphSnapshot) -> ImpactAssessment {
        if result.is_empty() {
            return ImpactAssessment {
                severity: Severity::Low,
                contributions: Vec::new(),
                note: Some("no downstream/upstream dependents".to_string()),
            };
        }

        let mut contributions = Vec::with_capacity(result.len());
        let mut severity = Severity::Low;
        let mut any_critical = false;

        for reached in result.iter() {
            // atoms deleted between snapshot builds surface as dangling
            // references, never as a crash
            let Some(atom) = snapshot.get(&reached.id) else {
                tracing::warn!(id = %reached.id, "reached atom missing from snapshot, skipping");
                continue;
            };

            let tiers = reached
                .depth
                .saturating_sub(self.policy.full_weight_depth)
                .min(self.policy.max_decay_tiers);
            let contribution = Severity::from_criticality(atom.criticality).decay(tiers);

            severity = severity.max(contribution);
            any_critical |= atom.criticality == Criticality::Critical;

            contributions.push(ImpactContribution {
                id: reached.id.clone(),
                depth: reached.depth,
                criticality: atom.criticality,
                contribution,
            });
        }

        if any_critical {
            severity = severity.max(self.policy.critical_floor);
        }

        ImpactAssessment {
            severity,
            contributions,
            note: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Atom, AtomType, Edge, EdgeType};
    use crate::graph::Direction;
    use crate::traversal::TraversalEngine;
    use std::sync::Arc;

    fn atom(id: &str, criticality: Criticality) -> Atom {
        Atom::builder()
            .id(id)
            .atom_type(AtomType::Requirement)
            .title(format!("{id} title"))
            .criticality(criticality)
            .build()
            .unwrap()
    }

    fn assess(atoms: Vec<Atom>, edges: Vec<Edge>, start: &str, depth: u32) -> ImpactAssessment {
        let snapshot = Arc::new(GraphSnapshot::build(atoms, edges));
        let engine = TraversalEngine::new(Arc::clone(&snapshot));
        let result = engine
            .traverse(&start.into(), Direction::Downstream, depth)
            .unwrap();
        ImpactScorer::default().score(&result, &snapshot)
    }

    #[test]
    fn test_empty_result_is_low_with_note() {
        let assessment = assess(vec![atom("A", Criticality::Critical)], vec![], "A", 3);
        assert_eq!(assessment.severity, Severity::Low);
        assert!(assessment.contributions.is_empty());
        assert!(assessment.note.is_some());
    }

    #[test]
    fn test_depth_one_keeps_full_criticality() {
        let assessment = assess(
            vec![atom("A", Criticality::Low), atom("B", Criticality::High)],
            vec![Edge::new("A", "B", EdgeType::Requires)],
            "A",
            3,
        );
        assert_eq!(assessment.severity, Severity::High);
        assert_eq!(assessment.contributions[0].contribution, Severity::High);
    }

    #[test]
    fn test_depth_two_decays_one_tier() {
        let assessment = assess(
            vec![
                atom("A", Criticality::Low),
                atom("B", Criticality::Low),
                atom("C", Criticality::High),
            ],
            vec![
                Edge::new("A", "B", EdgeType::Requires),
                Edge::new("B", "C", EdgeType::Requires),
            ],
            "A",
            3,
        );
        let c = assessment
            .contributions
            .iter()
            .find(|c| c.id.as_str() == "C")
            .unwrap();
        assert_eq!(c.contribution, Severity::Medium);
        assert_eq!(assessment.severity, Severity::Medium);
    }

    #[test]
    fn test_critical_at_depth_three_is_at_least_medium() {
        let assessment = assess(
            vec![
                atom("A", Criticality::Low),
                atom("B", Criticality::Low),
                atom("C", Criticality::Low),
                atom("D", Criticality::Critical),
            ],
            vec![
                Edge::new("A", "B", EdgeType::Requires),
                Edge::new("B", "C", EdgeType::Requires),
                Edge::new("C", "D", EdgeType::Requires),
            ],
            "A",
            3,
        );
        // two-tier decay from CRITICAL would be MEDIUM; the floor keeps it there
        assert!(assessment.severity >= Severity::Medium);
        assert_ne!(assessment.severity, Severity::Low);
    }

    #[test]
    fn test_decay_caps_at_two_tiers_beyond_depth_three() {
        let assessment = assess(
            vec![
                atom("A", Criticality::Low),
                atom("B", Criticality::Low),
                atom("C", Criticality::Low),
                atom("D", Criticality::Low),
                atom("E", Criticality::Critical),
            ],
            vec![
                Edge::new("A", "B", EdgeType::Requires),
                Edge::new("B", "C", EdgeType::Requires),
                Edge::new("C", "D", EdgeType::Requires),
                Edge::new("D", "E", EdgeType::Requires),
            ],
            "A",
            4,
        );
        let e = assessment
            .contributions
            .iter()
            .find(|c| c.id.as_str() == "E")
            .unwrap();
        // depth 4 decays the same two tiers as depth 3
        assert_eq!(e.contribution, Severity::Medium);
        assert_eq!(assessment.severity, Severity::Medium);
    }

    #[test]
    fn test_low_atoms_stay_low() {
        let assessment = assess(
            vec![atom("A", Criticality::Low), atom("B", Criticality::Low)],
            vec![Edge::new("A", "B", EdgeType::References)],
            "A",
            3,
        );
        assert_eq!(assessment.severity, Severity::Low);
        assert!(assessment.note.is_none());
    }

    #[test]
    fn test_decay_floors_at_low() {
        assert_eq!(Severity::Medium.decay(5), Severity::Low);
        assert_eq!(Severity::Critical.decay(2), Severity::Medium);
        assert_eq!(Severity::Critical.decay(0), Severity::Critical);
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
    }
}
