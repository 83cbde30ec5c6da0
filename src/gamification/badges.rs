//! Badge eligibility and progress over a snapshot of user statistics.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{Requirement, RequirementKind, RequirementValue};

/// Statistics a badge requirement is measured against.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_points: i64,
    pub total_attempts: u32,
    pub current_streak: u32,
    pub average_score: f64,
    pub subject_attempts: HashMap<String, u32>,
    pub difficulty_attempts: HashMap<String, u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Progress {
    pub current: f64,
    pub target: f64,
    pub percent: f64,
}

impl Progress {
    fn new(current: f64, target: f64) -> Self {
        let percent = if target <= 0.0 {
            100.0
        } else {
            (current / target * 100.0).clamp(0.0, 100.0)
        };
        Self { current, target, percent }
    }
}

fn threshold(requirement: &Requirement) -> Option<f64> {
    match &requirement.value {
        RequirementValue::Threshold(v) => Some(*v),
        RequirementValue::Clauses(_) => None,
    }
}

/// Measured value for a `count` requirement; `None` when the subject or
/// difficulty it targets has never been attempted.
fn count_measure(requirement: &Requirement, stats: &UserStats) -> Option<f64> {
    if let Some(subject) = &requirement.subject {
        return stats.subject_attempts.get(subject).map(|n| f64::from(*n));
    }
    if let Some(difficulty) = &requirement.difficulty {
        return stats.difficulty_attempts.get(difficulty).map(|n| f64::from(*n));
    }
    Some(f64::from(stats.total_attempts))
}

/// Combination clauses understood here; any other key is ignored.
fn clause_measure(key: &str, stats: &UserStats) -> Option<f64> {
    match key {
        "points" => Some(stats.total_points as f64),
        "streak" => Some(f64::from(stats.current_streak)),
        "score" => Some(stats.average_score),
        "attempts" => Some(f64::from(stats.total_attempts)),
        _ => None,
    }
}

/// Fails closed: unknown kinds and value-shape mismatches are never eligible.
pub fn is_eligible(requirement: &Requirement, stats: &UserStats) -> bool {
    match requirement.kind {
        RequirementKind::Points => {
            threshold(requirement).is_some_and(|v| stats.total_points as f64 >= v)
        }
        RequirementKind::Count => match (threshold(requirement), count_measure(requirement, stats)) {
            (Some(v), Some(n)) => n >= v,
            _ => false,
        },
        RequirementKind::Streak => {
            threshold(requirement).is_some_and(|v| f64::from(stats.current_streak) >= v)
        }
        RequirementKind::Score => threshold(requirement).is_some_and(|v| stats.average_score >= v),
        RequirementKind::Combination => match &requirement.value {
            RequirementValue::Clauses(clauses) => clauses
                .iter()
                .filter_map(|(key, v)| clause_measure(key, stats).map(|m| m >= *v))
                .all(|ok| ok),
            RequirementValue::Threshold(_) => false,
        },
        RequirementKind::Unknown => false,
    }
}

/// How far along a user is towards a requirement. For combinations the least
/// satisfied recognised clause is reported.
pub fn requirement_progress(requirement: &Requirement, stats: &UserStats) -> Option<Progress> {
    match requirement.kind {
        RequirementKind::Points => {
            threshold(requirement).map(|v| Progress::new(stats.total_points as f64, v))
        }
        RequirementKind::Count => {
            let v = threshold(requirement)?;
            Some(Progress::new(count_measure(requirement, stats).unwrap_or(0.0), v))
        }
        RequirementKind::Streak => {
            threshold(requirement).map(|v| Progress::new(f64::from(stats.current_streak), v))
        }
        RequirementKind::Score => threshold(requirement).map(|v| Progress::new(stats.average_score, v)),
        RequirementKind::Combination => match &requirement.value {
            RequirementValue::Clauses(clauses) => clauses
                .iter()
                .filter_map(|(key, v)| clause_measure(key, stats).map(|m| Progress::new(m, *v)))
                .min_by(|a, b| a.percent.total_cmp(&b.percent)),
            RequirementValue::Threshold(_) => None,
        },
        RequirementKind::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn req(kind: RequirementKind, value: f64) -> Requirement {
        Requirement { kind, value: RequirementValue::Threshold(value), subject: None, difficulty: None }
    }

    fn combo(pairs: &[(&str, f64)]) -> Requirement {
        let clauses: BTreeMap<String, f64> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Requirement {
            kind: RequirementKind::Combination,
            value: RequirementValue::Clauses(clauses),
            subject: None,
            difficulty: None,
        }
    }

    fn stats() -> UserStats {
        UserStats {
            total_points: 1200,
            total_attempts: 6,
            current_streak: 3,
            average_score: 82.5,
            subject_attempts: HashMap::from([("Renewable Energy Sources".to_string(), 5)]),
            difficulty_attempts: HashMap::from([("advanced".to_string(), 2)]),
        }
    }

    #[test]
    fn scalar_kinds() {
        let s = stats();
        assert!(is_eligible(&req(RequirementKind::Points, 1000.0), &s));
        assert!(!is_eligible(&req(RequirementKind::Points, 5000.0), &s));
        assert!(is_eligible(&req(RequirementKind::Streak, 3.0), &s));
        assert!(!is_eligible(&req(RequirementKind::Streak, 7.0), &s));
        assert!(is_eligible(&req(RequirementKind::Score, 80.0), &s));
        assert!(!is_eligible(&req(RequirementKind::Score, 100.0), &s));
    }

    #[test]
    fn count_prefers_subject_then_difficulty() {
        let s = stats();
        let mut r = req(RequirementKind::Count, 5.0);
        assert!(is_eligible(&r, &s));

        r.subject = Some("Renewable Energy Sources".into());
        assert!(is_eligible(&r, &s));
        r.subject = Some("Biodiversity & Ecosystems".into());
        assert!(!is_eligible(&r, &s));

        let mut r = req(RequirementKind::Count, 2.0);
        r.difficulty = Some("advanced".into());
        assert!(is_eligible(&r, &s));
        r.difficulty = Some("beginner".into());
        assert!(!is_eligible(&r, &s));
    }

    #[test]
    fn missing_subject_is_not_eligible_even_for_zero() {
        let mut r = req(RequirementKind::Count, 0.0);
        r.subject = Some("Oceans".into());
        assert!(!is_eligible(&r, &stats()));
    }

    #[test]
    fn combination_is_a_conjunction() {
        let s = stats();
        assert!(!is_eligible(&combo(&[("points", 1000.0), ("streak", 7.0)]), &s));
        assert!(is_eligible(&combo(&[("points", 1000.0), ("streak", 3.0), ("attempts", 6.0)]), &s));
    }

    #[test]
    fn combination_ignores_unknown_keys() {
        let s = stats();
        assert!(is_eligible(&combo(&[("points", 100.0), ("timeTaken", 2.0)]), &s));
        assert!(is_eligible(&combo(&[("subjects", 5.0)]), &s));
    }

    #[test]
    fn fails_closed_on_bad_shapes() {
        let s = stats();
        assert!(!is_eligible(&req(RequirementKind::Unknown, 0.0), &s));
        assert!(!is_eligible(&req(RequirementKind::Combination, 1.0), &s));
        let mut r = combo(&[("points", 1.0)]);
        r.kind = RequirementKind::Points;
        assert!(!is_eligible(&r, &s));
    }

    #[test]
    fn progress_reports_weakest_clause() {
        let s = stats();
        let p = requirement_progress(&combo(&[("points", 1000.0), ("streak", 6.0)]), &s).unwrap();
        assert_eq!(p.target, 6.0);
        assert_eq!(p.percent, 50.0);

        let p = requirement_progress(&req(RequirementKind::Points, 2400.0), &s).unwrap();
        assert_eq!(p.percent, 50.0);
        let p = requirement_progress(&req(RequirementKind::Points, 100.0), &s).unwrap();
        assert_eq!(p.percent, 100.0);
        assert!(requirement_progress(&req(RequirementKind::Unknown, 1.0), &s).is_none());
    }
}
