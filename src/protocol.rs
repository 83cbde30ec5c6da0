//! Public protocol structs for HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{ChallengeStatus, Impact};
use crate::error::ServiceError;
use crate::logic::QuizSubmission;

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

/// Success envelope shared by every data endpoint.
#[derive(Debug, Serialize)]
pub struct ApiOut<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> ApiOut<T> {
    ApiOut { success: true, data }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub success: bool,
    pub error: String,
}

//
// Query strings
//

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeListQuery {
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeDetailQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Participation filter; defaults to active ones, `all` disables filtering.
pub fn parse_challenge_status(raw: Option<&str>) -> Result<Option<ChallengeStatus>, ServiceError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("active") => Ok(Some(ChallengeStatus::Active)),
        Some("completed") => Ok(Some(ChallengeStatus::Completed)),
        Some("abandoned") => Ok(Some(ChallengeStatus::Abandoned)),
        Some("all") => Ok(None),
        Some(other) => Err(ServiceError::InvalidInput(format!("unknown status {other}"))),
    }
}

/// Fun challenge filter; defaults to all records.
pub fn parse_fun_status(raw: Option<&str>) -> Result<Option<bool>, ServiceError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("all") => Ok(None),
        Some("completed") => Ok(Some(true)),
        Some("active") => Ok(Some(false)),
        Some(other) => Err(ServiceError::InvalidInput(format!("unknown status {other}"))),
    }
}

//
// Request bodies
//

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteDayIn {
    /// Calendar day being completed; today (UTC) when absent.
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub impact: Impact,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunChallengeIn {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub impact: Impact,
}

/// Timing may come pre-divided (`secondsPerQuestion`) or as the quiz screen
/// reports it: `timeTaken` in minutes over `totalQuestions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptIn {
    pub subject: String,
    pub difficulty: String,
    pub score_percentage: f64,
    pub seconds_per_question: Option<f64>,
    pub time_taken: Option<f64>,
    pub total_questions: Option<u32>,
}

impl QuizAttemptIn {
    pub fn into_submission(self) -> QuizSubmission {
        let seconds_per_question = self.seconds_per_question.or_else(|| match (self.time_taken, self.total_questions) {
            (Some(minutes), Some(n)) if n > 0 => Some(minutes * 60.0 / f64::from(n)),
            _ => None,
        });
        QuizSubmission {
            subject: self.subject,
            difficulty: self.difficulty,
            score_percentage: self.score_percentage,
            seconds_per_question,
        }
    }
}
