//! HTTP endpoint handlers. These are thin wrappers that forward to the gamification service.
//! Each handler is instrumented and logs include parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument, warn};

use crate::domain::BadgeCategory;
use crate::error::ServiceError;
use crate::protocol::*;
use crate::state::AppState;

impl ServiceError {
  pub fn status(&self) -> StatusCode {
    match self {
      ServiceError::AlreadyCompleted(_)
      | ServiceError::AlreadyJoined(_)
      | ServiceError::ConcurrentUpdateConflict(_) => StatusCode::CONFLICT,
      ServiceError::InvalidReference(_) => StatusCode::NOT_FOUND,
      ServiceError::NotParticipating(_)
      | ServiceError::ChallengeUnavailable(_)
      | ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ServiceError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ServiceError::Store(e) => {
        error!(target: "ecolearn_backend", error = %e, "Store failure");
        "internal storage error".to_string()
      }
      other => {
        warn!(target: "ecolearn_backend", status = status.as_u16(), error = %other, "Request rejected");
        other.to_string()
      }
    };
    (status, Json(ErrorOut { success: false, error: message })).into_response()
  }
}

type ApiResult<T> = Result<Json<ApiOut<T>>, ServiceError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

// -------- Catalogs --------

#[instrument(level = "info", skip(state))]
pub async fn http_list_challenges(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ChallengeListQuery>,
) -> ApiResult<Vec<crate::domain::EcoChallenge>> {
  let list = state.service.list_challenges(q.category.as_deref(), q.difficulty.as_deref()).await?;
  info!(target: "challenge", count = list.len(), "HTTP challenges listed");
  Ok(Json(ok(list)))
}

#[instrument(level = "info", skip(state, q), fields(%challenge_id))]
pub async fn http_get_challenge(
  State(state): State<Arc<AppState>>,
  Path(challenge_id): Path<String>,
  Query(q): Query<ChallengeDetailQuery>,
) -> ApiResult<crate::logic::ChallengeDetail> {
  let detail = state.service.challenge_detail(&challenge_id, q.user_id.as_deref()).await?;
  Ok(Json(ok(detail)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_leaderboard(
  State(state): State<Arc<AppState>>,
  Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<crate::logic::LeaderboardEntry>> {
  Ok(Json(ok(state.service.leaderboard(q.limit).await?)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_badges(
  State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<crate::domain::BadgeDefinition>> {
  Ok(Json(ok(state.service.list_badges(None).await?)))
}

#[instrument(level = "info", skip(state), fields(%badge_id))]
pub async fn http_get_badge(
  State(state): State<Arc<AppState>>,
  Path(badge_id): Path<String>,
) -> ApiResult<crate::domain::BadgeDefinition> {
  Ok(Json(ok(state.service.badge(&badge_id).await?)))
}

#[instrument(level = "info", skip(state), fields(%category))]
pub async fn http_badges_by_category(
  State(state): State<Arc<AppState>>,
  Path(category): Path<String>,
) -> ApiResult<Vec<crate::domain::BadgeDefinition>> {
  let parsed = BadgeCategory::parse(&category)
    .ok_or_else(|| ServiceError::InvalidInput(format!("unknown badge category {category}")))?;
  Ok(Json(ok(state.service.list_badges(Some(parsed)).await?)))
}

// -------- Eco challenges --------

#[instrument(level = "info", skip(state), fields(%user_id, %challenge_id))]
pub async fn http_join_challenge(
  State(state): State<Arc<AppState>>,
  Path((user_id, challenge_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<ApiOut<crate::domain::UserChallenge>>), ServiceError> {
  let participation = state.service.join_challenge(&user_id, &challenge_id).await?;
  Ok((StatusCode::CREATED, Json(ok(participation))))
}

/// The body is optional; an absent or unreadable one means "today, no impact".
#[instrument(level = "info", skip(state, body), fields(%user_id, %challenge_id))]
pub async fn http_complete_challenge_day(
  State(state): State<Arc<AppState>>,
  Path((user_id, challenge_id)): Path<(String, String)>,
  body: Option<Json<CompleteDayIn>>,
) -> ApiResult<crate::logic::AwardReceipt> {
  let Json(body) = body.unwrap_or_default();
  let receipt = state.service.award_challenge_day(&user_id, &challenge_id, body.date, body.impact).await?;
  info!(target: "challenge", %user_id, %challenge_id, points = receipt.points_awarded, "HTTP daily task completed");
  Ok(Json(ok(receipt)))
}

#[instrument(level = "info", skip(state, q), fields(%user_id))]
pub async fn http_user_challenges(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  Query(q): Query<StatusQuery>,
) -> ApiResult<Vec<crate::domain::UserChallenge>> {
  let status = parse_challenge_status(q.status.as_deref())?;
  Ok(Json(ok(state.service.user_challenges(&user_id, status).await?)))
}

// -------- Fun challenges --------

#[instrument(level = "info", skip(state, body), fields(%user_id, %challenge_id, category = %body.category))]
pub async fn http_complete_fun_challenge(
  State(state): State<Arc<AppState>>,
  Path((user_id, challenge_id)): Path<(String, String)>,
  Json(body): Json<FunChallengeIn>,
) -> ApiResult<crate::logic::AwardReceipt> {
  let receipt = state
    .service
    .award_fun_challenge(&user_id, &challenge_id, &body.title, &body.category, body.impact)
    .await?;
  Ok(Json(ok(receipt)))
}

#[instrument(level = "info", skip(state, q), fields(%user_id))]
pub async fn http_user_fun_challenges(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  Query(q): Query<StatusQuery>,
) -> ApiResult<Vec<crate::domain::FunChallengeRecord>> {
  let completed = parse_fun_status(q.status.as_deref())?;
  Ok(Json(ok(state.service.user_fun_challenges(&user_id, completed).await?)))
}

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn http_fun_challenge_stats(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<crate::logic::FunChallengeStats> {
  Ok(Json(ok(state.service.fun_challenge_stats(&user_id).await?)))
}

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn http_reset_fun_challenges(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<crate::logic::ResetOutcome> {
  let outcome = state.service.reset_fun_challenges(&user_id).await?;
  info!(target: "challenge", %user_id, removed = outcome.removed_challenges, "HTTP fun challenges reset");
  Ok(Json(ok(outcome)))
}

// -------- Quizzes --------

#[instrument(level = "info", skip(state, body), fields(%user_id, subject = %body.subject, difficulty = %body.difficulty))]
pub async fn http_submit_quiz(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  Json(body): Json<QuizAttemptIn>,
) -> Result<(StatusCode, Json<ApiOut<crate::logic::QuizAward>>), ServiceError> {
  let award = state.service.award_quiz_completion(&user_id, body.into_submission()).await?;
  info!(target: "quiz", %user_id, total = award.points.total, new_badges = award.new_badges.len(), "HTTP quiz scored");
  Ok((StatusCode::CREATED, Json(ok(award))))
}

#[instrument(level = "info", skip(state, q), fields(%user_id))]
pub async fn http_quiz_history(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<crate::domain::QuizAttempt>> {
  Ok(Json(ok(state.service.quiz_history(&user_id, q.limit.unwrap_or(10)).await?)))
}

// -------- Ledger & badges --------

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn http_user_points(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<crate::domain::UserLedger> {
  Ok(Json(ok(state.service.ledger_view(&user_id).await?)))
}

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn http_user_badges(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<Vec<crate::domain::EarnedBadge>> {
  Ok(Json(ok(state.service.user_badges(&user_id).await?)))
}

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn http_badge_progress(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<Vec<crate::logic::BadgeProgress>> {
  Ok(Json(ok(state.service.badge_progress(&user_id).await?)))
}

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn http_evaluate_badges(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<Vec<crate::domain::BadgeDefinition>> {
  let earned = state.service.evaluate_badges(&user_id).await?;
  info!(target: "badges", %user_id, earned = earned.len(), "HTTP badge evaluation");
  Ok(Json(ok(earned)))
}
