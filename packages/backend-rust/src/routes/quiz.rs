use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use flashcard_algo::{SelectionOutcome, SelectionStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthError, AuthUser};
use crate::response::{ok, AppError};
use crate::services::accuracy::{accuracy_summary, CardAccuracy};
use crate::services::pool::{PoolSpec, ALL_CARDS};
use crate::services::study::{self, normalize_pool};
use crate::services::EngineError;
use crate::state::AppState;
use crate::store::{AccuracyStats, Card, CardId, GroupId, StudyStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups", get(groups))
        .route("/start", post(start))
        .route("/next", post(next))
        .route("/answer", post(answer))
        .route("/stats", post(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    #[serde(default)]
    which_to_study: Option<String>,
    #[serde(default)]
    group_ids: Vec<GroupId>,
    #[serde(default)]
    selection_style: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    pool: Vec<CardId>,
    pool_size: usize,
    mode: &'static str,
    selection_style: SelectionStyle,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextRequest {
    #[serde(default)]
    selection_style: Option<String>,
    pool: Vec<CardId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NextResponse {
    card_id: CardId,
    card: Option<Card>,
    accuracy: AccuracyStats,
    percentage: f64,
    fallback: bool,
    outcome: SelectionOutcome,
    attempts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    card_id: CardId,
    correct: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerResponse {
    card_id: CardId,
    correct: u32,
    total: u32,
    percentage: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsRequest {
    pool: Vec<CardId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    cards: Vec<CardAccuracy>,
    attempted: usize,
}

async fn groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (store, _user) = require_user(&state, &headers)?;
    let groups = store
        .list_groups()
        .await
        .map_err(EngineError::StoreUnavailable)?;
    Ok(ok(groups))
}

async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = require_user(&state, &headers)?;
    let Json(payload) = payload.map_err(reject_body)?;

    let which = payload.which_to_study.as_deref().unwrap_or(ALL_CARDS);
    let spec = PoolSpec::from_form(which, &payload.group_ids)?;
    let selection_style = parse_style(payload.selection_style.as_deref())?;

    let pool = study::start_session(store.as_ref(), user.id, &spec).await?;

    Ok(ok(StartResponse {
        pool_size: pool.len(),
        pool,
        mode: spec.mode(),
        selection_style,
    }))
}

async fn next(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NextRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = require_user(&state, &headers)?;
    let Json(payload) = payload.map_err(reject_body)?;
    let style = parse_style(payload.selection_style.as_deref())?;

    let mut rng = StdRng::from_rng(&mut rand::rng());
    let next = study::next_card(
        store.as_ref(),
        state.selector(),
        &mut rng,
        user.id,
        style,
        &payload.pool,
    )
    .await?;

    let card = store
        .get_card(next.card_id)
        .await
        .map_err(EngineError::StoreUnavailable)?;

    Ok(ok(NextResponse {
        card_id: next.card_id,
        card,
        accuracy: next.accuracy,
        percentage: next.percentage,
        fallback: next.is_fallback(),
        outcome: next.outcome,
        attempts: next.attempts,
    }))
}

async fn answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = require_user(&state, &headers)?;
    let Json(payload) = payload.map_err(reject_body)?;

    let stats =
        study::submit_answer(store.as_ref(), user.id, payload.card_id, payload.correct).await?;

    Ok(ok(AnswerResponse {
        card_id: payload.card_id,
        correct: stats.correct,
        total: stats.total,
        percentage: stats.percentage(),
    }))
}

async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<StatsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = require_user(&state, &headers)?;
    let Json(payload) = payload.map_err(reject_body)?;

    let ids: HashSet<CardId> = normalize_pool(&payload.pool)?.into_iter().collect();
    let cards = accuracy_summary(store.as_ref(), user.id, &ids).await?;
    let attempted = cards.iter().filter(|card| card.total > 0).count();

    Ok(ok(StatsResponse { cards, attempted }))
}

fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Arc<dyn StudyStore>, AuthUser), AppError> {
    let user = auth::verify_request_token(headers).map_err(|err| match err {
        AuthError::MissingToken => AppError::unauthorized("Authentication token missing"),
        AuthError::MissingSecret => AppError::internal("JWT_SECRET is not configured"),
        _ => AppError::unauthorized("Authentication failed, please sign in again"),
    })?;

    let store = state
        .store()
        .ok_or_else(|| AppError::service_unavailable("Service unavailable"))?;

    Ok((store, user))
}

fn parse_style(value: Option<&str>) -> Result<SelectionStyle, AppError> {
    match value {
        None => Ok(SelectionStyle::default()),
        Some(raw) => raw
            .parse()
            .map_err(|err: flashcard_algo::ParseSelectionStyleError| {
                AppError::validation(err.to_string())
            }),
    }
}

fn reject_body(rejection: JsonRejection) -> AppError {
    AppError::validation(rejection.body_text())
}
