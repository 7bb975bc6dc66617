//! HTTP handlers for flashcard and quiz sessions.
//!
//! A session stores its deck (plant ids in presentation order) and the shuffle seed. Cards are
//! addressed by their index in the deck, so a quiz card never reveals which plant it shows until
//! it has been answered. Quiz choices are not stored; they are recomputed from the seed on every
//! read, see [`crate::study::quiz`].

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::{
        handlers::{
            not_found,
            plants::{favorite_ids, filtered_plants},
            visibility,
        },
        models::{
            pagination::{PaginatedResponse, Pagination},
            profiles::NameDisplay,
            study::{
                AnswerRequest, AnswerResult, CardAnswer, CardResponse, QuizChoice, RevealedPlant, SessionResponse, SessionScore,
                SessionSummary, StartSessionRequest, StudyMode,
            },
            users::CurrentUser,
        },
    },
    db::{
        handlers::{FlashcardAnswers, Plants, Profiles, Repository, StudySessions},
        models::{
            plants::PlantDBResponse,
            study::{FlashcardAnswerCreateDBRequest, StudySessionCreateDBRequest, StudySessionDBResponse},
        },
    },
    errors::Error,
    study::{
        answer::matches_name,
        deck::{build_deck, new_seed, resolve_card_count},
        quiz::choices_for_card,
        scoring::Scoreboard,
    },
    types::{PlantId, StudySessionId, abbrev_uuid},
};

/// Seeds are stored in a BIGINT column; the bits are kept as they are
fn seed_to_db(seed: u64) -> i64 {
    seed as i64
}

fn seed_from_db(seed: i64) -> u64 {
    seed as u64
}

/// Load a session owned by the caller. Other users' sessions look missing.
async fn own_session(
    conn: &mut PgConnection,
    user: &CurrentUser,
    id: StudySessionId,
    for_update: bool,
) -> Result<StudySessionDBResponse, Error> {
    let mut sessions = StudySessions::new(conn);
    let session = if for_update {
        sessions.get_for_update(id).await?
    } else {
        sessions.get(id).await?
    };

    match session {
        Some(session) if session.user_id == user.id => Ok(session),
        _ => Err(not_found("Study session", id)),
    }
}

/// Label for a quiz choice, honouring the scientific-name toggle
fn choice_label(display: NameDisplay, show_scientific_names: bool, plant: &PlantDBResponse) -> String {
    match display.visible_names(show_scientific_names) {
        (true, true) => NameDisplay::Both.label(&plant.common_name, &plant.scientific_name),
        (false, true) => plant.scientific_name.clone(),
        _ => plant.common_name.clone(),
    }
}

/// Build the full view of a session: progress, and every card with whatever the caller may see
/// of it at this point.
async fn session_response(
    conn: &mut PgConnection,
    state: &AppState,
    user: &CurrentUser,
    session: StudySessionDBResponse,
) -> Result<SessionResponse, Error> {
    let profile = Profiles::new(&mut *conn).get(user.id).await?;
    let (display, show_scientific) = profile
        .map(|p| (p.name_display, p.show_scientific_names))
        .unwrap_or((NameDisplay::default(), true));
    let (show_common, show_scientific_name) = display.visible_names(show_scientific);

    let mut answers = FlashcardAnswers::new(&mut *conn).list_for_session(session.id).await?;
    let by_card: HashMap<usize, bool> = answers
        .iter()
        .filter_map(|a| a.card_index.map(|i| (i as usize, a.correct)))
        .collect();
    answers.sort_by_key(|a| a.answered_at);
    let progress = Scoreboard::from_results(answers.iter().map(|a| a.correct));

    let mut plants = Plants::new(&mut *conn).get_bulk(session.plant_ids.clone()).await?;

    // Distractors may come from anywhere in the visible catalog, as long as they have a picture
    let catalog: Vec<PlantId> = if session.mode == StudyMode::Quiz {
        let visible = Plants::new(&mut *conn).list(&visibility(Some(user))).await?;
        let ids = visible.iter().filter(|p| p.primary_image_path.is_some()).map(|p| p.id).collect();
        for plant in visible {
            plants.entry(plant.id).or_insert(plant);
        }
        ids
    } else {
        Vec::new()
    };

    let seed = seed_from_db(session.seed);
    let cards = session
        .plant_ids
        .iter()
        .enumerate()
        .map(|(index, plant_id)| {
            let plant = plants.get(plant_id);
            let correct = by_card.get(&index).copied();
            let answered = correct.is_some();
            let reveal_names = session.mode == StudyMode::Flashcards || answered;

            let choices = (session.mode == StudyMode::Quiz).then(|| {
                choices_for_card(*plant_id, index, seed, &session.plant_ids, &catalog, state.config.study.quiz_choices)
                    .into_iter()
                    .filter_map(|id| plants.get(&id))
                    .map(|choice| QuizChoice {
                        plant_id: choice.id,
                        label: choice_label(display, show_scientific, choice),
                    })
                    .collect()
            });

            CardResponse {
                index,
                image_url: plant
                    .and_then(|p| p.primary_image_path.as_deref())
                    .map(|key| state.config.storage.url_for(key)),
                common_name: plant.filter(|_| reveal_names && show_common).map(|p| p.common_name.clone()),
                scientific_name: plant
                    .filter(|_| reveal_names && show_scientific_name)
                    .map(|p| p.scientific_name.clone()),
                choices,
                answered,
                correct,
                removed: plant.is_none(),
            }
        })
        .collect();

    Ok(SessionResponse {
        seed: (session.mode == StudyMode::Flashcards).then_some(session.seed),
        session: SessionSummary::from(&session),
        progress,
        cards,
    })
}

/// Start a study session
///
/// The deck is drawn from the plants the caller can see: the given collection's members, or the
/// whole catalog, narrowed by `filter`. Quiz decks only use plants that have a primary image.
#[utoipa::path(
    post,
    path = "/study/sessions",
    tag = "study",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = SessionResponse),
        (status = 400, description = "No plants match"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn start_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut filter = request.filter.unwrap_or_default();
    if request.collection_id.is_some() {
        filter.collection_id = request.collection_id;
    }

    let favorites = favorite_ids(&mut conn, Some(&current_user)).await?;
    let mut candidates = filtered_plants(&mut conn, Some(&current_user), &filter, favorites).await?;
    if request.mode == StudyMode::Quiz {
        candidates.retain(|p| p.primary_image_path.is_some());
    }
    if candidates.is_empty() {
        return Err(Error::BadRequest {
            message: match request.mode {
                StudyMode::Quiz => "No plants with images match; quizzes need a picture for every card".to_string(),
                StudyMode::Flashcards => "No plants match".to_string(),
            },
        });
    }

    let profile_default = Profiles::new(&mut conn)
        .get(current_user.id)
        .await?
        .map(|p| p.cards_per_session)
        .unwrap_or(state.config.study.default_cards_per_session as i32);
    let card_count = resolve_card_count(request.card_count, profile_default, state.config.study.max_cards_per_session);
    let seed = request.seed.unwrap_or_else(new_seed);
    let deck = build_deck(candidates.into_iter().map(|p| p.id).collect(), seed, card_count);

    let session = StudySessions::new(&mut conn)
        .create(&StudySessionCreateDBRequest {
            user_id: current_user.id,
            mode: request.mode,
            collection_id: filter.collection_id,
            plant_ids: deck,
            seed: seed_to_db(seed),
        })
        .await?;

    tracing::info!(session_id = %abbrev_uuid(&session.id), mode = ?session.mode, cards = session.total_cards, "Started study session");

    let response = session_response(&mut conn, &state, &current_user, session).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the caller's sessions, most recent first
#[utoipa::path(
    get,
    path = "/study/sessions",
    tag = "study",
    params(Pagination),
    responses(
        (status = 200, description = "Page of sessions", body = PaginatedResponse<SessionSummary>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn list_sessions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<SessionSummary>>, Error> {
    let (skip, limit) = pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut sessions = StudySessions::new(&mut conn);
    let total = sessions.count_for_user(current_user.id).await?;
    let page = sessions.list_for_user(current_user.id, skip, limit).await?;

    Ok(Json(PaginatedResponse::new(
        page.iter().map(SessionSummary::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Get a session with its cards
#[utoipa::path(
    get,
    path = "/study/sessions/{id}",
    tag = "study",
    params(("id" = uuid::Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "The session", body = SessionResponse),
        (status = 404, description = "Session not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(session_id = %abbrev_uuid(&id)))]
pub async fn get_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<StudySessionId>,
) -> Result<Json<SessionResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let session = own_session(&mut conn, &current_user, id, false).await?;
    Ok(Json(session_response(&mut conn, &state, &current_user, session).await?))
}

/// Answer a card
///
/// `choice` answers are only accepted in quiz sessions; `self_assessed` and `typed` only in
/// flashcard sessions. Each card can be answered once.
#[utoipa::path(
    post,
    path = "/study/sessions/{id}/answers",
    tag = "study",
    request_body = AnswerRequest,
    params(("id" = uuid::Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Whether the answer was right, and the plant behind the card", body = AnswerResult),
        (status = 400, description = "No such card, or an answer type the session's mode does not accept"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Card already answered or removed, or session finished"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(session_id = %abbrev_uuid(&id), card_index = request.card_index))]
pub async fn answer_card(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<StudySessionId>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResult>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    // Row lock serialises concurrent answers to the same session
    let session = own_session(&mut tx, &current_user, id, true).await?;

    if session.finished_at.is_some() {
        return Err(Error::Conflict {
            message: "This session is already finished".to_string(),
        });
    }
    let Some(&plant_id) = session.plant_ids.get(request.card_index) else {
        return Err(Error::BadRequest {
            message: format!("Card {} does not exist; the deck has {} cards", request.card_index, session.plant_ids.len()),
        });
    };
    if !request.response.allowed_in(session.mode) {
        return Err(Error::BadRequest {
            message: match session.mode {
                StudyMode::Quiz => "Quiz cards are answered by picking a choice".to_string(),
                StudyMode::Flashcards => "Flashcards are answered by self-assessment or a typed guess".to_string(),
            },
        });
    }

    let Some(plant) = Plants::new(&mut tx).get_by_id(plant_id).await? else {
        return Err(Error::Conflict {
            message: format!("Card {} was removed because its plant was deleted", request.card_index),
        });
    };

    let (correct, answer) = match &request.response {
        CardAnswer::SelfAssessed { correct } => (*correct, None),
        CardAnswer::Typed { guess } => (
            matches_name(guess, &plant.common_name, &plant.scientific_name),
            Some(guess.trim().to_string()),
        ),
        CardAnswer::Choice { plant_id: picked } => (*picked == plant.id, Some(picked.to_string())),
    };

    FlashcardAnswers::new(&mut tx)
        .create(&FlashcardAnswerCreateDBRequest {
            session_id: Some(session.id),
            card_index: Some(request.card_index as i32),
            user_id: current_user.id,
            plant_id: plant.id,
            correct,
            answer,
        })
        .await?;
    let session = StudySessions::new(&mut tx).record_answer(session.id, correct).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::debug!(correct, answered = session.answered_count, total = session.total_cards, "Recorded answer");

    Ok(Json(AnswerResult {
        card_index: request.card_index,
        correct,
        plant: RevealedPlant {
            plant_id: plant.id,
            common_name: plant.common_name,
            scientific_name: plant.scientific_name,
        },
        score: SessionScore::of(&session),
        finished: session.finished_at.is_some(),
    }))
}

/// Finish a session early and get the final score. Finishing twice is harmless.
#[utoipa::path(
    post,
    path = "/study/sessions/{id}/finish",
    tag = "study",
    params(("id" = uuid::Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Final score", body = SessionScore),
        (status = 404, description = "Session not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(session_id = %abbrev_uuid(&id)))]
pub async fn finish_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<StudySessionId>,
) -> Result<Json<SessionScore>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    own_session(&mut conn, &current_user, id, false).await?;

    let session = StudySessions::new(&mut conn).finish(id).await?;
    Ok(Json(SessionScore::of(&session)))
}
