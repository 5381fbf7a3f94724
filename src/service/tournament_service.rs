use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::clan::ClanRole;
use crate::models::common::{ListResponse, PageQuery};
use crate::models::discord::NotificationType;
use crate::models::tournament::{
    CreateTournamentRequest, FinalizeTournamentRequest, MatchStatus, ParticipantResponse, ReportMatchResultRequest,
    Tournament, TournamentDetailResponse, TournamentFormat, TournamentListQuery, TournamentMatch,
    TournamentParticipant, TournamentStatus, TournamentSummary, UpdateTournamentRequest,
};
use crate::service::bracket::{self, MatchOutcome, Slot};
use crate::service::discord_service::DiscordNotifier;
use crate::service::live_hub::{tournament_topic, LiveHub};
use crate::service::user_service::fetch_user_summaries;
use chrono::Utc;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct TournamentService {
    db_pool: DbPool,
    live: LiveHub,
    notifier: DiscordNotifier,
}

impl TournamentService {
    pub fn new(db_pool: DbPool, live: LiveHub, notifier: DiscordNotifier) -> Self {
        Self {
            db_pool,
            live,
            notifier,
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn list_tournaments(
        &self,
        filter: &TournamentListQuery,
        page: &PageQuery,
    ) -> Result<ListResponse<TournamentSummary>, ApiError> {
        let tournaments = sqlx::query_as::<_, Tournament>(
            r#"
            SELECT * FROM tournaments
            WHERE ($1::tournament_status IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR game = $2)
            ORDER BY start_time ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.status)
        .bind(&filter.game)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tournaments
            WHERE ($1::tournament_status IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR game = $2)
            "#,
        )
        .bind(filter.status)
        .bind(&filter.game)
        .fetch_one(&self.db_pool)
        .await?;

        let ids: Vec<Uuid> = tournaments.iter().map(|t| t.id).collect();
        let counts: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT tournament_id, COUNT(*) FROM tournament_participants
            WHERE tournament_id = ANY($1) GROUP BY tournament_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .collect();

        let items = tournaments
            .into_iter()
            .map(|tournament| TournamentSummary {
                participant_count: counts.get(&tournament.id).copied().unwrap_or(0),
                tournament,
            })
            .collect();

        Ok(ListResponse::new(items, total, page))
    }

    pub async fn get_tournament(&self, tournament_id: Uuid) -> Result<TournamentDetailResponse, ApiError> {
        let tournament = self.find_tournament(tournament_id).await?;

        let participants = self.participants(tournament_id).await?;
        let user_ids: Vec<Uuid> = participants.iter().map(|p| p.user_id).collect();
        let users = fetch_user_summaries(&self.db_pool, &user_ids).await?;

        let participants = participants
            .into_iter()
            .map(|p| ParticipantResponse {
                username: users
                    .get(&p.user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                user_id: p.user_id,
                seed: p.seed,
                registered_at: p.registered_at,
            })
            .collect();

        let matches = sqlx::query_as::<_, TournamentMatch>(
            r#"
            SELECT * FROM tournament_matches
            WHERE tournament_id = $1
            ORDER BY round_number ASC, match_number ASC
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(TournamentDetailResponse {
            tournament,
            participants,
            matches,
        })
    }

    async fn find_tournament(&self, tournament_id: Uuid) -> Result<Tournament, ApiError> {
        sqlx::query_as::<_, Tournament>("SELECT * FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Tournament not found"))
    }

    async fn participants(&self, tournament_id: Uuid) -> Result<Vec<TournamentParticipant>, ApiError> {
        let participants = sqlx::query_as::<_, TournamentParticipant>(
            "SELECT * FROM tournament_participants WHERE tournament_id = $1 ORDER BY seed ASC",
        )
        .bind(tournament_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(participants)
    }

    fn require_organizer(tournament: &Tournament, user_id: Uuid) -> Result<(), ApiError> {
        if tournament.organizer_id != user_id {
            return Err(ApiError::forbidden("Only the organizer can do this"));
        }
        Ok(())
    }

    // ========================================================================
    // TOURNAMENT LIFECYCLE
    // ========================================================================

    pub async fn create_tournament(
        &self,
        organizer_id: Uuid,
        request: CreateTournamentRequest,
    ) -> Result<Tournament, ApiError> {
        request.validate()?;

        if let Some(clan_id) = request.clan_id {
            let role: Option<ClanRole> = sqlx::query_scalar(
                "SELECT role FROM clan_members WHERE clan_id = $1 AND user_id = $2",
            )
            .bind(clan_id)
            .bind(organizer_id)
            .fetch_optional(&self.db_pool)
            .await?;

            if !role.is_some_and(|r| r.can_host_tournaments()) {
                return Err(ApiError::forbidden(
                    "Only clan officers and above can host clan tournaments",
                ));
            }
        }

        let tournament = sqlx::query_as::<_, Tournament>(
            r#"
            INSERT INTO tournaments (
                id, name, description, game, format, max_participants,
                start_time, registration_deadline, rules, clan_id, organizer_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.game)
        .bind(request.format)
        .bind(request.max_participants)
        .bind(request.start_time)
        .bind(request.registration_deadline)
        .bind(&request.rules)
        .bind(request.clan_id)
        .bind(organizer_id)
        .fetch_one(&self.db_pool)
        .await?;

        info!(
            tournament_id = %tournament.id,
            organizer_id = %organizer_id,
            format = %tournament.format,
            "Tournament created"
        );

        Ok(tournament)
    }

    pub async fn update_tournament(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        request: UpdateTournamentRequest,
    ) -> Result<Tournament, ApiError> {
        request.validate()?;

        let tournament = self.find_tournament(tournament_id).await?;
        Self::require_organizer(&tournament, user_id)?;

        if tournament.status != TournamentStatus::RegistrationOpen
            || tournament.bracket_generated_at.is_some()
        {
            return Err(ApiError::conflict("Tournament can no longer be edited"));
        }

        let start = request.start_time.unwrap_or(tournament.start_time);
        let deadline = request
            .registration_deadline
            .unwrap_or(tournament.registration_deadline);
        if deadline > start {
            return Err(ApiError::bad_request(
                "Registration deadline must not be after the start time",
            ));
        }

        if let Some(max) = request.max_participants {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM tournament_participants WHERE tournament_id = $1",
            )
            .bind(tournament_id)
            .fetch_one(&self.db_pool)
            .await?;
            if i64::from(max) < count {
                return Err(ApiError::bad_request(
                    "max_participants cannot be below the current participant count",
                ));
            }
        }

        let updated = sqlx::query_as::<_, Tournament>(
            r#"
            UPDATE tournaments SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                max_participants = COALESCE($4, max_participants),
                start_time = $5,
                registration_deadline = $6,
                rules = COALESCE($7, rules),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tournament_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.max_participants)
        .bind(start)
        .bind(deadline)
        .bind(&request.rules)
        .fetch_one(&self.db_pool)
        .await?;

        info!(tournament_id = %tournament_id, user_id = %user_id, "Tournament updated");

        Ok(updated)
    }

    /// Cancel a started tournament, or delete one that never started.
    pub async fn delete_tournament(&self, tournament_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let tournament = self.find_tournament(tournament_id).await?;
        Self::require_organizer(&tournament, user_id)?;

        match tournament.status {
            TournamentStatus::RegistrationOpen | TournamentStatus::Cancelled => {
                sqlx::query("DELETE FROM tournaments WHERE id = $1")
                    .bind(tournament_id)
                    .execute(&self.db_pool)
                    .await?;
                info!(tournament_id = %tournament_id, "Tournament deleted");
            }
            status if status.can_transition_to(TournamentStatus::Cancelled) => {
                sqlx::query(
                    "UPDATE tournaments SET status = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(tournament_id)
                .bind(TournamentStatus::Cancelled)
                .execute(&self.db_pool)
                .await?;

                self.live.publish(
                    tournament_topic(tournament_id),
                    json!({ "type": "tournament_cancelled", "tournament_id": tournament_id }),
                );
                info!(tournament_id = %tournament_id, "Tournament cancelled");
            }
            _ => return Err(ApiError::conflict("Completed tournaments cannot be removed")),
        }

        Ok(())
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    pub async fn register(&self, tournament_id: Uuid, user_id: Uuid) -> Result<TournamentParticipant, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let tournament = lock_tournament(&mut tx, tournament_id).await?;
        if !tournament.is_registration_open(Utc::now()) {
            return Err(ApiError::bad_request("Registration is closed"));
        }

        let (count, max_seed): (i64, Option<i32>) = sqlx::query_as(
            "SELECT COUNT(*), MAX(seed) FROM tournament_participants WHERE tournament_id = $1",
        )
        .bind(tournament_id)
        .fetch_one(&mut *tx)
        .await?;

        if count >= i64::from(tournament.max_participants) {
            return Err(ApiError::conflict("Tournament is full"));
        }

        let participant = sqlx::query_as::<_, TournamentParticipant>(
            r#"
            INSERT INTO tournament_participants (tournament_id, user_id, seed)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(max_seed.unwrap_or(0) + 1)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::from_db_with_conflict(e, "Already registered for this tournament"))?;

        tx.commit().await?;

        info!(tournament_id = %tournament_id, user_id = %user_id, seed = participant.seed, "Registered for tournament");

        Ok(participant)
    }

    pub async fn withdraw(&self, tournament_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let tournament = self.find_tournament(tournament_id).await?;
        if tournament.bracket_generated_at.is_some()
            || tournament.status != TournamentStatus::RegistrationOpen
        {
            return Err(ApiError::conflict("The bracket has already been generated"));
        }

        let result = sqlx::query(
            "DELETE FROM tournament_participants WHERE tournament_id = $1 AND user_id = $2",
        )
        .bind(tournament_id)
        .bind(user_id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("You are not registered for this tournament"));
        }

        info!(tournament_id = %tournament_id, user_id = %user_id, "Withdrew from tournament");
        Ok(())
    }

    // ========================================================================
    // BRACKET
    // ========================================================================

    /// Generate and persist the bracket, moving the tournament to in_progress.
    pub async fn generate_bracket(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<TournamentMatch>, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let tournament = lock_tournament(&mut tx, tournament_id).await?;
        Self::require_organizer(&tournament, user_id)?;

        if tournament.bracket_generated_at.is_some() {
            return Err(ApiError::conflict("Bracket already generated"));
        }
        if !tournament.status.can_transition_to(TournamentStatus::InProgress) {
            return Err(ApiError::conflict("Tournament is not accepting a bracket"));
        }

        let seeded: Vec<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM tournament_participants WHERE tournament_id = $1 ORDER BY seed ASC",
        )
        .bind(tournament_id)
        .fetch_all(&mut *tx)
        .await?;

        let generated = bracket::generate(tournament.format, &seeded)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        let now = Utc::now();
        let mut matches = Vec::with_capacity(generated.matches.len());
        for m in &generated.matches {
            let status = if m.is_bye {
                MatchStatus::Completed
            } else {
                MatchStatus::Pending
            };
            let row = sqlx::query_as::<_, TournamentMatch>(
                r#"
                INSERT INTO tournament_matches (
                    id, tournament_id, round_number, match_number, player1_id, player2_id,
                    winner_id, status, is_bye, completed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tournament_id)
            .bind(m.round)
            .bind(m.match_number)
            .bind(m.player1)
            .bind(m.player2)
            .bind(m.winner)
            .bind(status)
            .bind(m.is_bye)
            .bind(if m.is_bye { Some(now) } else { None })
            .fetch_one(&mut *tx)
            .await?;
            matches.push(row);
        }

        sqlx::query(
            r#"
            UPDATE tournaments
            SET status = $2, bracket_generated_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(tournament_id)
        .bind(TournamentStatus::InProgress)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            tournament_id = %tournament_id,
            participants = seeded.len(),
            matches = matches.len(),
            size = generated.size,
            byes = generated.byes,
            winners_rounds = generated.winners_rounds,
            losers_rounds = generated.losers_rounds,
            grand_final_rounds = generated.grand_final_rounds,
            total_rounds = generated.total_rounds,
            "Bracket generated"
        );

        self.live.publish(
            tournament_topic(tournament_id),
            json!({
                "type": "bracket_generated",
                "tournament_id": tournament_id,
                "total_rounds": generated.total_rounds,
            }),
        );
        self.notifier.notify(
            seeded,
            NotificationType::TournamentStart,
            format!("{} has started! Check the bracket for your first match.", tournament.name),
        );

        Ok(matches)
    }

    /// Record a match result and advance the bracket.
    pub async fn report_result(
        &self,
        tournament_id: Uuid,
        match_id: Uuid,
        user_id: Uuid,
        request: ReportMatchResultRequest,
    ) -> Result<TournamentMatch, ApiError> {
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;
        let tournament = lock_tournament(&mut tx, tournament_id).await?;

        if !tournament.status.can_transition_to(TournamentStatus::Completed) {
            return Err(ApiError::conflict("Tournament is not in progress"));
        }

        let game = sqlx::query_as::<_, TournamentMatch>(
            "SELECT * FROM tournament_matches WHERE id = $1 AND tournament_id = $2 FOR UPDATE",
        )
        .bind(match_id)
        .bind(tournament_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Match not found"))?;

        if tournament.organizer_id != user_id && !game.has_player(user_id) {
            return Err(ApiError::forbidden("Only the organizer or a player can report this match"));
        }
        if game.status == MatchStatus::Completed {
            return Err(ApiError::conflict("Match already completed"));
        }
        if game.player1_id.is_none() || game.player2_id.is_none() {
            return Err(ApiError::bad_request("Match is still waiting for players"));
        }
        if !game.has_player(request.winner_id) {
            return Err(ApiError::bad_request("Winner must be one of the match players"));
        }

        let completed = sqlx::query_as::<_, TournamentMatch>(
            r#"
            UPDATE tournament_matches SET
                player1_score = $2, player2_score = $3, winner_id = $4,
                status = $5, completed_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(match_id)
        .bind(request.player1_score)
        .bind(request.player2_score)
        .bind(request.winner_id)
        .bind(MatchStatus::Completed)
        .fetch_one(&mut *tx)
        .await?;

        let progress = match tournament.format {
            TournamentFormat::SingleElimination => {
                advance_single_elimination(&mut tx, tournament_id, &completed, request.winner_id).await?
            }
            TournamentFormat::RoundRobin => settle_round_robin(&mut tx, tournament_id).await?,
            // The winners-bracket champion still has a grand final; the organizer finalizes.
            TournamentFormat::DoubleElimination => {
                match advance_single_elimination(&mut tx, tournament_id, &completed, request.winner_id).await? {
                    Progress::Champion(finalist) => {
                        info!(tournament_id = %tournament_id, finalist = %finalist, "Winners bracket decided");
                        Progress::None
                    }
                    progress => progress,
                }
            }
        };

        if let Progress::Champion(winner_id) = progress {
            sqlx::query(
                r#"
                UPDATE tournaments SET status = $2, winner_id = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(tournament_id)
            .bind(TournamentStatus::Completed)
            .bind(winner_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            tournament_id = %tournament_id,
            match_id = %match_id,
            winner_id = %request.winner_id,
            reported_by = %user_id,
            "Match result recorded"
        );

        self.live.publish(
            tournament_topic(tournament_id),
            json!({ "type": "match_completed", "match": &completed }),
        );

        match progress {
            Progress::Champion(winner_id) => {
                info!(tournament_id = %tournament_id, winner_id = %winner_id, "Tournament completed");
                self.live.publish(
                    tournament_topic(tournament_id),
                    json!({ "type": "tournament_completed", "winner_id": winner_id }),
                );
            }
            Progress::NextMatchReady(next) => {
                let players: Vec<Uuid> = [next.player1_id, next.player2_id].into_iter().flatten().collect();
                self.notifier.notify(
                    players,
                    NotificationType::MatchReady,
                    format!(
                        "Your round {} match in {} is ready.",
                        next.round_number, tournament.name
                    ),
                );
            }
            Progress::None => {}
        }

        Ok(completed)
    }

    /// Declare the champion of a tournament whose format is not settled by match results.
    pub async fn finalize_tournament(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        request: FinalizeTournamentRequest,
    ) -> Result<Tournament, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let tournament = lock_tournament(&mut tx, tournament_id).await?;
        Self::require_organizer(&tournament, user_id)?;

        if let Some(reason) = tournament.finalize_blocker() {
            return Err(ApiError::conflict(reason));
        }

        let registered: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tournament_participants WHERE tournament_id = $1 AND user_id = $2)",
        )
        .bind(tournament_id)
        .bind(request.winner_id)
        .fetch_one(&mut *tx)
        .await?;
        if !registered {
            return Err(ApiError::bad_request("Winner must be a participant"));
        }

        let finalized = sqlx::query_as::<_, Tournament>(
            r#"
            UPDATE tournaments SET status = $2, winner_id = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tournament_id)
        .bind(TournamentStatus::Completed)
        .bind(request.winner_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(tournament_id = %tournament_id, winner_id = %request.winner_id, "Tournament finalized by organizer");

        self.live.publish(
            tournament_topic(tournament_id),
            json!({ "type": "tournament_completed", "winner_id": request.winner_id }),
        );

        Ok(finalized)
    }
}

enum Progress {
    None,
    NextMatchReady(TournamentMatch),
    Champion(Uuid),
}

async fn lock_tournament(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: Uuid,
) -> Result<Tournament, ApiError> {
    sqlx::query_as::<_, Tournament>("SELECT * FROM tournaments WHERE id = $1 FOR UPDATE")
        .bind(tournament_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Tournament not found"))
}

async fn advance_single_elimination(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: Uuid,
    completed: &TournamentMatch,
    winner_id: Uuid,
) -> Result<Progress, ApiError> {
    let final_round: Option<i32> = sqlx::query_scalar(
        "SELECT MAX(round_number) FROM tournament_matches WHERE tournament_id = $1",
    )
    .bind(tournament_id)
    .fetch_one(&mut **tx)
    .await?;

    if Some(completed.round_number) >= final_round {
        return Ok(Progress::Champion(winner_id));
    }

    let (round, number, slot) = bracket::next_slot(completed.round_number, completed.match_number);
    let sql = match slot {
        Slot::Player1 => {
            "UPDATE tournament_matches SET player1_id = $4 WHERE tournament_id = $1 AND round_number = $2 AND match_number = $3 RETURNING *"
        }
        Slot::Player2 => {
            "UPDATE tournament_matches SET player2_id = $4 WHERE tournament_id = $1 AND round_number = $2 AND match_number = $3 RETURNING *"
        }
    };

    let next = sqlx::query_as::<_, TournamentMatch>(sql)
        .bind(tournament_id)
        .bind(round)
        .bind(number)
        .bind(winner_id)
        .fetch_optional(&mut **tx)
        .await?;

    match next {
        Some(next) if next.player1_id.is_some() && next.player2_id.is_some() => {
            Ok(Progress::NextMatchReady(next))
        }
        Some(_) => Ok(Progress::None),
        None => {
            warn!(tournament_id = %tournament_id, round = round, match_number = number, "Next match missing from bracket");
            Ok(Progress::None)
        }
    }
}

async fn settle_round_robin(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: Uuid,
) -> Result<Progress, ApiError> {
    let matches = sqlx::query_as::<_, TournamentMatch>(
        "SELECT * FROM tournament_matches WHERE tournament_id = $1",
    )
    .bind(tournament_id)
    .fetch_all(&mut **tx)
    .await?;

    if matches.iter().any(|m| m.status != MatchStatus::Completed) {
        return Ok(Progress::None);
    }

    let seeds: HashMap<Uuid, i32> = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT user_id, seed FROM tournament_participants WHERE tournament_id = $1",
    )
    .bind(tournament_id)
    .fetch_all(&mut **tx)
    .await?
    .into_iter()
    .collect();

    let outcomes: Vec<MatchOutcome> = matches
        .iter()
        .filter_map(|m| {
            Some(MatchOutcome {
                player1: m.player1_id?,
                player2: m.player2_id?,
                player1_score: m.player1_score.unwrap_or(0),
                player2_score: m.player2_score.unwrap_or(0),
                winner: m.winner_id?,
            })
        })
        .collect();

    Ok(bracket::round_robin_winner(&outcomes, &seeds)
        .map(Progress::Champion)
        .unwrap_or(Progress::None))
}
