use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::http::cache::cached_json;
use crate::models::common::PageQuery;
use crate::models::tournament::{
    CreateTournamentRequest, FinalizeTournamentRequest, ReportMatchResultRequest, TournamentListQuery,
    UpdateTournamentRequest,
};
use crate::service::tournament_service::TournamentService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;

/// GET /api/tournaments
pub async fn list_tournaments(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    filter: web::Query<TournamentListQuery>,
    page: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let tournaments = tournament_service.list_tournaments(&filter, &page).await?;
    cached_json(&req, &tournaments)
}

/// POST /api/tournaments
pub async fn create_tournament(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    request: web::Json<CreateTournamentRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    info!(user_id = %user_id, name = %request.name, "Create tournament request received");

    let tournament = tournament_service
        .create_tournament(user_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(tournament))
}

/// GET /api/tournaments/{id}
pub async fn get_tournament(
    tournament_service: web::Data<TournamentService>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let tournament = tournament_service.get_tournament(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tournament))
}

/// PATCH /api/tournaments/{id}
pub async fn update_tournament(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<UpdateTournamentRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;

    let tournament = tournament_service
        .update_tournament(path.into_inner(), user_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(tournament))
}

/// DELETE /api/tournaments/{id}
pub async fn delete_tournament(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    tournament_service
        .delete_tournament(path.into_inner(), user_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/tournaments/{id}/register
pub async fn register(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let participant = tournament_service.register(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Created().json(participant))
}

/// DELETE /api/tournaments/{id}/register
pub async fn withdraw(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    tournament_service.withdraw(path.into_inner(), user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/tournaments/{id}/bracket
pub async fn generate_bracket(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let tournament_id = path.into_inner();
    info!(tournament_id = %tournament_id, user_id = %user_id, "Bracket generation requested");

    let matches = tournament_service
        .generate_bracket(tournament_id, user_id)
        .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "matches": matches })))
}

/// POST /api/tournaments/{id}/matches/{match_id}/result
pub async fn report_result(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
    request: web::Json<ReportMatchResultRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let (tournament_id, match_id) = path.into_inner();

    let result = tournament_service
        .report_result(tournament_id, match_id, user_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/tournaments/{id}/finalize
pub async fn finalize_tournament(
    tournament_service: web::Data<TournamentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<FinalizeTournamentRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let tournament_id = path.into_inner();
    info!(tournament_id = %tournament_id, user_id = %user_id, "Tournament finalization requested");

    let tournament = tournament_service
        .finalize_tournament(tournament_id, user_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(tournament))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/tournaments")
            .route("", web::get().to(list_tournaments))
            .route("", web::post().to(create_tournament))
            .route("/{id}", web::get().to(get_tournament))
            .route("/{id}", web::patch().to(update_tournament))
            .route("/{id}", web::delete().to(delete_tournament))
            .route("/{id}/register", web::post().to(register))
            .route("/{id}/register", web::delete().to(withdraw))
            .route("/{id}/bracket", web::post().to(generate_bracket))
            .route("/{id}/matches/{match_id}/result", web::post().to(report_result))
            .route("/{id}/finalize", web::post().to(finalize_tournament)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::discord_service::DiscordNotifier;
    use crate::service::live_hub::LiveHub;
    use actix_web::{http::StatusCode, test, App};
    use sqlx::postgres::PgPoolOptions;

    // The pool never connects: these paths return before touching the database.
    fn tournaments() -> TournamentService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let notifier = DiscordNotifier::new(pool.clone()).unwrap();
        TournamentService::new(pool, LiveHub::new(), notifier)
    }

    #[actix_web::test]
    async fn test_finalize_requires_user_and_winner() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(tournaments()))
                .configure(configure_routes),
        )
        .await;
        let uri = format!("/api/tournaments/{}/finalize", Uuid::new_v4());

        let req = test::TestRequest::post()
            .uri(&uri)
            .set_json(serde_json::json!({ "winner_id": Uuid::new_v4() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri(&uri)
            .set_json(serde_json::json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
