use actix_web::{delete, get, post, web, HttpResponse, Result as WebResult};
use std::sync::Arc;
use uuid::Uuid;

use crate::agent::{TurnError, TurnOrchestrator, TurnRequest};
use crate::api::models::{CreateSessionRequest, PaginationQuery};
use crate::db::{service::DbService, DbPool};

// --- Chat ---

#[post("/chat")]
pub async fn chat_turn(
    orchestrator: web::Data<Arc<TurnOrchestrator>>,
    req: web::Json<TurnRequest>,
) -> WebResult<HttpResponse> {
    match orchestrator.process_turn(req.into_inner()).await {
        Ok(view) => Ok(HttpResponse::Ok().json(view)),
        Err(e @ TurnError::Validation(_)) => Ok(HttpResponse::BadRequest().body(e.to_string())),
        Err(TurnError::ContentUnavailable) => Ok(HttpResponse::BadRequest()
            .body("No usable content was produced, please try again with a clearer prompt")),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

// --- Sessions ---

#[post("")]
pub async fn create_session(
    pool: web::Data<DbPool>,
    req: web::Json<CreateSessionRequest>,
) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap();
    let req = req.into_inner();
    let id = req.id.unwrap_or_else(Uuid::new_v4);

    match DbService::insert_session(&conn, id, &req.name, req.user_id) {
        Ok(session) => Ok(HttpResponse::Created().json(session)),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

#[get("")]
pub async fn list_sessions(
    pool: web::Data<DbPool>,
    query: web::Query<PaginationQuery>,
) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap();

    match DbService::list_sessions(&conn, query.limit, query.offset) {
        Ok(sessions) => Ok(HttpResponse::Ok().json(sessions)),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

#[get("/{id}")]
pub async fn get_session(
    pool: web::Data<DbPool>,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap();

    match DbService::get_session(&conn, id.into_inner()) {
        Ok(Some(session)) => Ok(HttpResponse::Ok().json(session)),
        Ok(None) => Ok(HttpResponse::NotFound().finish()),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

#[delete("/{id}")]
pub async fn delete_session(
    pool: web::Data<DbPool>,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap();
    let id = id.into_inner();

    // Check if exists first for better 404 handling
    if DbService::get_session(&conn, id).unwrap_or(None).is_none() {
        return Ok(HttpResponse::NotFound().finish());
    }

    match DbService::delete_session(&conn, id) {
        Ok(_) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

#[get("/{id}/messages")]
pub async fn get_messages(
    pool: web::Data<DbPool>,
    id: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap();

    match DbService::get_messages(&conn, id.into_inner(), query.limit, query.offset) {
        Ok(messages) => Ok(HttpResponse::Ok().json(messages)),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

#[get("/{id}/export")]
pub async fn export_session(
    pool: web::Data<DbPool>,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap();
    let id = id.into_inner();

    let session = match DbService::get_session(&conn, id) {
        Ok(Some(s)) => s,
        Ok(None) => return Ok(HttpResponse::NotFound().finish()),
        Err(e) => return Ok(HttpResponse::InternalServerError().body(e.to_string())),
    };

    let messages = DbService::get_messages(&conn, id, 1000, 0).unwrap_or_default();

    let mut export = String::new();
    export.push_str(&format!("Session: {}\n", session.name));
    export.push_str(&format!("ID: {}\n", session.id));
    export.push_str(&format!("Created At: {}\n", session.created_at));
    export.push_str("---\n");

    for m in messages {
        export.push_str(&format!("[{}] ({}): {}\n", m.role.as_str().to_uppercase(), m.kind, m.content));
        export.push_str("---\n");
    }

    Ok(HttpResponse::Ok()
        .content_type("text/plain")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"session_{}.txt\"", id),
        ))
        .body(export))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat_turn).service(
        web::scope("/sessions")
            .service(create_session)
            .service(list_sessions)
            .service(get_session)
            .service(delete_session)
            .service(get_messages)
            .service(export_session),
    );
}
