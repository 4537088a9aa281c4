use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};

use crate::auto_mode::AutoModeController;
use crate::config::{SafetyFlags, SettingsStore};
use crate::dedupe_store::DedupeStore;
use crate::mode_manager::{self, RequestedMode};
use crate::plan_log::{ExecutionPlan, PlanLog};
use crate::position_store::PositionStore;
use crate::signal::SignalFeed;

pub struct AppState {
    pub controller: Arc<AutoModeController>,
    pub settings: Arc<SettingsStore>,
    pub positions: Arc<PositionStore>,
    pub dedupe: Arc<DedupeStore>,
    pub feed: Arc<dyn SignalFeed>,
    pub plan_log: Arc<PlanLog>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_status(data: web::Data<AppState>) -> impl Responder {
    let flags = SafetyFlags::snapshot();
    let settings = data.settings.current();
    let mode = mode_manager::effective_mode(settings.requested_mode, &flags, false);
    let auto = data.controller.status().await;

    HttpResponse::Ok().json(serde_json::json!({
        "auto": auto,
        "mode": mode,
        "flags": flags,
        "executed_today": data
            .dedupe
            .executed_count_for_day(chrono::Utc::now().date_naive()),
    }))
}

async fn enable_auto(data: web::Data<AppState>) -> impl Responder {
    data.controller.enable();
    HttpResponse::Ok().json(data.controller.status().await)
}

async fn disable_auto(data: web::Data<AppState>) -> impl Responder {
    data.controller.disable().await;
    HttpResponse::Ok().json(data.controller.status().await)
}

async fn get_mode(data: web::Data<AppState>) -> impl Responder {
    let flags = SafetyFlags::snapshot();
    let settings = data.settings.current();
    HttpResponse::Ok().json(mode_manager::effective_mode(
        settings.requested_mode,
        &flags,
        false,
    ))
}

#[derive(Deserialize)]
struct ModeRequest {
    mode: RequestedMode,
}

async fn set_mode(data: web::Data<AppState>, body: web::Json<ModeRequest>) -> impl Responder {
    let updated = data.settings.update(|s| s.requested_mode = body.mode);
    match updated {
        Ok(settings) => {
            let flags = SafetyFlags::snapshot();
            HttpResponse::Ok().json(mode_manager::effective_mode(
                settings.requested_mode,
                &flags,
                false,
            ))
        }
        Err(e) => HttpResponse::InternalServerError()
            .json(serde_json::json!({ "error": e.to_string() })),
    }
}

#[derive(Deserialize)]
struct ApproveRequest {
    mode: RequestedMode,
}

/// Manually approve one signal for execution. Runs the same
/// build -> preflight -> execute -> dedupe pipeline as the automatic loop,
/// without touching the auto counters.
async fn approve_signal(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ApproveRequest>,
) -> impl Responder {
    let signal_id = path.into_inner();

    let record = match data.feed.find(&signal_id) {
        Ok(Some(record)) => record,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(serde_json::json!({ "error": "signal not found" }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": e.to_string() }));
        }
    };

    if data.dedupe.is_executed(&signal_id) {
        return HttpResponse::Conflict()
            .json(serde_json::json!({ "error": "signal already executed" }));
    }

    let flags = SafetyFlags::snapshot();
    let decision = mode_manager::effective_mode(body.mode, &flags, false);
    let report = data
        .controller
        .execute_signal(&record, &decision, &flags, false)
        .await;

    HttpResponse::Ok().json(serde_json::json!({
        "report": report,
        "mode": decision,
    }))
}

#[derive(Deserialize)]
struct RejectRequest {
    #[serde(default)]
    reason: Option<String>,
}

/// Decline a signal. Recorded in the audit ledger; the signal stays
/// unexecuted and undeduped, so it can still be approved later.
async fn reject_signal(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RejectRequest>,
) -> impl Responder {
    let signal_id = path.into_inner();
    let reason = body
        .reason
        .clone()
        .unwrap_or_else(|| "rejected by reviewer".to_string());

    let entry = ExecutionPlan::skipped(&signal_id, "skip", reason.clone());
    if let Err(e) = data.plan_log.append(&entry) {
        return HttpResponse::InternalServerError()
            .json(serde_json::json!({ "error": e.to_string() }));
    }

    HttpResponse::Ok().json(serde_json::json!({
        "signal_id": signal_id,
        "action": "rejected",
        "reason": reason,
    }))
}

async fn get_positions(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "open": data.positions.open_positions(),
        "total": data.positions.all().len(),
    }))
}

async fn get_metrics() -> impl Responder {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/status").route(web::get().to(get_status)))
        .service(web::resource("/auto/enable").route(web::post().to(enable_auto)))
        .service(web::resource("/auto/disable").route(web::post().to(disable_auto)))
        .service(
            web::resource("/mode")
                .route(web::get().to(get_mode))
                .route(web::post().to(set_mode)),
        )
        .service(web::resource("/signals/{id}/approve").route(web::post().to(approve_signal)))
        .service(web::resource("/signals/{id}/reject").route(web::post().to(reject_signal)))
        .service(web::resource("/positions").route(web::get().to(get_positions)))
        .service(web::resource("/metrics").route(web::get().to(get_metrics)));
}
