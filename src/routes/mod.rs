use actix_web::{web, HttpResponse, Responder};

use crate::db::HealthState;
use crate::types::{AppState, HealthStatus, ResponsePayload};

mod key;

// Handler function for the root route "/"
async fn index() -> impl Responder {
    let welcome_message = ResponsePayload {
        status: 200,
        message: String::from("Key generation service is running"),
    };

    HttpResponse::Ok().json(welcome_message)
}

// Handler function for the health check endpoint
async fn health_check(data: web::Data<AppState>) -> impl Responder {
    let uptime = data.start_time.elapsed().as_secs();

    let (db_health, redis_health) = futures::join!(
        data.db.health_check(data.probe_timeout),
        data.queue_store.health_check(data.probe_timeout)
    );

    let healthy =
        db_health.status == HealthState::Healthy && redis_health.status == HealthState::Healthy;

    let status = HealthStatus {
        status: String::from(if healthy { "OK" } else { "DEGRADED" }),
        version: data.version.clone(),
        db_health: Some(db_health),
        redis_health: Some(redis_health),
        uptime_seconds: uptime,
    };

    if healthy {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::ServiceUnavailable().json(status)
    }
}

// Configure all routes function
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index));
    cfg.route("/health", web::get().to(health_check));
    key::configure_routes(cfg);
}
