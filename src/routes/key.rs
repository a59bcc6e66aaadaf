use actix_web::web;

use crate::handlers::{dispense_handler, generate_handler, get_by_key_handler, stats_handler};

// Configure key routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/keys")
            .route("", web::post().to(dispense_handler))
            .route("/stats", web::get().to(stats_handler))
            .route("/{key}", web::get().to(get_by_key_handler)),
    );
    cfg.service(
        web::scope("/api/admin/keys").route("/generate", web::post().to(generate_handler)),
    );
}
