use std::time::Instant;

use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{debug, info, warn};

use crate::{
    config::{Config, Environment},
    db::Database,
    errors::AppError,
    middleware::RequestId,
    queue_store::QueueStore,
    routes,
    services::{self, KeyServices},
    types::AppState,
};

pub type AppResult<T> = Result<T, AppError>;

// Setup logging with custom format and configuration
fn setup_logging(config: &Config) -> AppResult<()> {
    let log_level = match config.app.environment {
        Environment::Development => config.app.log_level.clone(),
        Environment::Testing => "debug,actix_web=info,sqlx=warn".to_string(),
        Environment::Production => "info,actix_web=warn,sqlx=warn".to_string(),
    };

    let env = Env::default()
        .filter_or("RUST_LOG", log_level)
        .write_style_or("RUST_LOG_STYLE", "always");

    env_logger::try_init_from_env(env)
        .map_err(|e| AppError::Logger(format!("Failed to initialize logger: {}", e)))
}

/// Brings the queue up to the configured startup depth
async fn seed_queue(services: &KeyServices, target: u64) {
    if target == 0 {
        return;
    }

    match services
        .inventory
        .top_up(services.generator.as_ref(), target)
        .await
    {
        Ok(0) => debug!("Queue already holds at least {} keys", target),
        Ok(generated) => info!("Seeded queue with {} keys", generated),
        Err(e) => warn!("Startup seeding failed, dispensing will refill on demand: {}", e),
    }
}

pub async fn server() -> AppResult<()> {
    let config = Config::load()?;
    setup_logging(&config)?;

    let start_time = Instant::now();

    info!("Starting {} v{}", config.app.name, config.app.version);
    info!("Environment: {:?}", config.app.environment);
    info!(
        "Key strategy: {} (length {}, low water mark {}, refill batch {})",
        config.kgs.strategy,
        config.kgs.key_length,
        config.kgs.low_water_mark,
        config.kgs.refill_batch_size
    );
    info!(
        "Binding to {}:{} with {} workers",
        config.server.host, config.server.port, config.server.workers
    );

    if config.app.environment == Environment::Development {
        debug!("Full configuration: {:?}", config);
    }

    let db = Database::connect(&config.db).await?;
    let queue_store = QueueStore::connect(&config.redis).await?;

    let key_services = KeyServices::build(&db, &queue_store, &config);
    seed_queue(&key_services, config.kgs.seed_on_startup).await;

    let log_format = if config.app.environment == Environment::Production {
        "%a \"%r\" %s %b %T"
    } else {
        "%a \"%r\" %s %b %T \"%{User-Agent}i\" %{X-Request-ID}o"
    };

    let state = web::Data::new(AppState {
        start_time,
        db: db.clone(),
        queue_store: queue_store.clone(),
        probe_timeout: config.kgs.operation_timeout(),
        version: config.app.version.clone(),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(RequestId)
            .wrap(Logger::new(log_format))
            .configure(|cfg| services::register(&key_services, cfg))
            .configure(routes::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.to_string(), config.server.port))?
    .run()
    .await?;

    db.shutdown().await;
    Ok(())
}
