use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;

mod key_dispenser;
mod key_generator;
mod key_inventory;

pub use key_dispenser::{KeyDispenserService, KeyDispenserTrait, RefillPolicy};
pub use key_generator::{KeyGeneratorService, KeyGeneratorTrait};
pub use key_inventory::KeyInventoryService;

use crate::{
    config::Config,
    db::Database,
    errors::KeyServiceError,
    queue_store::QueueStore,
    repositories::{KeyQueue, KeyRecordRepository},
    utils::KeyEncoder,
};

pub type KeyGeneratorServiceType = KeyGeneratorService<KeyRecordRepository, KeyQueue>;
pub type KeyDispenserServiceType =
    KeyDispenserService<KeyRecordRepository, KeyQueue, KeyGeneratorServiceType>;
pub type KeyInventoryServiceType = KeyInventoryService<KeyRecordRepository, KeyQueue>;

/// Bounds a store call by `limit`; running out of time is that call's failure.
pub(crate) async fn bounded<T, E, F>(limit: Duration, operation: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<KeyServiceError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(KeyServiceError::Timeout(format!(
            "{} exceeded {}ms",
            operation,
            limit.as_millis()
        ))
        .into()),
    }
}

/// The allocator wired to Postgres and Redis
#[derive(Clone)]
pub struct KeyServices {
    pub generator: Arc<KeyGeneratorServiceType>,
    pub dispenser: Arc<KeyDispenserServiceType>,
    pub inventory: Arc<KeyInventoryServiceType>,
}

impl KeyServices {
    pub fn build(db: &Database, queue_store: &QueueStore, config: &Config) -> Self {
        let timeout = config.kgs.operation_timeout();

        let repository = Arc::new(KeyRecordRepository::new(db.clone()));
        let queue = Arc::new(KeyQueue::new(queue_store, config.redis.queue_name.clone()));

        let encoder = KeyEncoder::new(config.kgs.strategy, config.kgs.key_length);
        let generator = Arc::new(KeyGeneratorService::new(
            repository.clone(),
            queue.clone(),
            encoder,
            timeout,
        ));

        let dispenser = Arc::new(KeyDispenserService::new(
            repository.clone(),
            queue.clone(),
            generator.clone(),
            RefillPolicy {
                low_water_mark: config.kgs.low_water_mark,
                batch_size: config.kgs.refill_batch_size,
            },
            timeout,
        ));

        let inventory = Arc::new(KeyInventoryService::new(repository, queue, timeout));

        Self {
            generator,
            dispenser,
            inventory,
        }
    }
}

/// Service Register
pub fn register(services: &KeyServices, cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::Data::from(services.generator.clone()));
    cfg.app_data(web::Data::from(services.dispenser.clone()));
    cfg.app_data(web::Data::from(services.inventory.clone()));
}
