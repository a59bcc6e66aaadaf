use actix_web::{web, HttpResponse, Responder};
use log::{debug, info};
use serde_json::json;
use validator::Validate;

use crate::{
    models::{DispensedKeyDto, GenerateKeysDto},
    services::{
        KeyDispenserServiceType, KeyDispenserTrait, KeyGeneratorServiceType, KeyGeneratorTrait,
        KeyInventoryServiceType,
    },
    types::Result,
    validations::validate_key,
};

/// Dispense one unused key
pub async fn dispense_handler(service: web::Data<KeyDispenserServiceType>) -> Result<impl Responder> {
    let key = service.dispense().await?;
    debug!("Dispensed key '{}'", key);
    Ok(HttpResponse::Ok().json(json!({
        "data": DispensedKeyDto { key },
        "message": "Successfully dispensed key",
    })))
}

/// Queue depth and record counts
pub async fn stats_handler(service: web::Data<KeyInventoryServiceType>) -> Result<impl Responder> {
    let stats = service.stats().await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": stats,
        "message": "Successfully retrieved key statistics",
    })))
}

/// Get key record route handler
pub async fn get_by_key_handler(
    path: web::Path<String>,
    service: web::Data<KeyInventoryServiceType>,
) -> Result<impl Responder> {
    let key = path.into_inner();
    validate_key(&key)?;

    let record = service.get_by_key(&key).await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": record,
        "message": "Successfully retrieved key",
    })))
}

/// Generate a batch of keys ahead of demand
pub async fn generate_handler(
    dto: web::Json<GenerateKeysDto>,
    service: web::Data<KeyGeneratorServiceType>,
) -> Result<impl Responder> {
    let dto = dto.into_inner();
    dto.validate()?;

    service.generate(dto.count as usize).await?;
    info!("Generated {} keys on request", dto.count);

    Ok(HttpResponse::Created().json(json!({
        "data": { "generated": dto.count },
        "message": format!("Successfully generated {} keys", dto.count),
    })))
}
