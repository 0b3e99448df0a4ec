//! API request/response models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generate::Vibe;

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub remaining_today: u32,
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpiConfirmRequest {
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct UpiIntentResponse {
    pub reference: String,
    pub link: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub repo_url: String,
    pub vibe: Vibe,
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub readme: String,
    pub vibe: Vibe,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub readme: String,
    pub remaining: u32,
    pub device_id: String,
}
