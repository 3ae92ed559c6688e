// src/common/dates.rs

use chrono::{DateTime, NaiveDate, Utc};

use crate::common::error::AppError;

/// Converte a data enviada pelo cliente em um dia (UTC).
/// Aceita `YYYY-MM-DD` ou um timestamp RFC 3339 completo.
pub fn parse_day(raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .map_err(|_| AppError::InvalidInput(format!("Data inválida: '{}'", raw)))
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
