//! Payload validation for plans and items.

use thiserror::Error;

use crate::types::{ItemChanges, NewItem, NewPlan, PageRequest, PlanChanges};

pub const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("end date cannot be before start date")]
    EndBeforeStart,

    #[error("departure cannot be before arrival")]
    DepartureBeforeArrival,

    #[error("{field} must be between 1 and {max} characters", max = MAX_NAME_LEN)]
    Length { field: &'static str },

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),

    #[error("currency must be a 3-letter code, got {0:?}")]
    Currency(String),

    #[error("position must be at least 1")]
    Position,

    #[error("page limit must be between 1 and {max}, got {limit}")]
    PageLimit { limit: usize, max: usize },

    #[error("page window offset {offset} + limit {limit} overflows")]
    PageOverflow { offset: usize, limit: usize },
}

pub type ValidationResult = Result<(), ValidationError>;

fn check_name(field: &'static str, value: &str) -> ValidationResult {
    let len = value.trim().chars().count();
    if len == 0 || value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::Length { field });
    }
    Ok(())
}

fn check_budget(budget: Option<f64>) -> ValidationResult {
    match budget {
        Some(b) if b.is_nan() || b < 0.0 => Err(ValidationError::Negative { field: "budget" }),
        _ => Ok(()),
    }
}

fn check_currency(currency: Option<&str>) -> ValidationResult {
    match currency {
        Some(c) if c.len() != 3 || !c.chars().all(|ch| ch.is_ascii_alphabetic()) => {
            Err(ValidationError::Currency(c.to_string()))
        }
        _ => Ok(()),
    }
}

fn check_dates<T: PartialOrd>(
    start: Option<&T>,
    end: Option<&T>,
    err: ValidationError,
) -> ValidationResult {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(err),
        _ => Ok(()),
    }
}

fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> ValidationResult {
    match latitude {
        Some(lat) if !(-90.0..=90.0).contains(&lat) => return Err(ValidationError::Latitude(lat)),
        _ => {}
    }
    match longitude {
        Some(lon) if !(-180.0..=180.0).contains(&lon) => Err(ValidationError::Longitude(lon)),
        _ => Ok(()),
    }
}

pub fn new_plan(plan: &NewPlan) -> ValidationResult {
    check_name("title", &plan.title)?;
    check_dates(
        plan.start_date.as_ref(),
        plan.end_date.as_ref(),
        ValidationError::EndBeforeStart,
    )?;
    check_budget(plan.budget)?;
    check_currency(plan.currency.as_deref())
}

pub fn plan_changes(changes: &PlanChanges) -> ValidationResult {
    check_name("title", &changes.title)?;
    check_dates(
        changes.start_date.as_ref(),
        changes.end_date.as_ref(),
        ValidationError::EndBeforeStart,
    )?;
    check_budget(changes.budget)?;
    check_currency(changes.currency.as_deref())
}

pub fn new_item(item: &NewItem) -> ValidationResult {
    check_name("name", &item.name)?;
    check_dates(
        item.arrival.as_ref(),
        item.departure.as_ref(),
        ValidationError::DepartureBeforeArrival,
    )?;
    check_coordinates(item.latitude, item.longitude)?;
    check_budget(item.budget)
}

pub fn item_changes(changes: &ItemChanges) -> ValidationResult {
    check_name("name", &changes.name)?;
    check_dates(
        changes.arrival.as_ref(),
        changes.departure.as_ref(),
        ValidationError::DepartureBeforeArrival,
    )?;
    check_coordinates(changes.latitude, changes.longitude)?;
    check_budget(changes.budget)?;
    if changes.position == Some(0) {
        return Err(ValidationError::Position);
    }
    Ok(())
}

pub fn page_request(request: &PageRequest, max_limit: usize) -> ValidationResult {
    if request.limit == 0 || request.limit > max_limit {
        return Err(ValidationError::PageLimit {
            limit: request.limit,
            max: max_limit,
        });
    }
    if request.needed().is_none() {
        return Err(ValidationError::PageOverflow {
            offset: request.offset,
            limit: request.limit,
        });
    }
    Ok(())
}
