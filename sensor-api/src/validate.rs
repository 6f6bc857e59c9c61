use crate::errors::{Error, Result};
use crate::model::{CreateReadingRequest, LoginRequest};

const VALUE_MIN: f64 = 0.0;
const VALUE_MAX: f64 = 1000.0;
const SENSOR_ID_MAX_LEN: usize = 50;
pub const MAX_SAMPLE_COUNT: u32 = 10_000;

/// Validates a create-reading request body
pub fn validate_reading(req: &CreateReadingRequest) -> Result<()> {
    // Validate sensor id
    if req.sensor_id.trim().is_empty() {
        return Err(Error::Validation("Sensor ID is required".to_string()));
    }
    if req.sensor_id.chars().count() > SENSOR_ID_MAX_LEN {
        return Err(Error::Validation(format!(
            "Sensor ID must be at most {} characters",
            SENSOR_ID_MAX_LEN
        )));
    }

    // Validate value (NaN fails both comparisons, so check it explicitly)
    if !req.value.is_finite() || req.value < VALUE_MIN || req.value > VALUE_MAX {
        return Err(Error::Validation(format!(
            "Value {} out of range [{}, {}]",
            req.value, VALUE_MIN, VALUE_MAX
        )));
    }

    Ok(())
}

/// Validates a login request. Any password is accepted as long as one is given.
pub fn validate_login(req: &LoginRequest) -> Result<()> {
    let email = req.email.trim();
    if email.is_empty() {
        return Err(Error::Validation("Email is required".to_string()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => {
            return Err(Error::Validation(format!(
                "'{}' is not a valid email address",
                email
            )))
        }
    }

    if req.password.trim().is_empty() {
        return Err(Error::Validation("Password is required".to_string()));
    }

    Ok(())
}

pub fn validate_sample_count(count: u32) -> Result<()> {
    if count > MAX_SAMPLE_COUNT {
        return Err(Error::Validation(format!(
            "Sample count {} exceeds the maximum of {}",
            count, MAX_SAMPLE_COUNT
        )));
    }
    Ok(())
}
