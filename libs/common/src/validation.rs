//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::{
    error::ValidationErrors,
    models::{ActivityInput, RegisterRequest},
};

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() > 32 {
        return Err("Username must be at most 32 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
///
/// At least 4 characters with an uppercase letter, a lowercase letter and at
/// least one character that is not a letter.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_non_letter = password.chars().any(|c| !c.is_ascii_alphabetic());

    if password.chars().count() < 4 || !has_upper || !has_lower || !has_non_letter {
        return Err("Password must be at least 4 characters long and contain at least one number, one uppercase letter and one lowercase letter".to_string());
    }

    Ok(())
}

fn required(value: &str, message: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(message.to_string())
    } else {
        Ok(())
    }
}

/// Validate a registration payload field by field
pub fn validate_registration(request: &RegisterRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check(
        "displayName",
        required(&request.display_name, "Display name is required"),
    );
    errors.check("email", validate_email(&request.email));
    errors.check("password", validate_password(&request.password));
    errors.check("username", validate_username(&request.username));
    errors.into_result()
}

/// Validate an activity create/edit payload
pub fn validate_activity(input: &ActivityInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check("title", required(&input.title, "Title is required"));
    errors.check(
        "description",
        required(&input.description, "Description is required"),
    );
    errors.check("category", required(&input.category, "Category is required"));
    if input.date.is_none() {
        errors.add("date", "Date is required");
    }
    errors.check("city", required(&input.city, "City is required"));
    errors.check("venue", required(&input.venue, "Venue is required"));
    errors.into_result()
}
