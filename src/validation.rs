use rocket::FromForm;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::models::NewPreference;

pub const MISSING_FIELDS_MESSAGE: &str = "Please fill in all fields";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Turns validator output into one flash line. Blank fields are reported
/// before anything else, then fields in `order`.
pub fn flash_message(errors: &ValidationErrors, order: &[&str]) -> String {
    let field_errors = errors.field_errors();

    let has_blank = field_errors
        .values()
        .flat_map(|errs| errs.iter())
        .any(|err| err.code == "blank");
    if has_blank {
        return MISSING_FIELDS_MESSAGE.to_string();
    }

    order
        .iter()
        .filter_map(|field| field_errors.get(*field))
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid form submission".to_string())
}

#[derive(Debug, FromForm, Validate)]
pub struct RegisterForm {
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    #[field(default = String::new())]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirmation: String,
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub security_question: String,
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub security_answer: String,
}

impl RegisterForm {
    pub const FIELD_ORDER: [&'static str; 5] = [
        "username",
        "password",
        "confirmation",
        "security_question",
        "security_answer",
    ];
}

#[derive(Debug, FromForm, Validate)]
pub struct LoginForm {
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

#[derive(Debug, FromForm, Validate)]
pub struct ForgotForm {
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub security_question: String,
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub security_answer: String,
}

#[derive(Debug, FromForm, Validate)]
pub struct ResetForm {
    #[field(default = String::new())]
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    #[field(default = String::new())]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirmation: String,
}

impl ResetForm {
    pub const FIELD_ORDER: [&'static str; 2] = ["password", "confirmation"];
}

/// Raw preference submission. Every field is optional at the form level so a
/// missing one can be reported instead of rejected by the form guard.
#[derive(Debug, Default, FromForm)]
pub struct PreferenceForm {
    pub region: Option<String>,
    pub budget: Option<String>,
    pub occasion: Option<String>,
    pub cuisine: Vec<String>,
    pub diet: Vec<String>,
    pub vibe: Vec<String>,
}

fn required_choice(field: &str, value: Option<&str>) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::Validation(format!("{} is required", field))),
    }
}

fn required_list(field: &str, values: &[String]) -> Result<Vec<String>, AppError> {
    let cleaned: Vec<String> = values
        .iter()
        .map(|v| v.trim().replace(crate::models::LIST_SEPARATOR, " "))
        .filter(|v| !v.is_empty())
        .collect();

    if cleaned.is_empty() {
        return Err(AppError::Validation(format!(
            "At least one {} is required",
            field
        )));
    }
    Ok(cleaned)
}

impl PreferenceForm {
    /// All six fields are required; the submission is accepted whole or not at
    /// all.
    pub fn validate_submission(&self) -> Result<NewPreference, AppError> {
        Ok(NewPreference {
            region: required_choice("region", self.region.as_deref())?,
            budget: required_choice("budget", self.budget.as_deref())?,
            occasion: required_choice("occasion", self.occasion.as_deref())?,
            cuisine: required_list("cuisine", &self.cuisine)?,
            diet: required_list("diet", &self.diet)?,
            vibe: required_list("vibe", &self.vibe)?,
        })
    }
}
