use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

const USERNAME_SYMBOLS: &[char] = &['@', '.', '+', '-', '_'];
pub const FIELD_CLASS: &str = "form-field";
pub const ERROR_CLASS: &str = "error";

/// Appends `required` to a whitespace separated class list unless present.
pub fn css_classes(existing: &str, required: &str) -> String {
    let mut classes: Vec<&str> = existing.split_whitespace().collect();
    let required = required.trim();
    if !required.is_empty() && !classes.contains(&required) {
        classes.push(required);
    }
    classes.join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub messages: Vec<String>,
    pub class: String,
}

/// Field name to error messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Per-field payload for responses, tagging each field with the error class.
    pub fn render(&self) -> BTreeMap<String, FieldError> {
        self.0
            .iter()
            .map(|(field, messages)| {
                (
                    field.clone(),
                    FieldError {
                        messages: messages.clone(),
                        class: css_classes(FIELD_CLASS, ERROR_CLASS),
                    },
                )
            })
            .collect()
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::default();
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegistrationForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 150, message = "Enter a username of at most 150 characters."))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must contain at least 8 characters."))]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

impl RegistrationForm {
    /// Trims identity fields and lowercases the email.
    pub fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }

    pub fn check(&self) -> Result<(), FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::default(),
            Err(e) => e.into(),
        };

        if !self
            .username
            .chars()
            .all(|c| c.is_alphanumeric() || USERNAME_SYMBOLS.contains(&c))
        {
            errors.add(
                "username",
                "Username may contain only letters, digits and @/./+/-/_ characters.",
            );
        }
        if self.password != self.password2 {
            errors.add("password2", "Passwords don't match.");
        }

        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    pub code: String,
}

impl VerifyForm {
    pub fn check(&self) -> Result<String, FieldErrors> {
        let code = self.code.trim();
        if code.len() == crate::crypto::OTP_DIGITS && code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(code.to_string());
        }
        let mut errors = FieldErrors::default();
        errors.add("code", "Enter the 6-digit code from your email.");
        Err(errors)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
