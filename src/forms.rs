use std::collections::BTreeMap;

use axum::extract::Multipart;
use serde::Deserialize;

use crate::db::models::Group;
use crate::error::AppResult;
use crate::uploads::Upload;

pub const REQUIRED: &str = "This field is required.";

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Usernames that would shadow a top-level route.
pub const RESERVED_USERNAMES: &[&str] = &["new", "follow", "group", "auth", "media", "assets"];

/// Per-field validation messages, rendered next to the inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Trims the text and enforces the minimum length in characters.
pub fn validate_post_text(text: &str, min_len: usize) -> Result<String, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(REQUIRED.to_string());
    }
    if text.chars().count() < min_len {
        return Err(format!(
            "Text is too short: write at least {} characters.",
            min_len
        ));
    }
    Ok(text.to_string())
}

// --- Posts ---

/// Raw post form values as the browser sent them.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
}

impl PostInput {
    pub fn validate(&self, min_text_len: usize, groups: &[Group]) -> Result<ValidPost, FieldErrors> {
        let mut errors = FieldErrors::default();

        let text = validate_post_text(&self.text, min_text_len)
            .map_err(|msg| errors.add("text", msg))
            .unwrap_or_default();

        let group = self.group.trim();
        let group_id = if group.is_empty() {
            None
        } else {
            match group.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.add("group", "Select a valid choice.");
                    None
                }
            }
        };

        errors.into_result(ValidPost { text, group_id })
    }

    /// True when `group` is the option the form should show as selected.
    pub fn group_selected(&self, group: &Group) -> bool {
        self.group.trim() == group.id.to_string()
    }
}

/// A multipart post submission.
#[derive(Debug, Default)]
pub struct PostSubmission {
    pub input: PostInput,
    pub image: Option<Upload>,
    pub clear_image: bool,
}

impl PostSubmission {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut submission = PostSubmission::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => submission.input.text = field.text().await?,
                "group" => submission.input.group = field.text().await?,
                "image-clear" => {
                    let value = field.text().await?;
                    submission.clear_image = !value.is_empty() && value != "off";
                }
                "image" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        submission.image = Some(Upload {
                            filename,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(submission)
    }
}

// --- Comments ---

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub text: String,
}

impl CommentInput {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::default();
        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.into_result(text.to_string())
    }
}

// --- Accounts ---

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SignupInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

pub const MIN_PASSWORD_LEN: usize = 8;

impl SignupInput {
    /// Checks every field; `username_taken` comes from the store.
    pub fn validate(&self, username_taken: bool) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if username.chars().count() > 150
            || !username
                .chars()
                .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            errors.add(
                "username",
                "Enter a valid username: letters, digits and @/./+/-/_ only.",
            );
        } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) || username_taken
        {
            errors.add("username", USERNAME_TAKEN);
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.add("email", REQUIRED);
        } else if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {} characters.",
                    MIN_PASSWORD_LEN
                ),
            );
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors.into_result(())
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Only local absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => "/",
    }
}
