//! API request/response models for users and subscriptions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::{NoneAsEmptyString, serde_as};
use std::sync::LazyLock;
use utoipa::{IntoParams, ToSchema};

use super::recipes::RecipeShortResponse;
use crate::auth::password::validate_password;
use crate::config::{Config, PasswordConfig};
use crate::db::models::users::UserDBResponse;
use crate::errors::{Error, FieldErrors, Result, add_field_error};
use crate::media;
use crate::types::UserId;

pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_NAME_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const BLANK: &str = "This field may not be blank.";

/// The authenticated caller, resolved from the request's token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Media path of the avatar, relative to the media root
    pub avatar: Option<String>,
    pub is_admin: bool,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            username: db.username,
            first_name: db.first_name,
            last_name: db.last_name,
            avatar: db.avatar,
            is_admin: db.is_admin,
        }
    }
}

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern compiles"));

// One `@`, a non-empty local part and a dotted domain, no whitespace
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s.][^@\s]*\.[^@\s.]+$").expect("email pattern compiles"));

/// Letters, digits and `@/./+/-/_`, Unicode-aware.
pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Check a required text field, recording problems under `field`. Returns the trimmed value.
pub(crate) fn required_text(errors: &mut FieldErrors, field: &str, value: Option<String>, max_length: usize) -> Option<String> {
    let Some(value) = value else {
        add_field_error(errors, field, REQUIRED);
        return None;
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        add_field_error(errors, field, BLANK);
        return None;
    }
    if value.chars().count() > max_length {
        add_field_error(errors, field, format!("Ensure this field has no more than {max_length} characters."));
        return None;
    }
    Some(value)
}

/// Registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    #[schema(example = "vivanov@yandex.ru")]
    pub email: Option<String>,
    #[schema(example = "vasya.ivanov")]
    pub username: Option<String>,
    #[schema(example = "Вася")]
    pub first_name: Option<String>,
    #[schema(example = "Иванов")]
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// A registration request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserCreate {
    pub fn validate(self, policy: &PasswordConfig) -> Result<NewUser> {
        let mut errors = FieldErrors::new();

        let email = required_text(&mut errors, "email", self.email, MAX_EMAIL_LENGTH);
        if let Some(email) = &email
            && !is_valid_email(email)
        {
            add_field_error(&mut errors, "email", "Enter a valid email address.");
        }

        let username = required_text(&mut errors, "username", self.username, MAX_USERNAME_LENGTH);
        if let Some(username) = &username
            && !is_valid_username(username)
        {
            add_field_error(
                &mut errors,
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        let first_name = required_text(&mut errors, "first_name", self.first_name, MAX_NAME_LENGTH);
        let last_name = required_text(&mut errors, "last_name", self.last_name, MAX_NAME_LENGTH);

        let password = match self.password {
            Some(password) if !password.is_empty() => {
                let attributes: Vec<&str> = [&username, &email, &first_name, &last_name]
                    .into_iter()
                    .filter_map(|value| value.as_deref())
                    .collect();
                let problems = validate_password(&password, &attributes, policy);
                if problems.is_empty() {
                    Some(password)
                } else {
                    errors.entry("password".to_string()).or_default().extend(problems);
                    None
                }
            }
            Some(_) => {
                add_field_error(&mut errors, "password", BLANK);
                None
            }
            None => {
                add_field_error(&mut errors, "password", REQUIRED);
                None
            }
        };

        match (email, username, first_name, last_name, password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password)) if errors.is_empty() => Ok(NewUser {
                email,
                username,
                first_name,
                last_name,
                password,
            }),
            _ => Err(Error::Validation { errors }),
        }
    }
}

/// Returned by registration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreatedResponse {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<UserDBResponse> for UserCreatedResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            email: db.email,
            id: db.id,
            username: db.username,
            first_name: db.first_name,
            last_name: db.last_name,
        }
    }
}

/// Public user profile
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the caller follows this user. Always false for anonymous callers.
    pub is_subscribed: bool,
    /// Absolute avatar URL
    pub avatar: Option<String>,
}

impl UserResponse {
    pub fn new(user: UserDBResponse, is_subscribed: bool, config: &Config) -> Self {
        Self {
            avatar: user.avatar.as_deref().map(|path| media::media_url(config, path)),
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }

    /// The caller's own profile. Nobody follows themselves.
    pub fn own_profile(user: &CurrentUser, config: &Config) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed: false,
            avatar: user.avatar.as_deref().map(|path| media::media_url(config, path)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SetPassword {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AvatarUpdate {
    /// Base64 data URI, e.g. `data:image/png;base64,iVBOR...`
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvatarResponse {
    pub avatar: String,
}

/// A followed author with a preview of their recipes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeShortResponse>,
    pub recipes_count: i64,
    pub avatar: Option<String>,
}

impl SubscriptionResponse {
    pub fn new(author: UserDBResponse, recipes: Vec<RecipeShortResponse>, recipes_count: i64, config: &Config) -> Self {
        let user = UserResponse::new(author, true, config);
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed: user.is_subscribed,
            recipes,
            recipes_count,
            avatar: user.avatar,
        }
    }
}

/// How many of each author's recipes to include
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct RecipesLimitQuery {
    /// Maximum number of recipes per author (all when omitted)
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    #[param(value_type = Option<i64>, minimum = 0)]
    pub recipes_limit: Option<i64>,
}

impl RecipesLimitQuery {
    pub fn limit(&self) -> Result<Option<i64>> {
        match self.recipes_limit {
            Some(limit) if limit < 0 => Err(Error::field("recipes_limit", "Ensure this value is greater than or equal to 0.")),
            limit => Ok(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> UserCreate {
        UserCreate {
            email: Some("cook@example.com".to_string()),
            username: Some("head.cook".to_string()),
            first_name: Some("Anna".to_string()),
            last_name: Some("Petrova".to_string()),
            password: Some("Tomato-Basil-91".to_string()),
        }
    }

    fn field_errors(error: Error) -> FieldErrors {
        match error {
            Error::Validation { errors } => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_username_pattern() {
        for name in ["cook", "head.cook", "a+b@c-d_e", "Повар42"] {
            assert!(is_valid_username(name), "{name} should be valid");
        }
        for name in ["", "two words", "semi;colon", "slash/", "emoji🍕"] {
            assert!(!is_valid_username(name), "{name} should be invalid");
        }
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("cook@example.com"));
        assert!(!is_valid_email("cook.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("cook@localhost"));
        assert!(!is_valid_email("cook@@example.com"));
        assert!(!is_valid_email("co ok@example.com"));
        assert!(!is_valid_email("cook@example."));
        assert!(!is_valid_email("cook@.example.com"));
        assert!(is_valid_email("head.cook+tag@mail.example.org"));
    }

    #[test]
    fn test_valid_registration() {
        let user = valid_request().validate(&PasswordConfig::default()).unwrap();
        assert_eq!(user.username, "head.cook");
        assert_eq!(user.email, "cook@example.com");
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let errors = field_errors(UserCreate::default().validate(&PasswordConfig::default()).unwrap_err());
        for field in ["email", "username", "first_name", "last_name", "password"] {
            assert_eq!(errors[field], vec![REQUIRED.to_string()], "{field}");
        }
    }

    #[test]
    fn test_field_rules() {
        let request = UserCreate {
            email: Some("not-an-email".to_string()),
            username: Some("bad name".to_string()),
            first_name: Some("x".repeat(MAX_NAME_LENGTH + 1)),
            last_name: Some("   ".to_string()),
            password: Some("12345678".to_string()),
        };
        let errors = field_errors(request.validate(&PasswordConfig::default()).unwrap_err());

        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("username"));
        assert!(errors["first_name"][0].contains("150"));
        assert_eq!(errors["last_name"], vec![BLANK.to_string()]);
        assert!(errors["password"].iter().any(|m| m.contains("numeric")));
    }

    #[test]
    fn test_password_similar_to_username_rejected() {
        let mut request = valid_request();
        request.password = Some("head.cook".to_string());
        let errors = field_errors(request.validate(&PasswordConfig::default()).unwrap_err());
        assert!(errors["password"].iter().any(|m| m.contains("similar")));
    }

    #[test]
    fn test_recipes_limit() {
        assert_eq!(RecipesLimitQuery { recipes_limit: Some(2) }.limit().unwrap(), Some(2));
        assert_eq!(RecipesLimitQuery::default().limit().unwrap(), None);
        assert!(RecipesLimitQuery { recipes_limit: Some(-1) }.limit().is_err());
    }

    #[test]
    fn test_empty_recipes_limit_deserializes_to_none() {
        let query: RecipesLimitQuery = serde_json::from_str(r#"{"recipes_limit": ""}"#).unwrap();
        assert_eq!(query.recipes_limit, None);
        let query: RecipesLimitQuery = serde_json::from_str(r#"{"recipes_limit": "3"}"#).unwrap();
        assert_eq!(query.recipes_limit, Some(3));
    }
}
