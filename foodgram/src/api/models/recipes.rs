//! API request/response models for recipes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::{IntoParams, ToSchema};

use super::ingredients::RecipeIngredientResponse;
use super::pagination::Pagination;
use super::tags::TagResponse;
use super::users::{BLANK, REQUIRED, UserResponse, required_text};
use crate::config::Config;
use crate::db::models::recipes::{RecipeDBResponse, RecipeIngredientDBRequest};
use crate::errors::{Error, FieldErrors, Result, add_field_error};
use crate::media::{self, DecodedImage};
use crate::shopping_list::ShoppingListFormat;
use crate::types::{IngredientId, RecipeId, TagId, UserId};

pub const MAX_RECIPE_NAME_LENGTH: usize = 256;
pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 32000;
pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 32000;

/// One ingredient line of a recipe write
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RecipeIngredientWrite {
    /// Ingredient id from the catalog
    pub id: Option<IngredientId>,
    #[schema(minimum = 1, maximum = 32000)]
    pub amount: Option<i64>,
}

/// Body of recipe create and update requests.
///
/// Everything is required on create. On update only `tags` and `ingredients` are, and both sets
/// are replaced wholesale; any other field left out keeps its current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RecipeWrite {
    pub ingredients: Option<Vec<RecipeIngredientWrite>>,
    pub tags: Option<Vec<TagId>>,
    /// Base64 data URI
    #[schema(example = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABAgMAAABieywaAAAACVBMVEUAAAD///9fX1/S0ecCAAAACXBIWXMAAA7EAAAOxAGVKw4bAAAACklEQVQImWNoAAAAggCByxOyYQAAAABJRU5ErkJggg==")]
    pub image: Option<String>,
    #[schema(example = "Нечто съедобное (это не точно)")]
    pub name: Option<String>,
    #[schema(example = "Приготовьте как нибудь эти ингредиеты")]
    pub text: Option<String>,
    #[schema(minimum = 1, maximum = 32000, example = 5)]
    pub cooking_time: Option<i64>,
}

/// Whether a write creates a recipe or updates one in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeWriteMode {
    Create,
    Update,
}

/// A recipe write that passed field validation. Tag and ingredient ids are not yet known to exist.
///
/// The optional fields are always set for [`RecipeWriteMode::Create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecipe {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub tag_ids: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientDBRequest>,
    pub image: Option<DecodedImage>,
}

fn validate_tags(errors: &mut FieldErrors, tags: Option<Vec<TagId>>) -> Option<Vec<TagId>> {
    let Some(tags) = tags else {
        add_field_error(errors, "tags", REQUIRED);
        return None;
    };
    if tags.is_empty() {
        add_field_error(errors, "tags", "A recipe needs at least one tag.");
        return None;
    }
    let unique: HashSet<_> = tags.iter().collect();
    if unique.len() != tags.len() {
        add_field_error(errors, "tags", "Tags must not repeat.");
        return None;
    }
    Some(tags)
}

fn validate_ingredients(errors: &mut FieldErrors, ingredients: Option<Vec<RecipeIngredientWrite>>) -> Option<Vec<RecipeIngredientDBRequest>> {
    let Some(ingredients) = ingredients else {
        add_field_error(errors, "ingredients", REQUIRED);
        return None;
    };
    if ingredients.is_empty() {
        add_field_error(errors, "ingredients", "A recipe needs at least one ingredient.");
        return None;
    }

    let mut problems: Vec<String> = Vec::new();
    let mut note = |message: String| {
        if !problems.contains(&message) {
            problems.push(message);
        }
    };

    let mut lines = Vec::with_capacity(ingredients.len());
    for line in ingredients {
        let amount = match line.amount {
            None => {
                note("Each ingredient needs an amount.".to_string());
                None
            }
            Some(amount) if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&amount) => {
                note(format!("Ensure each amount is between {MIN_AMOUNT} and {MAX_AMOUNT}."));
                None
            }
            Some(amount) => i32::try_from(amount).ok(),
        };
        match (line.id, amount) {
            (None, _) => note("Each ingredient needs an id.".to_string()),
            (Some(ingredient_id), Some(amount)) => lines.push(RecipeIngredientDBRequest { ingredient_id, amount }),
            (Some(_), None) => {}
        }
    }

    let unique: HashSet<_> = lines.iter().map(|line| line.ingredient_id).collect();
    if unique.len() != lines.len() {
        note("Ingredients must not repeat.".to_string());
    }

    if problems.is_empty() {
        Some(lines)
    } else {
        errors.entry("ingredients".to_string()).or_default().extend(problems);
        None
    }
}

fn validate_cooking_time(errors: &mut FieldErrors, cooking_time: Option<i64>, required: bool) -> Option<i32> {
    match cooking_time {
        None => {
            if required {
                add_field_error(errors, "cooking_time", REQUIRED);
            }
            None
        }
        Some(minutes) if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&minutes) => {
            add_field_error(
                errors,
                "cooking_time",
                format!("Ensure this value is between {MIN_COOKING_TIME} and {MAX_COOKING_TIME}."),
            );
            None
        }
        Some(minutes) => i32::try_from(minutes).ok(),
    }
}

fn validate_image(errors: &mut FieldErrors, image: Option<String>, required: bool, max_image_bytes: usize) -> Option<DecodedImage> {
    match image.filter(|value| !value.trim().is_empty()) {
        Some(value) => match media::decode_data_uri(&value, max_image_bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                add_field_error(errors, "image", e.to_string());
                None
            }
        },
        None => {
            if required {
                add_field_error(errors, "image", REQUIRED);
            }
            None
        }
    }
}

fn validate_text(errors: &mut FieldErrors, text: Option<String>, required: bool) -> Option<String> {
    match text {
        None => {
            if required {
                add_field_error(errors, "text", REQUIRED);
            }
            None
        }
        Some(text) if text.trim().is_empty() => {
            add_field_error(errors, "text", BLANK);
            None
        }
        Some(text) => Some(text),
    }
}

impl RecipeWrite {
    /// Check every field, collecting all problems.
    pub fn validate(self, mode: RecipeWriteMode, max_image_bytes: usize) -> Result<ValidatedRecipe> {
        let required = mode == RecipeWriteMode::Create;
        let mut errors = FieldErrors::new();

        let tag_ids = validate_tags(&mut errors, self.tags);
        let ingredients = validate_ingredients(&mut errors, self.ingredients);
        let name = match self.name {
            None if !required => None,
            name => required_text(&mut errors, "name", name, MAX_RECIPE_NAME_LENGTH),
        };
        let text = validate_text(&mut errors, self.text, required);
        let cooking_time = validate_cooking_time(&mut errors, self.cooking_time, required);
        let image = validate_image(&mut errors, self.image, required, max_image_bytes);

        if !errors.is_empty() {
            return Err(Error::Validation { errors });
        }

        match (tag_ids, ingredients) {
            (Some(tag_ids), Some(ingredients)) => Ok(ValidatedRecipe {
                name,
                text,
                cooking_time,
                tag_ids,
                ingredients,
                image,
            }),
            _ => Err(Error::Validation { errors }),
        }
    }
}

/// Full recipe representation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeResponse {
    pub id: RecipeId,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    /// Absolute image URL
    pub image: String,
    pub text: String,
    /// Minutes
    pub cooking_time: i32,
}

/// Compact recipe representation used by favorites, the shopping cart and subscriptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipeShortResponse {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeShortResponse {
    pub fn new(recipe: &RecipeDBResponse, config: &Config) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: media::media_url(config, &recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShortLinkResponse {
    #[serde(rename = "short-link")]
    #[schema(example = "https://foodgram.example.org/s/867nv/")]
    pub short_link: String,
}

/// Recipe list filters, as documented. Parsed by hand by [`RecipeListQuery::parse`] because
/// `tags` repeats.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipeListParams {
    /// Page number, starting at 1
    pub page: Option<i64>,
    /// Recipes per page
    pub limit: Option<i64>,
    /// Only recipes by this author
    pub author: Option<UserId>,
    /// Tag slug, repeatable. Recipes with any of the given tags match.
    pub tags: Option<Vec<String>>,
    /// `1` to list only the caller's favorites
    pub is_favorited: Option<u8>,
    /// `1` to list only recipes in the caller's shopping cart
    pub is_in_shopping_cart: Option<u8>,
}

/// Parsed recipe list filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub author: Option<UserId>,
    /// Distinct tag slugs, in request order
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// `true`/`false`/`1`/`0`, case-insensitively
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

impl RecipeListQuery {
    pub fn parse(query: Option<&str>) -> Result<Self> {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect();

        let pagination = Pagination::from_pairs(&pairs);
        let mut parsed = RecipeListQuery {
            page: pagination.page,
            limit: pagination.limit,
            ..Default::default()
        };
        let mut errors = FieldErrors::new();

        for (key, value) in pairs {
            let value = value.trim();
            match key.as_str() {
                "author" if !value.is_empty() => match value.parse::<UserId>() {
                    Ok(author) => parsed.author = Some(author),
                    Err(_) => add_field_error(&mut errors, "author", "Enter a whole number."),
                },
                "tags" if !value.is_empty() => {
                    if !parsed.tags.iter().any(|tag| tag == value) {
                        parsed.tags.push(value.to_string());
                    }
                }
                "is_favorited" | "is_in_shopping_cart" if !value.is_empty() => match parse_bool(value) {
                    Some(flag) if key == "is_favorited" => parsed.is_favorited = flag,
                    Some(flag) => parsed.is_in_shopping_cart = flag,
                    None => add_field_error(&mut errors, &key, "Select a valid choice. Use 1 or 0."),
                },
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(parsed)
        } else {
            Err(Error::Validation { errors })
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page.clone(),
            limit: self.limit.clone(),
        }
    }
}

/// Query parameters for the shopping list download
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// `txt` (default) or `csv`
    pub format: Option<ShoppingListFormat>,
}
