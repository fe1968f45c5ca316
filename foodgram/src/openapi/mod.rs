//! OpenAPI documentation for the Foodgram API.
//!
//! [`ApiDoc`] collects every handler annotated with `#[utoipa::path]`. The router serves the
//! JSON document at `/api/openapi.json` and an interactive Scalar UI at `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Security scheme for `Authorization: Token <key>`.
struct TokenSecurityAddon;

impl Modify for TokenSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "TokenAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Token authentication. Obtain a key from `/api/auth/token/login/` and send it on every request:\n\n\
                    ```\nAuthorization: Token YOUR_KEY\n```",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Foodgram API",
        description = "Publish recipes, follow authors, keep favorites and build a shopping list."
    ),
    modifiers(&TokenSecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::get_me,
        api::handlers::users::set_password,
        api::handlers::users::update_avatar,
        api::handlers::users::delete_avatar,
        api::handlers::users::list_subscriptions,
        api::handlers::users::subscribe,
        api::handlers::users::unsubscribe,
        api::handlers::tags::list_tags,
        api::handlers::tags::get_tag,
        api::handlers::ingredients::list_ingredients,
        api::handlers::ingredients::get_ingredient,
        api::handlers::recipes::list_recipes,
        api::handlers::recipes::get_recipe,
        api::handlers::recipes::create_recipe,
        api::handlers::recipes::update_recipe,
        api::handlers::recipes::delete_recipe,
        api::handlers::recipes::get_short_link,
        api::handlers::recipes::add_favorite,
        api::handlers::recipes::remove_favorite,
        api::handlers::recipes::add_to_shopping_cart,
        api::handlers::recipes::remove_from_shopping_cart,
        api::handlers::recipes::download_shopping_cart,
        api::handlers::short_links::resolve_short_link,
    ),
    components(
        schemas(
            api::models::auth::TokenLoginRequest,
            api::models::auth::TokenResponse,
            api::models::users::UserCreate,
            api::models::users::UserCreatedResponse,
            api::models::users::UserResponse,
            api::models::users::SetPassword,
            api::models::users::AvatarUpdate,
            api::models::users::AvatarResponse,
            api::models::users::SubscriptionResponse,
            api::models::tags::TagResponse,
            api::models::ingredients::IngredientResponse,
            api::models::ingredients::RecipeIngredientResponse,
            api::models::recipes::RecipeIngredientWrite,
            api::models::recipes::RecipeWrite,
            api::models::recipes::RecipeResponse,
            api::models::recipes::RecipeShortResponse,
            api::models::recipes::ShortLinkResponse,
            crate::shopping_list::ShoppingListFormat,
        )
    ),
    tags(
        (name = "auth", description = "Token login and logout."),
        (name = "users", description = "Accounts, profiles, avatars and subscriptions to other authors."),
        (name = "tags", description = "Recipe tags. Managed by administrators, read-only here."),
        (name = "ingredients", description = "The ingredient catalog with its measurement units. Read-only."),
        (name = "recipes", description = "Recipes, favorites, the shopping cart and the shopping list download.

List responses are paginated with `page` and `limit`. Filters:
- `author`: recipes by one user
- `tags`: tag slugs, repeatable, any may match
- `is_favorited`, `is_in_shopping_cart`: `1` to restrict to the caller's lists"),
        (name = "short links", description = "Redirects for shareable recipe links."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/token/login/",
            "/api/users/",
            "/api/users/{id}/subscribe/",
            "/api/recipes/{id}/",
            "/api/recipes/download_shopping_cart/",
            "/s/{code}/",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing from OpenAPI document");
        }
        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("TokenAuth"));
    }
}
