use axum::{
    extract::{Path, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    db::handlers::{Recipes, Repository},
    errors::{Error, Result},
    short_link,
};

/// Follow a short recipe link to the recipe page
#[utoipa::path(
    get,
    path = "/s/{code}/",
    tag = "short links",
    summary = "Resolve short link",
    params(("code" = String, Path, description = "Short code from get-link")),
    responses(
        (status = 302, description = "Redirect to the recipe page"),
        (status = 404, description = "Unknown code or recipe"),
    )
)]
#[tracing::instrument(skip_all, fields(code = %code))]
pub async fn resolve_short_link(State(state): State<AppState>, Path(code): Path<String>) -> Result<Response> {
    let id = short_link::decode(&code).map_err(|e| {
        tracing::debug!("Rejected short code {}: {}", code, e);
        Error::not_found("Short link", &code)
    })?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Recipes::new(&mut pool_conn).get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Short link", &code));
    }

    Ok((StatusCode::FOUND, [(LOCATION, format!("/recipes/{id}/"))]).into_response())
}
