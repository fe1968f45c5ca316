//! Catalog loading from CSV files: `foodgram import-tags` and `foodgram import-ingredients`.
//!
//! Both files are headerless two-column CSV (`name,slug` for tags, `name,measurement_unit`
//! for ingredients). A header row with exactly those column names is tolerated. Fields are
//! trimmed, blank rows skipped, and every row is upserted so re-running an import is safe.

use anyhow::Context;
use sqlx::PgPool;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::db::{
    handlers::{Ingredients, Tags},
    models::{ingredients::IngredientCreateDBRequest, tags::TagCreateDBRequest},
};

/// A data row with its 1-based line number, for error messages
#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    line: u64,
    first: String,
    second: String,
}

fn parse_rows(data: &[u8], header: [&str; 2]) -> anyhow::Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("read CSV record {}", index + 1))?;
        let line = record.position().map(|p| p.line()).unwrap_or(index as u64 + 1);

        if record.iter().all(str::is_empty) {
            continue;
        }
        if index == 0 && record.len() == 2 && record.iter().zip(header).all(|(field, name)| field.eq_ignore_ascii_case(name)) {
            continue;
        }

        match (record.get(0), record.get(1)) {
            (Some(first), Some(second)) if !first.is_empty() && !second.is_empty() => rows.push(Row {
                line,
                first: first.to_string(),
                second: second.to_string(),
            }),
            _ => warn!("Skipping line {}: expected two non-empty fields", line),
        }
    }

    Ok(rows)
}

async fn read_rows(path: &Path, header: [&str; 2]) -> anyhow::Result<Vec<Row>> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    parse_rows(&data, header)
}

/// Upsert tags from a `name,slug` CSV file. Returns the number of rows processed.
#[instrument(skip(pool), err)]
pub async fn import_tags(pool: &PgPool, path: &Path) -> anyhow::Result<usize> {
    let rows = read_rows(path, ["name", "slug"]).await?;

    let mut tx = pool.begin().await?;
    for row in &rows {
        Tags::new(&mut tx)
            .upsert(&TagCreateDBRequest {
                name: row.first.clone(),
                slug: row.second.clone(),
            })
            .await
            .with_context(|| format!("import tag on line {} ({})", row.line, row.second))?;
    }
    tx.commit().await?;

    info!("Imported {} tags from {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Upsert ingredients from a `name,measurement_unit` CSV file. Returns the number of rows processed.
#[instrument(skip(pool), err)]
pub async fn import_ingredients(pool: &PgPool, path: &Path) -> anyhow::Result<usize> {
    let rows = read_rows(path, ["name", "measurement_unit"]).await?;

    let mut tx = pool.begin().await?;
    for row in &rows {
        Ingredients::new(&mut tx)
            .upsert(&IngredientCreateDBRequest {
                name: row.first.clone(),
                measurement_unit: row.second.clone(),
            })
            .await
            .with_context(|| format!("import ingredient on line {} ({})", row.line, row.first))?;
    }
    tx.commit().await?;

    info!("Imported {} ingredients from {}", rows.len(), path.display());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::ingredients::IngredientFilter;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_rows_trims_and_skips() {
        let data = "name, slug\n Breakfast , breakfast\n\nLunch,lunch\nbroken\n, empty\n";
        let rows = parse_rows(data.as_bytes(), ["name", "slug"]).unwrap();

        let pairs: Vec<_> = rows.iter().map(|r| (r.first.as_str(), r.second.as_str())).collect();
        assert_eq!(pairs, vec![("Breakfast", "breakfast"), ("Lunch", "lunch")]);
        assert_eq!(rows[0].line, 2);
    }

    #[test]
    fn test_parse_rows_quoted_fields() {
        let data = "\"cheese, hard\",g\n";
        let rows = parse_rows(data.as_bytes(), ["name", "measurement_unit"]).unwrap();
        assert_eq!(rows[0].first, "cheese, hard");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_import_tags_is_idempotent(pool: PgPool) {
        let file = write_csv("Breakfast,breakfast\nLunch,lunch\nDinner,dinner\n");

        assert_eq!(import_tags(&pool, file.path()).await.unwrap(), 3);
        assert_eq!(import_tags(&pool, file.path()).await.unwrap(), 3);

        let mut conn = pool.acquire().await.unwrap();
        let tags = Tags::new(&mut conn).list().await.unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].slug, "breakfast");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_import_tags_rolls_back_on_bad_slug(pool: PgPool) {
        let file = write_csv("Good,good\nBad,not a slug\n");

        let error = import_tags(&pool, file.path()).await.unwrap_err();
        assert!(format!("{error:#}").contains("line 2"));

        let mut conn = pool.acquire().await.unwrap();
        assert!(Tags::new(&mut conn).list().await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_import_ingredients(pool: PgPool) {
        let file = write_csv("абрикосовое варенье,г\nflour,g\nflour,cup\nflour,g\n");

        assert_eq!(import_ingredients(&pool, file.path()).await.unwrap(), 4);

        let mut conn = pool.acquire().await.unwrap();
        let all = Ingredients::new(&mut conn).list(&IngredientFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_file_is_an_error(pool: PgPool) {
        assert!(import_tags(&pool, Path::new("/nonexistent/tags.csv")).await.is_err());
    }
}
