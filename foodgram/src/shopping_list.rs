//! Shopping list assembly: sums ingredient amounts across the recipes in a cart and renders
//! the result as a downloadable file.

use crate::db::handlers::recipe_lists::ListIngredientRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// One line of the shopping list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Download format for the shopping list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShoppingListFormat {
    #[default]
    Txt,
    Csv,
}

impl ShoppingListFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ShoppingListFormat::Txt => "text/plain; charset=utf-8",
            ShoppingListFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            ShoppingListFormat::Txt => "shopping_cart.txt",
            ShoppingListFormat::Csv => "shopping_cart.csv",
        }
    }
}

/// Sum amounts per (name, measurement unit).
///
/// The same ingredient in different units stays on separate lines. Output is ordered by name,
/// then unit.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingListItem>
where
    I: IntoIterator<Item = ListIngredientRow>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals.entry((line.name, line.measurement_unit)).or_default() += i64::from(line.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListItem {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

pub fn render_text(items: &[ShoppingListItem]) -> String {
    let mut content = String::from("Shopping list:\n");
    for item in items {
        content.push_str(&format!("{} — {} {}\n", item.name, item.amount, item.measurement_unit));
    }
    content
}

pub fn render_csv(items: &[ShoppingListItem]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if items.is_empty() {
        writer.write_record(["name", "measurement_unit", "amount"])?;
    }
    for item in items {
        writer.serialize(item)?;
    }

    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("flush csv writer: {e}"))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn render(items: &[ShoppingListItem], format: ShoppingListFormat) -> anyhow::Result<String> {
    match format {
        ShoppingListFormat::Txt => Ok(render_text(items)),
        ShoppingListFormat::Csv => render_csv(items),
    }
}
