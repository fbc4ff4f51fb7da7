use anyhow::Result;
use furnish_types::models::Category;
use rusqlite::Row;
use uuid::Uuid;

use crate::{Database, OptionalExt, optional_uuid_column, uuid_column};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, parent_id, is_active, sort_order, created_at, updated_at";

impl Database {
    /// Active categories directly under `parent`, or the top level when
    /// `parent` is `None`, in display order.
    pub fn list_categories(&self, parent: Option<Uuid>) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let rows = match parent {
                Some(parent_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CATEGORY_COLUMNS} FROM categories
                         WHERE is_active = 1 AND parent_id = ?1
                         ORDER BY sort_order, name"
                    ))?;
                    stmt.query_map([parent_id.to_string()], category_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CATEGORY_COLUMNS} FROM categories
                         WHERE is_active = 1 AND parent_id IS NULL
                         ORDER BY sort_order, name"
                    ))?;
                    stmt.query_map([], category_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
            };
            Ok(rows)
        })
    }

    pub fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = ?1"))?;
            stmt.query_row([slug], category_from_row).optional()
        })
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        parent_id: optional_uuid_column(row, 4)?,
        is_active: row.get(5)?,
        sort_order: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
