use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (accounts and catalog)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash   TEXT NOT NULL,
                first_name      TEXT NOT NULL,
                last_name       TEXT NOT NULL,
                phone           TEXT,
                role            TEXT NOT NULL DEFAULT 'USER',
                status          TEXT NOT NULL DEFAULT 'ACTIVE',
                is_verified     INTEGER NOT NULL DEFAULT 0,
                email_verified  INTEGER NOT NULL DEFAULT 0,
                phone_verified  INTEGER NOT NULL DEFAULT 0,
                last_login      TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE TABLE categories (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                slug        TEXT NOT NULL UNIQUE,
                description TEXT,
                parent_id   TEXT,
                is_active   INTEGER NOT NULL DEFAULT 1,
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_categories_parent ON categories(parent_id, sort_order);

            -- Prices are stored in hundredths so range filters compare integers.
            -- name_search holds the Unicode-lowercased name; SQLite's LOWER only folds ASCII.
            CREATE TABLE products (
                id                   TEXT PRIMARY KEY,
                name                 TEXT NOT NULL,
                name_search          TEXT NOT NULL,
                slug                 TEXT NOT NULL UNIQUE,
                description          TEXT,
                short_description    TEXT,
                category_id          TEXT,
                sku                  TEXT UNIQUE,
                price_cents          INTEGER NOT NULL CHECK (price_cents >= 0),
                sale_price_cents     INTEGER CHECK (sale_price_cents >= 0),
                cost_price_cents     INTEGER CHECK (cost_price_cents >= 0),
                stock_quantity       INTEGER NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
                low_stock_threshold  INTEGER NOT NULL DEFAULT 5,
                material             TEXT,
                color                TEXT,
                brand                TEXT,
                warranty_period      TEXT,
                care_instructions    TEXT,
                has_360_view         INTEGER NOT NULL DEFAULT 0,
                model_3d_url         TEXT,
                is_featured          INTEGER NOT NULL DEFAULT 0,
                is_active            INTEGER NOT NULL DEFAULT 1,
                is_customizable      INTEGER NOT NULL DEFAULT 0,
                assembly_required    INTEGER NOT NULL DEFAULT 0,
                average_rating_x100  INTEGER NOT NULL DEFAULT 0,
                total_reviews        INTEGER NOT NULL DEFAULT 0,
                total_sales          INTEGER NOT NULL DEFAULT 0,
                views                INTEGER NOT NULL DEFAULT 0,
                seo_title            TEXT,
                seo_description      TEXT,
                created_at           TEXT NOT NULL,
                updated_at           TEXT NOT NULL
            );

            CREATE INDEX idx_products_active_created ON products(is_active, created_at);
            CREATE INDEX idx_products_category ON products(category_id, is_active);
            CREATE INDEX idx_products_price ON products(is_active, price_cents);

            -- Seed the top-level departments
            INSERT INTO categories (id, name, slug, description, sort_order) VALUES
                ('00000000-0000-0000-0000-000000000101', 'Living Room', 'living-room', 'Sofas, armchairs and coffee tables', 1),
                ('00000000-0000-0000-0000-000000000102', 'Bedroom', 'bedroom', 'Beds, wardrobes and nightstands', 2),
                ('00000000-0000-0000-0000-000000000103', 'Dining', 'dining', 'Dining tables, chairs and sideboards', 3),
                ('00000000-0000-0000-0000-000000000104', 'Office', 'office', 'Desks, office chairs and storage', 4),
                ('00000000-0000-0000-0000-000000000105', 'Outdoor', 'outdoor', 'Garden and patio furniture', 5);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
