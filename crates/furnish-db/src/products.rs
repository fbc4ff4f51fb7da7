use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use furnish_types::api::ProductPatch;
use furnish_types::catalog::{PageRequest, ProductFilter, Sort, SortDirection, SortField};
use furnish_types::models::Product;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::{Database, OptionalExt, optional_uuid_column, uuid_column};

const PRODUCT_COLUMNS: &str = "id, name, slug, description, short_description, category_id, sku, \
     price_cents, sale_price_cents, cost_price_cents, stock_quantity, low_stock_threshold, \
     material, color, brand, warranty_period, care_instructions, has_360_view, model_3d_url, \
     is_featured, is_active, is_customizable, assembly_required, average_rating_x100, \
     total_reviews, total_sales, views, seo_title, seo_description, created_at, updated_at";

/// Amount in hundredths, rounding half away from zero.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| anyhow!("Amount out of range: {}", amount))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn optional_cents(amount: Option<Decimal>) -> Result<Option<i64>> {
    amount.map(to_cents).transpose()
}

impl Database {
    // -- Writes --

    pub fn insert_product(&self, product: &Product) -> Result<()> {
        let price = to_cents(product.price)?;
        let sale_price = optional_cents(product.sale_price)?;
        let cost_price = optional_cents(product.cost_price)?;
        let rating = to_cents(product.average_rating)?;

        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO products ({PRODUCT_COLUMNS}, name_search) VALUES (
                        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                        ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31,
                        ?32)"
                ),
                params![
                    product.id.to_string(),
                    product.name,
                    product.slug,
                    product.description,
                    product.short_description,
                    product.category_id.map(|id| id.to_string()),
                    product.sku,
                    price,
                    sale_price,
                    cost_price,
                    product.stock_quantity,
                    product.low_stock_threshold,
                    product.material,
                    product.color,
                    product.brand,
                    product.warranty_period,
                    product.care_instructions,
                    product.has_360_view,
                    product.model_3d_url,
                    product.is_featured,
                    product.is_active,
                    product.is_customizable,
                    product.assembly_required,
                    rating,
                    product.total_reviews,
                    product.total_sales,
                    product.views,
                    product.seo_title,
                    product.seo_description,
                    product.created_at,
                    product.updated_at,
                    product.name.to_lowercase(),
                ],
            )?;
            Ok(())
        })
    }

    /// Overwrites the patchable columns and returns the stored product, or
    /// `None` when no product has this id.
    pub fn apply_product_patch(
        &self,
        id: Uuid,
        patch: &ProductPatch,
        at: DateTime<Utc>,
    ) -> Result<Option<Product>> {
        let price = to_cents(patch.price)?;
        let sale_price = optional_cents(patch.sale_price)?;

        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE products
                 SET name = ?2, description = ?3, price_cents = ?4, sale_price_cents = ?5,
                     stock_quantity = ?6, updated_at = ?7, name_search = ?8
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    patch.name,
                    patch.description,
                    price,
                    sale_price,
                    patch.stock_quantity,
                    at,
                    patch.name.to_lowercase(),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_product_by(conn, "id", &id.to_string())
        })
    }

    /// Soft delete. Returns false when no product has this id.
    pub fn deactivate_product(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
                params![id.to_string(), at],
            )?;
            Ok(changed == 1)
        })
    }

    /// Looks a product up by slug and bumps its view counter in the same
    /// transaction. The returned product already carries the new count.
    pub fn record_product_view(&self, slug: &str) -> Result<Option<Product>> {
        self.with_conn_mut(|conn| {
            let changed =
                conn.execute("UPDATE products SET views = views + 1 WHERE slug = ?1", [slug])?;
            if changed == 0 {
                return Ok(None);
            }
            query_product_by(conn, "slug", slug)
        })
    }

    // -- Reads --

    pub fn get_product_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        self.with_conn(|conn| query_product_by(conn, "id", &id.to_string()))
    }

    pub fn product_slug_exists(&self, slug: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM products WHERE slug = ?1)",
                [slug],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn featured_products(&self) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products
                 WHERE is_featured = 1 AND is_active = 1
                 ORDER BY created_at DESC, id ASC"
            ))?;
            let rows = stmt
                .query_map([], product_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One page of active products matching `filter`, plus the total number
    /// of matches across all pages.
    pub fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
        sort: Sort,
    ) -> Result<(Vec<Product>, u64)> {
        let mut clauses = vec!["is_active = 1".to_string()];
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        match filter {
            ProductFilter::All => {}
            ProductFilter::Search(term) => {
                args.push(Box::new(like_pattern(term)));
                clauses.push(format!("name_search LIKE ?{} ESCAPE '\\'", args.len()));
            }
            ProductFilter::Category(category_id) => {
                args.push(Box::new(category_id.to_string()));
                clauses.push(format!("category_id = ?{}", args.len()));
            }
            ProductFilter::PriceRange { min, max } => {
                if let Some(min) = min {
                    args.push(Box::new(to_cents(*min)?));
                    clauses.push(format!("price_cents >= ?{}", args.len()));
                }
                if let Some(max) = max {
                    args.push(Box::new(to_cents(*max)?));
                    clauses.push(format!("price_cents <= ?{}", args.len()));
                }
            }
        }

        let where_sql = clauses.join(" AND ");
        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let limit = i64::from(page.size());
        let offset = i64::try_from(page.offset())?;

        self.with_conn(|conn| {
            let params: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM products WHERE {where_sql}"),
                params.as_slice(),
                |row| row.get(0),
            )?;

            let mut page_params = params.clone();
            page_params.push(&limit);
            page_params.push(&offset);

            let mut stmt = conn.prepare(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE {where_sql}
                 ORDER BY {} {direction}, id ASC
                 LIMIT ?{} OFFSET ?{}",
                sort_column(sort.field),
                params.len() + 1,
                params.len() + 2,
            ))?;
            let rows = stmt
                .query_map(page_params.as_slice(), product_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, u64::try_from(total)?))
        })
    }
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
        SortField::Name => "name COLLATE NOCASE",
        SortField::Price => "price_cents",
        SortField::Views => "views",
        SortField::TotalSales => "total_sales",
        SortField::AverageRating => "average_rating_x100",
        SortField::StockQuantity => "stock_quantity",
    }
}

/// Substring LIKE pattern with the LIKE metacharacters in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn query_product_by(conn: &Connection, column: &str, value: &str) -> Result<Option<Product>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE {column} = ?1"))?;
    stmt.query_row([value], product_from_row).optional()
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        short_description: row.get(4)?,
        category_id: optional_uuid_column(row, 5)?,
        sku: row.get(6)?,
        price: from_cents(row.get(7)?),
        sale_price: row.get::<_, Option<i64>>(8)?.map(from_cents),
        cost_price: row.get::<_, Option<i64>>(9)?.map(from_cents),
        stock_quantity: row.get(10)?,
        low_stock_threshold: row.get(11)?,
        material: row.get(12)?,
        color: row.get(13)?,
        brand: row.get(14)?,
        warranty_period: row.get(15)?,
        care_instructions: row.get(16)?,
        has_360_view: row.get(17)?,
        model_3d_url: row.get(18)?,
        is_featured: row.get(19)?,
        is_active: row.get(20)?,
        is_customizable: row.get(21)?,
        assembly_required: row.get(22)?,
        average_rating: from_cents(row.get(23)?),
        total_reviews: row.get(24)?,
        total_sales: row.get(25)?,
        views: row.get(26)?,
        seo_title: row.get(27)?,
        seo_description: row.get(28)?,
        created_at: row.get(29)?,
        updated_at: row.get(30)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;
    use chrono::Duration;

    fn product(name: &str, price_cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            description: None,
            short_description: None,
            category_id: None,
            sku: None,
            price: from_cents(price_cents),
            sale_price: None,
            cost_price: None,
            stock_quantity: 0,
            low_stock_threshold: 5,
            material: None,
            color: None,
            brand: None,
            warranty_period: None,
            care_instructions: None,
            has_360_view: false,
            model_3d_url: None,
            is_featured: false,
            is_active: true,
            is_customizable: false,
            assembly_required: false,
            average_rating: Decimal::ZERO,
            total_reviews: 0,
            total_sales: 0,
            views: 0,
            seo_title: None,
            seo_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn first_page() -> PageRequest {
        PageRequest::new(0, 50).unwrap()
    }

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn cents_conversion_rounds_half_away_from_zero() {
        assert_eq!(to_cents(Decimal::new(19999, 2)).unwrap(), 19999);
        assert_eq!(to_cents(Decimal::new(10005, 3)).unwrap(), 1001);
        assert_eq!(to_cents(Decimal::from(150)).unwrap(), 15000);
        assert!(to_cents(Decimal::from(10u64.pow(19))).is_err());
        assert!(to_cents(Decimal::MAX).is_err());
        assert_eq!(from_cents(15000), Decimal::from(150));
    }

    #[test]
    fn insert_and_read_back() {
        let db = Database::open_in_memory().unwrap();
        let mut p = product("Oak Table", 45000);
        p.category_id = Some(Uuid::new_v4());
        p.sku = Some("OAK-1".to_string());
        p.sale_price = Some(from_cents(39999));
        p.brand = Some("Nordwood".to_string());
        db.insert_product(&p).unwrap();

        let stored = db.get_product_by_id(p.id).unwrap().unwrap();
        assert_eq!(stored.name, "Oak Table");
        assert_eq!(stored.category_id, p.category_id);
        assert_eq!(stored.price, Decimal::new(45000, 2));
        assert_eq!(stored.sale_price, Some(Decimal::new(39999, 2)));
        assert_eq!(stored.brand.as_deref(), Some("Nordwood"));
        assert!(stored.is_active);
        assert_eq!(stored.low_stock_threshold, 5);
        assert!(db.product_slug_exists("oak-table").unwrap());
    }

    #[test]
    fn duplicate_sku_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mut a = product("Chair A", 1000);
        a.sku = Some("SKU-1".to_string());
        let mut b = product("Chair B", 1000);
        b.sku = Some("SKU-1".to_string());
        db.insert_product(&a).unwrap();
        let err = db.insert_product(&b).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn listing_excludes_inactive_products() {
        let db = Database::open_in_memory().unwrap();
        let visible = product("Sofa", 90000);
        let mut hidden = product("Old Sofa", 20000);
        hidden.is_active = false;
        db.insert_product(&visible).unwrap();
        db.insert_product(&hidden).unwrap();

        let (rows, total) =
            db.list_products(&ProductFilter::All, first_page(), Sort::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(names(&rows), vec!["Sofa"]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&product("Dining Chair", 12000)).unwrap();
        db.insert_product(&product("CHAIRMAN Desk", 30000)).unwrap();
        db.insert_product(&product("Bookshelf", 8000)).unwrap();
        let mut retired = product("Retired Armchair", 5000);
        retired.is_active = false;
        db.insert_product(&retired).unwrap();

        let filter = ProductFilter::Search("chair".to_string());
        let (rows, total) = db.list_products(&filter, first_page(), Sort::default()).unwrap();
        assert_eq!(total, 2);
        let mut found = names(&rows);
        found.sort();
        assert_eq!(found, vec!["CHAIRMAN Desk", "Dining Chair"]);
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&product("ÉCRAN Divider", 1000)).unwrap();
        db.insert_product(&product("Écru Ottoman", 2000)).unwrap();

        for term in ["ÉCRAN", "écran", "Écran div"] {
            let filter = ProductFilter::Search(term.to_string());
            let (rows, total) = db.list_products(&filter, first_page(), Sort::default()).unwrap();
            assert_eq!(total, 1, "{term}");
            assert_eq!(names(&rows), vec!["ÉCRAN Divider"]);
        }
    }

    #[test]
    fn search_follows_patched_name() {
        let db = Database::open_in_memory().unwrap();
        let p = product("Stool", 4000);
        db.insert_product(&p).unwrap();

        let patch = ProductPatch {
            name: "Ölmez Stool".to_string(),
            description: None,
            price: Decimal::from(40),
            sale_price: None,
            stock_quantity: 0,
        };
        db.apply_product_patch(p.id, &patch, Utc::now()).unwrap();

        let filter = ProductFilter::Search("ÖLMEZ".to_string());
        let (_, total) = db.list_products(&filter, first_page(), Sort::default()).unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn search_treats_like_wildcards_literally() {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&product("100% Wool Rug", 15000)).unwrap();
        db.insert_product(&product("1000 Thread Sheets", 9000)).unwrap();

        let filter = ProductFilter::Search("100%".to_string());
        let (rows, _) = db.list_products(&filter, first_page(), Sort::default()).unwrap();
        assert_eq!(names(&rows), vec!["100% Wool Rug"]);
    }

    #[test]
    fn category_filter_matches_exactly() {
        let db = Database::open_in_memory().unwrap();
        let living = Uuid::new_v4();
        let mut sofa = product("Sofa", 90000);
        sofa.category_id = Some(living);
        db.insert_product(&sofa).unwrap();
        db.insert_product(&product("Lamp", 4000)).unwrap();

        let (rows, total) = db
            .list_products(&ProductFilter::Category(living), first_page(), Sort::default())
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, sofa.id);
    }

    #[test]
    fn price_range_bounds_are_inclusive() {
        let db = Database::open_in_memory().unwrap();
        for (name, cents) in [("A", 9999), ("B", 10000), ("C", 15000), ("D", 20000), ("E", 20001)] {
            db.insert_product(&product(name, cents)).unwrap();
        }

        let both = ProductFilter::PriceRange {
            min: Some(Decimal::from(100)),
            max: Some(Decimal::from(200)),
        };
        let sort = Sort { field: SortField::Price, direction: SortDirection::Asc };
        let (rows, _) = db.list_products(&both, first_page(), sort).unwrap();
        assert_eq!(names(&rows), vec!["B", "C", "D"]);

        let min_only = ProductFilter::PriceRange { min: Some(Decimal::from(150)), max: None };
        let (rows, _) = db.list_products(&min_only, first_page(), sort).unwrap();
        assert_eq!(names(&rows), vec!["C", "D", "E"]);

        let max_only = ProductFilter::PriceRange { min: None, max: Some(Decimal::new(9999, 2)) };
        let (rows, _) = db.list_products(&max_only, first_page(), sort).unwrap();
        assert_eq!(names(&rows), vec!["A"]);
    }

    #[test]
    fn default_sort_is_newest_first_and_pages_split() {
        let db = Database::open_in_memory().unwrap();
        let base = Utc::now();
        for i in 0..5 {
            let mut p = product(&format!("Item {i}"), 1000);
            p.created_at = base + Duration::seconds(i);
            db.insert_product(&p).unwrap();
        }

        let page0 = PageRequest::new(0, 2).unwrap();
        let (rows, total) = db.list_products(&ProductFilter::All, page0, Sort::default()).unwrap();
        assert_eq!(total, 5);
        assert_eq!(names(&rows), vec!["Item 4", "Item 3"]);

        let page2 = PageRequest::new(2, 2).unwrap();
        let (rows, _) = db.list_products(&ProductFilter::All, page2, Sort::default()).unwrap();
        assert_eq!(names(&rows), vec!["Item 0"]);

        let page3 = PageRequest::new(3, 2).unwrap();
        let (rows, total) = db.list_products(&ProductFilter::All, page3, Sort::default()).unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 5);
    }

    #[test]
    fn viewing_by_slug_increments_views() {
        let db = Database::open_in_memory().unwrap();
        let p = product("Wing Chair", 30000);
        db.insert_product(&p).unwrap();

        assert_eq!(db.record_product_view("wing-chair").unwrap().unwrap().views, 1);
        assert_eq!(db.record_product_view("wing-chair").unwrap().unwrap().views, 2);
        assert_eq!(db.get_product_by_id(p.id).unwrap().unwrap().views, 2);
        assert!(db.record_product_view("missing").unwrap().is_none());
    }

    #[test]
    fn patch_touches_only_whitelisted_columns() {
        let db = Database::open_in_memory().unwrap();
        let mut p = product("Desk", 20000);
        p.brand = Some("Fjord".to_string());
        p.sku = Some("DESK-1".to_string());
        p.sale_price = Some(from_cents(18000));
        db.insert_product(&p).unwrap();

        let patch = ProductPatch {
            name: "Standing Desk".to_string(),
            description: Some("Height adjustable".to_string()),
            price: Decimal::from(250),
            sale_price: None,
            stock_quantity: 7,
        };
        let updated = db.apply_product_patch(p.id, &patch, Utc::now()).unwrap().unwrap();
        assert_eq!(updated.name, "Standing Desk");
        assert_eq!(updated.price, Decimal::from(250));
        assert_eq!(updated.sale_price, None);
        assert_eq!(updated.stock_quantity, 7);
        assert_eq!(updated.slug, "desk");
        assert_eq!(updated.brand.as_deref(), Some("Fjord"));
        assert_eq!(updated.sku.as_deref(), Some("DESK-1"));

        assert!(db.apply_product_patch(Uuid::new_v4(), &patch, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn deactivate_keeps_row() {
        let db = Database::open_in_memory().unwrap();
        let p = product("Stool", 3000);
        db.insert_product(&p).unwrap();

        assert!(db.deactivate_product(p.id, Utc::now()).unwrap());
        assert!(!db.deactivate_product(Uuid::new_v4(), Utc::now()).unwrap());

        let stored = db.get_product_by_id(p.id).unwrap().unwrap();
        assert!(!stored.is_active);
        let (rows, _) =
            db.list_products(&ProductFilter::All, first_page(), Sort::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn featured_requires_active() {
        let db = Database::open_in_memory().unwrap();
        let mut shown = product("Showpiece", 50000);
        shown.is_featured = true;
        let mut retired = product("Retired Showpiece", 50000);
        retired.is_featured = true;
        retired.is_active = false;
        db.insert_product(&shown).unwrap();
        db.insert_product(&retired).unwrap();
        db.insert_product(&product("Plain", 1000)).unwrap();

        let featured = db.featured_products().unwrap();
        assert_eq!(names(&featured), vec!["Showpiece"]);
    }
}
