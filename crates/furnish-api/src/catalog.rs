use std::sync::Arc;

use chrono::Utc;
use furnish_db::products::to_cents;
use furnish_db::{Database, is_unique_violation};
use furnish_types::api::{NewProduct, ProductPatch};
use furnish_types::catalog::{PageRequest, ProductFilter, ProductPage, Sort};
use furnish_types::models::{Category, Product};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{PageCache, PageKey};
use crate::error::{ApiError, ApiResult};

/// Picks the single filter a listing uses when a client sends several:
/// search beats category, category beats price range, and with none of them
/// the listing is unfiltered. Blank search text counts as absent.
pub fn resolve_filter(
    search: Option<String>,
    category: Option<Uuid>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
) -> ProductFilter {
    if let Some(term) = search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        return ProductFilter::Search(term);
    }
    if let Some(category_id) = category {
        return ProductFilter::Category(category_id);
    }
    if min_price.is_some() || max_price.is_some() {
        return ProductFilter::PriceRange { min: min_price, max: max_price };
    }
    ProductFilter::All
}

/// Lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

pub struct CatalogService {
    db: Arc<Database>,
    cache: PageCache,
}

impl CatalogService {
    pub fn new(db: Arc<Database>, cache: PageCache) -> Self {
        Self { db, cache }
    }

    /// Paged listing of active products. Only the unfiltered listing goes
    /// through the page cache.
    pub fn list(&self, filter: ProductFilter, page: PageRequest, sort: Sort) -> ApiResult<ProductPage> {
        if let ProductFilter::PriceRange { min, max } = &filter {
            check_bound("minPrice", *min)?;
            check_bound("maxPrice", *max)?;
        }

        let key = PageKey { page, sort };
        if filter == ProductFilter::All {
            if let Some(cached) = self.cache.get(&key) {
                debug!("Page cache hit for page {}", page.page());
                return Ok(cached);
            }
        }

        // Taken before the read so a write racing with it keeps the page out.
        let generation = self.cache.generation();
        let (products, total) = self.db.list_products(&filter, page, sort)?;
        let result = ProductPage::new(products, page, total);

        if filter == ProductFilter::All {
            self.cache.put(key, result.clone(), generation);
        }
        Ok(result)
    }

    /// Direct lookup; inactive products are returned too.
    pub fn get_by_id(&self, id: Uuid) -> ApiResult<Product> {
        self.db.get_product_by_id(id)?.ok_or(ApiError::NotFound("Product"))
    }

    /// Counts a view before returning the product.
    pub fn get_by_slug(&self, slug: &str) -> ApiResult<Product> {
        self.db.record_product_view(slug)?.ok_or(ApiError::NotFound("Product"))
    }

    pub fn get_featured(&self) -> ApiResult<Vec<Product>> {
        Ok(self.db.featured_products()?)
    }

    pub fn create(&self, input: NewProduct) -> ApiResult<Product> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::validation("Product name is required"));
        }
        check_amount("price", Some(input.price))?;
        check_amount("salePrice", input.sale_price)?;
        check_amount("costPrice", input.cost_price)?;

        let slug = match input.slug.as_deref().map(slugify).filter(|s| !s.is_empty()) {
            Some(explicit) => explicit,
            None => self.free_slug(&name)?,
        };

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name,
            slug,
            description: input.description,
            short_description: input.short_description,
            category_id: input.category_id,
            sku: input.sku.filter(|s| !s.trim().is_empty()),
            price: input.price,
            sale_price: input.sale_price,
            cost_price: input.cost_price,
            stock_quantity: input.stock_quantity,
            low_stock_threshold: input.low_stock_threshold,
            material: input.material,
            color: input.color,
            brand: input.brand,
            warranty_period: input.warranty_period,
            care_instructions: input.care_instructions,
            has_360_view: input.has_360_view,
            model_3d_url: input.model_3d_url,
            is_featured: input.is_featured,
            is_active: input.is_active,
            is_customizable: input.is_customizable,
            assembly_required: input.assembly_required,
            average_rating: Decimal::ZERO,
            total_reviews: 0,
            total_sales: 0,
            views: 0,
            seo_title: input.seo_title,
            seo_description: input.seo_description,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_product(&product).map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::validation("A product with this slug or SKU already exists")
            } else {
                ApiError::Internal(e)
            }
        })?;
        self.cache.invalidate_all();

        info!("Created product {} ({})", product.id, product.slug);
        Ok(product)
    }

    pub fn update(&self, id: Uuid, patch: ProductPatch) -> ApiResult<Product> {
        if patch.name.trim().is_empty() {
            return Err(ApiError::validation("Product name is required"));
        }
        check_amount("price", Some(patch.price))?;
        check_amount("salePrice", patch.sale_price)?;

        let product = self
            .db
            .apply_product_patch(id, &patch, Utc::now())?
            .ok_or(ApiError::NotFound("Product"))?;
        self.cache.invalidate_all();

        info!("Updated product {}", id);
        Ok(product)
    }

    /// Soft delete: the product stays retrievable by id.
    pub fn delete(&self, id: Uuid) -> ApiResult<()> {
        if !self.db.deactivate_product(id, Utc::now())? {
            return Err(ApiError::NotFound("Product"));
        }
        self.cache.invalidate_all();

        info!("Deactivated product {}", id);
        Ok(())
    }

    pub fn list_categories(&self, parent: Option<Uuid>) -> ApiResult<Vec<Category>> {
        Ok(self.db.list_categories(parent)?)
    }

    pub fn get_category_by_slug(&self, slug: &str) -> ApiResult<Category> {
        self.db
            .get_category_by_slug(slug)?
            .filter(|c| c.is_active)
            .ok_or(ApiError::NotFound("Category"))
    }

    fn free_slug(&self, name: &str) -> ApiResult<String> {
        let base = match slugify(name) {
            s if s.is_empty() => "product".to_string(),
            s => s,
        };
        if !self.db.product_slug_exists(&base)? {
            return Ok(base);
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.db.product_slug_exists(&candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

fn check_amount(field: &str, amount: Option<Decimal>) -> ApiResult<()> {
    match amount {
        Some(value) if value < Decimal::ZERO => {
            Err(ApiError::validation(format!("{field} must not be negative")))
        }
        _ => check_bound(field, amount),
    }
}

/// The amount must fit the store's cent columns.
fn check_bound(field: &str, amount: Option<Decimal>) -> ApiResult<()> {
    match amount {
        Some(value) if to_cents(value).is_err() => {
            Err(ApiError::validation(format!("{field} is out of range")))
        }
        _ => Ok(()),
    }
}
