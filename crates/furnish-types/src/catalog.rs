use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Product;

pub const MAX_PAGE_SIZE: u32 = 100;

/// Which subset of active products a listing covers. Only one filter applies
/// to a listing; see `furnish_api::catalog::resolve_filter` for precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductFilter {
    All,
    Search(String),
    Category(Uuid),
    PriceRange {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Name,
    Price,
    Views,
    TotalSales,
    AverageRating,
    StockQuantity,
}

impl SortField {
    /// Accepts the camelCase field names used in the JSON representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(Self::CreatedAt),
            "updatedAt" => Some(Self::UpdatedAt),
            "name" => Some(Self::Name),
            "price" => Some(Self::Price),
            "views" => Some(Self::Views),
            "totalSales" => Some(Self::TotalSales),
            "averageRating" => Some(Self::AverageRating),
            "stockQuantity" => Some(Self::StockQuantity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `asc` in any case sorts ascending; anything else sorts descending.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for Sort {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

/// Zero-based page index plus page size. Construct through `new` so the size
/// is always within `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Option<Self> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return None;
        }
        Some(Self { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub current_page: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl ProductPage {
    pub fn new(products: Vec<Product>, request: PageRequest, total_items: u64) -> Self {
        Self {
            products,
            current_page: request.page(),
            total_items,
            total_pages: total_pages(total_items, request.size()),
        }
    }
}

/// `ceil(total_items / size)`; zero items means zero pages.
pub fn total_pages(total_items: u64, size: u32) -> u64 {
    if size == 0 {
        return 0;
    }
    total_items.div_ceil(u64::from(size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(99, 10), 10);
    }

    #[test]
    fn current_page_is_below_total_for_every_full_page() {
        for total in 1..=57u64 {
            for size in 1..=12u32 {
                let pages = total_pages(total, size);
                assert_eq!(pages, (total + u64::from(size) - 1) / u64::from(size));
                let last = PageRequest::new((pages - 1) as u32, size).unwrap();
                assert!(u64::from(last.page()) < pages);
                assert!(last.offset() < total);
            }
        }
    }

    #[test]
    fn page_request_rejects_out_of_range_sizes() {
        assert!(PageRequest::new(0, 0).is_none());
        assert!(PageRequest::new(0, MAX_PAGE_SIZE + 1).is_none());
        let req = PageRequest::new(3, 25).unwrap();
        assert_eq!(req.offset(), 75);
    }

    #[test]
    fn sort_parsing() {
        assert_eq!(SortField::parse("price"), Some(SortField::Price));
        assert_eq!(SortField::parse("created_at"), None);
        assert_eq!(SortDirection::parse("ASC"), SortDirection::Asc);
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Desc);
        assert_eq!(Sort::default().field, SortField::CreatedAt);
    }
}
