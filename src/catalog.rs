// Catalog filtering and sorting over in-memory tour lists

use std::cmp::Ordering;

use crate::models::{Record, Tour};

// Price after the percentage discount (clamped to 0..=100), rounded to a whole amount
pub fn discounted_price(tour: &Tour) -> f64 {
    let discount = tour.discount.clamp(0.0, 100.0);
    (tour.price * (1.0 - discount / 100.0)).round()
}

#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    // Compared against the discounted price
    pub max_price: Option<f64>,
    pub min_price: Option<f64>,
    pub categories: Option<Vec<String>>,
    pub location_contains: Option<String>,
    pub min_rating: Option<f64>,
    pub max_duration_days: Option<u32>,
    // Free text over title, description and location
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    PriceLowToHigh,
    PriceHighToLow,
    Rating,
    Popularity,
}

impl SortOrder {
    // Parse the catalog's sort select values
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" => Some(SortOrder::Newest),
            "price-low" | "price_asc" => Some(SortOrder::PriceLowToHigh),
            "price-high" | "price_desc" => Some(SortOrder::PriceHighToLow),
            "rating" => Some(SortOrder::Rating),
            "popular" | "popularity" => Some(SortOrder::Popularity),
            _ => None,
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn matches(tour: &Tour, criteria: &FilterCriteria) -> bool {
    let price = discounted_price(tour);

    let max_price_ok = criteria.max_price.map_or(true, |max| price <= max);
    let min_price_ok = criteria.min_price.map_or(true, |min| price >= min);

    let category_ok = criteria.categories.as_ref().map_or(true, |categories| {
        categories.is_empty()
            || categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&tour.category))
    });

    let location_ok = criteria
        .location_contains
        .as_ref()
        .map_or(true, |needle| contains_ignore_case(&tour.location, needle));

    let rating_ok = criteria.min_rating.map_or(true, |min| tour.rating >= min);

    let duration_ok = criteria.max_duration_days.map_or(true, |max| {
        tour.duration_days().map_or(false, |days| days <= max)
    });

    let search_ok = criteria.search.as_ref().map_or(true, |text| {
        let text = text.trim();
        text.is_empty()
            || contains_ignore_case(&tour.title, text)
            || contains_ignore_case(&tour.description, text)
            || contains_ignore_case(&tour.location, text)
    });

    max_price_ok && min_price_ok && category_ok && location_ok && rating_ok && duration_ok && search_ok
}

// Extract tours that match the given criteria
pub fn filter_tours(tours: &[Tour], criteria: &FilterCriteria) -> Vec<Tour> {
    tours.iter().filter(|t| matches(t, criteria)).cloned().collect()
}

// Numeric id descending; records without id go last
pub fn sort_newest_first<T: Record>(records: &mut [T]) {
    records.sort_by(|a, b| match (a.id(), b.id()) {
        (Some(a), Some(b)) => b.numeric_cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

pub fn sort_tours(tours: &mut [Tour], order: SortOrder) {
    match order {
        SortOrder::Newest => sort_newest_first(tours),
        SortOrder::PriceLowToHigh => {
            tours.sort_by(|a, b| discounted_price(a).total_cmp(&discounted_price(b)))
        }
        SortOrder::PriceHighToLow => {
            tours.sort_by(|a, b| discounted_price(b).total_cmp(&discounted_price(a)))
        }
        SortOrder::Rating => tours.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then(b.review_count.cmp(&a.review_count))
        }),
        SortOrder::Popularity => tours.sort_by(|a, b| b.review_count.cmp(&a.review_count)),
    }
}

// Filter then sort, the catalog page in one call
pub fn search_tours(tours: &[Tour], criteria: &FilterCriteria, order: SortOrder) -> Vec<Tour> {
    let mut found = filter_tours(tours, criteria);
    sort_tours(&mut found, order);
    found
}

// Distinct categories in first-seen order, for the filter sidebar
pub fn categories(tours: &[Tour]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for tour in tours {
        if !tour.category.is_empty() && !seen.iter().any(|c| c.eq_ignore_ascii_case(&tour.category)) {
            seen.push(tour.category.clone());
        }
    }
    seen
}
