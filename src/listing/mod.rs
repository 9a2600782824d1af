//! Marketplace listings
//!
//! The `Listing` record as stored in the `listings` table, the enumerations it
//! uses, and `ListingFilter`, the predicate shared by snapshot queries and
//! change subscriptions.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Listing category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    House,
    Car,
    Service,
    Product,
}

impl Category {
    /// Column value used by the table store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Car => "car",
            Self::Service => "service",
            Self::Product => "product",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "house" | "houses" => Ok(Self::House),
            "car" | "cars" => Ok(Self::Car),
            "service" | "services" => Ok(Self::Service),
            "product" | "products" => Ok(Self::Product),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Billing period attached to a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricePeriod {
    Month,
    Day,
    Hour,
    OneTime,
}

impl fmt::Display for PricePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Month => write!(f, "month"),
            Self::Day => write!(f, "day"),
            Self::Hour => write!(f, "hour"),
            Self::OneTime => write!(f, "one-time"),
        }
    }
}

impl std::str::FromStr for PricePeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "month" | "monthly" => Ok(Self::Month),
            "day" | "daily" => Ok(Self::Day),
            "hour" | "hourly" => Ok(Self::Hour),
            "one-time" | "once" => Ok(Self::OneTime),
            _ => Err(format!("Unknown price period: {}", s)),
        }
    }
}

/// One marketplace post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Assigned by the store at creation, never reassigned
    pub id: String,

    /// Owner identity from the auth provider
    pub user_id: String,

    pub category: Category,

    #[serde(default)]
    pub subcategory: Option<String>,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub price: Option<f64>,

    #[serde(default)]
    pub price_period: Option<PricePeriod>,

    /// Free text: an address or a serialized `"<lat>, <lng>"` pair
    #[serde(default)]
    pub location: Option<String>,

    /// Image URLs in display order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Check the attributes the store cannot enforce on its own
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.title, self.price)
    }
}

/// Fields supplied by a seller when posting a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    /// Owner; filled in from the session when posted over the API
    #[serde(default)]
    pub user_id: String,
    pub category: Category,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub price_period: Option<PricePeriod>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewListing {
    /// Create a listing draft with the required fields
    pub fn new(user_id: impl Into<String>, category: Category, title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            category,
            subcategory: None,
            title: title.into(),
            description: None,
            price: None,
            price_period: None,
            location: None,
            images: Vec::new(),
        }
    }

    /// Set the location text
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the price and its period
    pub fn with_price(mut self, price: f64, period: Option<PricePeriod>) -> Self {
        self.price = Some(price);
        self.price_period = period;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidListing("A listing needs an owner".to_string()));
        }
        validate_fields(&self.title, self.price)
    }

    /// Turn the draft into a stored listing
    pub fn into_listing(self, id: String, created_at: DateTime<Utc>) -> Listing {
        Listing {
            id,
            user_id: self.user_id,
            category: self.category,
            subcategory: self.subcategory,
            title: self.title,
            description: self.description,
            price: self.price,
            price_period: self.price_period,
            location: self.location,
            images: self.images,
            created_at,
            updated_at: None,
        }
    }
}

fn validate_fields(title: &str, price: Option<f64>) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidListing("Title must not be empty".to_string()));
    }
    if let Some(price) = price {
        if !price.is_finite() || price < 0.0 {
            return Err(Error::InvalidListing(format!(
                "Price {} must be a non-negative number",
                price
            )));
        }
    }
    Ok(())
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Row predicate for snapshot queries and change subscriptions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    /// Skip rows owned by this user
    pub exclude_user_id: Option<String>,

    /// Only rows in this category
    pub category: Option<Category>,

    /// Case-insensitive substring of title, subcategory or description
    pub text: Option<String>,
}

impl ListingFilter {
    /// Everything not owned by `user_id`
    pub fn excluding_user(user_id: impl Into<String>) -> Self {
        Self {
            exclude_user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    /// Blank queries are treated as no text filter
    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        self
    }

    /// Check whether a listing satisfies every part of the predicate
    pub fn matches(&self, listing: &Listing) -> bool {
        if self.exclude_user_id.as_deref() == Some(listing.user_id.as_str()) {
            return false;
        }
        if self.category.is_some_and(|c| c != listing.category) {
            return false;
        }
        match &self.text {
            Some(needle) => [
                Some(listing.title.as_str()),
                listing.subcategory.as_deref(),
                listing.description.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle.as_str())),
            None => true,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A house listing owned by `user_id` at `location`
    pub(crate) fn listing_at(id: &str, user_id: &str, location: Option<&str>) -> Listing {
        Listing {
            id: id.to_string(),
            user_id: user_id.to_string(),
            category: Category::House,
            subcategory: None,
            title: format!("Listing {}", id),
            description: None,
            price: None,
            price_period: None,
            location: location.map(str::to_string),
            images: Vec::new(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_row_deserialization() {
        let row = serde_json::json!({
            "id": "0b9c",
            "user_id": "u-1",
            "title": "Modern Apartment Near Stadium",
            "description": null,
            "category": "house",
            "subcategory": "Apartment",
            "price": 18000,
            "price_period": "month",
            "location": "9.0105, 38.7645",
            "images": null,
            "created_at": "2024-03-11T10:00:00Z",
            "updated_at": "2024-03-11T10:00:00Z"
        });

        let listing: Listing = serde_json::from_value(row).unwrap();
        assert_eq!(listing.category, Category::House);
        assert_eq!(listing.price, Some(18000.0));
        assert_eq!(listing.price_period, Some(PricePeriod::Month));
        assert!(listing.images.is_empty());
        assert!(listing.updated_at.is_some());
    }

    #[test]
    fn test_one_time_period() {
        let period: PricePeriod = serde_json::from_str("\"one-time\"").unwrap();
        assert_eq!(period, PricePeriod::OneTime);
        assert_eq!(serde_json::to_string(&PricePeriod::OneTime).unwrap(), "\"one-time\"");
    }

    #[test]
    fn test_unknown_category_rejected() {
        let row = serde_json::json!({
            "id": "x",
            "user_id": "u",
            "title": "Boat",
            "category": "boat",
            "created_at": "2024-03-11T10:00:00Z"
        });
        assert!(serde_json::from_value::<Listing>(row).is_err());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Cars".parse::<Category>().unwrap(), Category::Car);
        assert_eq!("service".parse::<Category>().unwrap(), Category::Service);
        assert!("boats".parse::<Category>().is_err());
    }

    #[test]
    fn test_validation() {
        let mut listing = listing_at("a", "u", None);
        assert!(listing.validate().is_ok());

        listing.title = "   ".to_string();
        assert!(listing.validate().is_err());

        listing.title = "Coffee set".to_string();
        listing.price = Some(-1.0);
        assert!(listing.validate().is_err());

        listing.price = Some(0.0);
        assert!(listing.validate().is_ok());
    }

    #[test]
    fn test_price_period_from_str() {
        assert_eq!("monthly".parse::<PricePeriod>(), Ok(PricePeriod::Month));
        assert_eq!("one-time".parse::<PricePeriod>(), Ok(PricePeriod::OneTime));
        assert!("weekly".parse::<PricePeriod>().is_err());
    }

    #[test]
    fn test_draft_needs_owner() {
        let draft: NewListing = serde_json::from_value(serde_json::json!({
            "category": "service",
            "title": "House cleaning"
        }))
        .unwrap();
        assert_eq!(draft.user_id, "");
        assert!(draft.validate().is_err());

        let draft = NewListing {
            user_id: "u-1".to_string(),
            ..draft
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_filter_excludes_owner() {
        let filter = ListingFilter::excluding_user("me");
        assert!(!filter.matches(&listing_at("a", "me", None)));
        assert!(filter.matches(&listing_at("b", "someone", None)));
    }

    #[test]
    fn test_filter_category_and_text() {
        let mut car = listing_at("c", "seller", None);
        car.category = Category::Car;
        car.title = "Toyota Land Cruiser 2020".to_string();
        car.subcategory = Some("SUV".to_string());

        let filter = ListingFilter::default().with_category(Some(Category::Car));
        assert!(filter.matches(&car));
        assert!(!filter.matches(&listing_at("h", "seller", None)));

        let filter = ListingFilter::default().with_text(Some("  suv ".to_string()));
        assert!(filter.matches(&car));

        let filter = ListingFilter::default().with_text(Some("villa".to_string()));
        assert!(!filter.matches(&car));

        let filter = ListingFilter::default().with_text(Some("   ".to_string()));
        assert_eq!(filter.text, None);
    }
}
