use serde::{Deserialize, Serialize};
use sqlx::types::time;

use crate::{
    core::{db::MarketDb, listing::Listing},
    error::Error,
    util::{self, deserialize_datetime, serialize_datetime},
};

/// A single rental line item
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Unique ID for the cart line item, not the listing
    pub id: String,

    pub listing: Listing,

    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub start_date: Option<time::OffsetDateTime>,

    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub end_date: Option<time::OffsetDateTime>,

    pub days: u32,

    pub total_price: u32,
}

pub fn cart_total(items: &[CartItem]) -> u32 {
    items.iter().map(|i| i.total_price).sum()
}

/// Puts a rental for `listing_id` in the cart. A line item for the same
/// listing starting on the same calendar day is treated as already present
/// and returns None without changing the cart.
pub async fn add_to_cart(
    db: &MarketDb,
    listing_id: &str,
    days: u32,
    start_date: time::OffsetDateTime,
) -> anyhow::Result<Option<CartItem>> {
    let listings = db.get_listings().await?;
    let listing = listings
        .iter()
        .find(|l| l.id == listing_id)
        .ok_or_else(|| Error::UnknownListing(listing_id.to_owned()))?;

    let mut items = db.get_cart().await?;
    let duplicate = items.iter().any(|item| {
        item.listing.id == listing_id && item.start_date.map(|d| d.date()) == Some(start_date.date())
    });
    if duplicate {
        return Ok(None);
    }

    let item = CartItem {
        id: util::generate_id(),
        listing: listing.clone(),
        start_date: Some(start_date),
        end_date: Some(util::add_days(start_date, days)),
        days,
        total_price: listing.price_per_day * days,
    };
    items.push(item.clone());
    db.save_cart(&items).await?;
    Ok(Some(item))
}

pub async fn remove_from_cart(db: &MarketDb, cart_item_id: &str) -> anyhow::Result<()> {
    let mut items = db.get_cart().await?;
    items.retain(|item| item.id != cart_item_id);
    db.save_cart(&items).await
}

pub async fn clear_cart(db: &MarketDb) -> anyhow::Result<()> {
    db.save_cart(&[]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::listing::seed_listings;

    async fn seeded_db() -> MarketDb {
        let db = MarketDb::open_in_memory().await.unwrap();
        db.save_listings(&seed_listings()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_add_computes_dates_and_total() {
        let db = seeded_db().await;
        let start = util::now();

        let item = add_to_cart(&db, "1", 3, start).await.unwrap().unwrap();
        assert_eq!(item.days, 3);
        assert_eq!(item.total_price, 400 * 3);
        assert_eq!(
            item.end_date.unwrap().unix_timestamp() - item.start_date.unwrap().unix_timestamp(),
            3 * 86_400
        );

        let items = db.get_cart().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(cart_total(&items), 1200);
    }

    #[tokio::test]
    async fn test_duplicate_start_day_is_skipped() {
        let db = seeded_db().await;
        let start = util::now();

        assert!(add_to_cart(&db, "1", 2, start).await.unwrap().is_some());
        assert!(add_to_cart(&db, "1", 5, start).await.unwrap().is_none());
        assert_eq!(db.get_cart().await.unwrap().len(), 1);

        // Same listing on another day is a separate rental.
        let later = util::add_days(start, 10);
        assert!(add_to_cart(&db, "1", 2, later).await.unwrap().is_some());
        assert_eq!(db.get_cart().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_listing_is_rejected() {
        let db = seeded_db().await;
        assert!(add_to_cart(&db, "missing", 1, util::now()).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let db = seeded_db().await;
        let start = util::now();
        let item = add_to_cart(&db, "1", 1, start).await.unwrap().unwrap();
        add_to_cart(&db, "2", 1, start).await.unwrap().unwrap();

        remove_from_cart(&db, &item.id).await.unwrap();
        let items = db.get_cart().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].listing.id, "2");

        clear_cart(&db).await.unwrap();
        assert!(db.get_cart().await.unwrap().is_empty());
    }
}
