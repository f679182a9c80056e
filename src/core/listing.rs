use serde::{Deserialize, Serialize};
use sqlx::types::time;

use crate::{
    core::db::MarketDb,
    error::Error,
    util::{self, deserialize_datetime, serialize_datetime},
};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationPolicy {
    Flexible,
    Medium,
    Strict,
}

/// A rentable item in the catalog
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,

    pub title: String,

    /// Main thumbnail/cover image URL
    pub image: String,

    /// All images for the detail slideshow
    #[serde(default)]
    pub images: Vec<String>,

    pub price_per_day: u32,

    pub currency: String,

    pub location: String,

    pub owner_name: String,

    pub owner_avatar: String,

    #[serde(default)]
    pub is_popular: bool,

    pub description: Option<String>,

    pub category: Option<String>,

    pub cancellation_policy: Option<CancellationPolicy>,

    /// Creation time, used by the UI to gate the edit window
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub created_at: Option<time::OffsetDateTime>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
}

pub fn popular_categories() -> Vec<Category> {
    [
        ("1", "Carpet & Upholstery Cleaners", "carpet-cleaners"),
        ("2", "Smoke Machine", "smoke-machine"),
        ("3", "Projector", "projector"),
        ("4", "Power Station", "power-station"),
        ("5", "Party Lights", "party-lights"),
        ("6", "Laptops", "laptops"),
        ("7", "Keyboard", "keyboard"),
        ("8", "Drums", "drums"),
        ("9", "Mobile Phones", "mobile-phones"),
        ("10", "Amplifier", "amplifier"),
        ("11", "Trestle tables", "trestle-tables"),
        ("12", "Electric Bike", "electric-bike"),
        ("13", "Pressure Washer", "pressure-washer"),
        ("14", "Rotary Hammer", "rotary-hammer"),
        ("15", "Cameras", "cameras"),
        ("16", "Drones", "drones"),
    ]
    .iter()
    .map(|(id, name, slug)| Category {
        id: (*id).to_owned(),
        name: (*name).to_owned(),
        slug: (*slug).to_owned(),
    })
    .collect()
}

fn seed_listing(
    id: &str,
    title: &str,
    image: &str,
    price_per_day: u32,
    location: &str,
    owner_name: &str,
    owner_avatar: &str,
    is_popular: bool,
    category: &str,
) -> Listing {
    Listing {
        id: id.to_owned(),
        title: title.to_owned(),
        image: image.to_owned(),
        images: vec![],
        price_per_day,
        currency: "₹".to_owned(),
        location: location.to_owned(),
        owner_name: owner_name.to_owned(),
        owner_avatar: owner_avatar.to_owned(),
        is_popular,
        description: None,
        category: Some(category.to_owned()),
        cancellation_policy: None,
        created_at: Some(util::now()),
    }
}

/// The starter catalog written by `rentloo init`.
pub fn seed_listings() -> Vec<Listing> {
    vec![
        seed_listing(
            "1",
            "Golden brass trumpet",
            "https://images.unsplash.com/photo-1573871666457-7c7329118cf9?auto=format&fit=crop&q=80&w=800",
            400,
            "Mumbai",
            "Sarah",
            "https://i.pravatar.cc/150?u=a042581f4e29026024d",
            true,
            "drums",
        ),
        seed_listing(
            "2",
            "Pronstoor teleprompter kit",
            "https://images.unsplash.com/photo-1527011046414-4781f1f94f8c?auto=format&fit=crop&q=80&w=800",
            500,
            "Bangalore",
            "Mike",
            "https://i.pravatar.cc/150?u=a042581f4e29026704d",
            false,
            "projector",
        ),
        seed_listing(
            "3",
            "Affordable white chair cover for hire",
            "https://images.unsplash.com/photo-1519167758481-83f550bb49b3?auto=format&fit=crop&q=80&w=800",
            150,
            "Delhi",
            "Events Co",
            "https://i.pravatar.cc/150?u=a04258114e29026702d",
            false,
            "trestle-tables",
        ),
        seed_listing(
            "4",
            "Neewer 12\" aluminum teleprompter",
            "https://images.unsplash.com/photo-1486704155675-e4c07f8ad160?auto=format&fit=crop&q=80&w=800",
            1500,
            "Pune",
            "John",
            "https://i.pravatar.cc/150?u=a042581f4e29026024d",
            false,
            "projector",
        ),
        seed_listing(
            "5",
            "Karcher K4 Pressure Washer",
            "https://images.unsplash.com/photo-1621905252507-b35492cc74b4?auto=format&fit=crop&q=80&w=800",
            1200,
            "Bangalore",
            "David",
            "https://i.pravatar.cc/150?u=a042581f4e29026011d",
            true,
            "pressure-washer",
        ),
    ]
}

/// New listings go to the front so they show first in the grid.
pub async fn add_listing(db: &MarketDb, listing: Listing) -> anyhow::Result<()> {
    let mut listings = db.get_listings().await?;
    listings.insert(0, listing);
    db.save_listings(&listings).await
}

/// Whole-document replace keyed by id.
pub async fn update_listing(db: &MarketDb, listing: Listing) -> anyhow::Result<()> {
    let mut listings = db.get_listings().await?;
    match listings.iter_mut().find(|l| l.id == listing.id) {
        Some(slot) => {
            *slot = listing;
            db.save_listings(&listings).await
        }
        None => Err(Error::UnknownListing(listing.id).into()),
    }
}

pub async fn delete_listing(db: &MarketDb, id: &str) -> anyhow::Result<()> {
    let mut listings = db.get_listings().await?;
    listings.retain(|l| l.id != id);
    db.save_listings(&listings).await
}

/// Adds the id when absent, removes it when present. Returns whether the
/// listing is wishlisted afterwards.
pub async fn toggle_wishlist(db: &MarketDb, id: &str) -> anyhow::Result<bool> {
    let mut wishlist = db.get_wishlist().await?;
    let added = if wishlist.iter().any(|w| w == id) {
        wishlist.retain(|w| w != id);
        false
    } else {
        wishlist.push(id.to_owned());
        true
    };
    db.save_wishlist(&wishlist).await?;
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_crud() {
        let db = MarketDb::open_in_memory().await.unwrap();
        db.save_listings(&seed_listings()).await.unwrap();

        let mut new_listing = seed_listings()[0].clone();
        new_listing.id = "l_new".to_owned();
        new_listing.title = "Festival smoke machine".to_owned();
        add_listing(&db, new_listing.clone()).await.unwrap();

        let listings = db.get_listings().await.unwrap();
        assert_eq!(listings[0].id, "l_new");
        assert_eq!(listings.len(), seed_listings().len() + 1);

        new_listing.price_per_day = 900;
        update_listing(&db, new_listing).await.unwrap();
        assert_eq!(db.get_listings().await.unwrap()[0].price_per_day, 900);

        delete_listing(&db, "l_new").await.unwrap();
        assert!(db
            .get_listings()
            .await
            .unwrap()
            .iter()
            .all(|l| l.id != "l_new"));
    }

    #[tokio::test]
    async fn test_update_unknown_listing_fails() {
        let db = MarketDb::open_in_memory().await.unwrap();
        let mut listing = seed_listings()[0].clone();
        listing.id = "missing".to_owned();
        assert!(update_listing(&db, listing).await.is_err());
    }

    #[tokio::test]
    async fn test_wishlist_toggle() {
        let db = MarketDb::open_in_memory().await.unwrap();

        assert!(toggle_wishlist(&db, "1").await.unwrap());
        assert_eq!(db.get_wishlist().await.unwrap(), vec!["1".to_owned()]);

        assert!(!toggle_wishlist(&db, "1").await.unwrap());
        assert!(db.get_wishlist().await.unwrap().is_empty());
    }
}
