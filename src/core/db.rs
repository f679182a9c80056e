use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{migrate::MigrateDatabase, sqlite::Sqlite, SqlitePool};

use crate::core::{
    cart::CartItem, listing::Listing, message::ContactMessage, order::Order, user::User,
    vote::Participant,
};

const KEY_LISTINGS: &str = "listings";
const KEY_CART: &str = "cart";
const KEY_WISHLIST: &str = "wishlist";
const KEY_ORDERS: &str = "orders";
const KEY_MESSAGES: &str = "messages";
const KEY_USER: &str = "user";
const KEY_PARTICIPANTS: &str = "participants";
const KEY_VOTING_ACTIVE: &str = "voting_active";
const KEY_USER_VOTE: &str = "user_vote";

/// Local persistent store. Every local-only entity is kept as a
/// whole-collection JSON snapshot under a fixed string key.
pub struct MarketDb {
    db: SqlitePool,
}

impl MarketDb {
    pub async fn init(file: &PathBuf) -> anyhow::Result<Self> {
        let url = format!("sqlite://{}", file.display());
        Sqlite::create_database(&url).await?;

        let db = SqlitePool::connect(&url).await?;
        sqlx::query(
            "create table if not exists kv(
                        key text primary key not null,
                        value text not null
                    );",
        )
        .execute(&db)
        .await?;

        Ok(MarketDb { db })
    }

    pub async fn load(file: &PathBuf) -> anyhow::Result<Self> {
        Self::init(file).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> anyhow::Result<Self> {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::query(
            "create table if not exists kv(
                        key text primary key not null,
                        value text not null
                    );",
        )
        .execute(&db)
        .await?;
        Ok(MarketDb { db })
    }

    async fn read_raw(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(sqlx::query_scalar("select value from kv where key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn write_raw(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            "insert into kv(key, value) values(?, ?)
                    on conflict(key) do update set value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn clear_key(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query("delete from kv where key = ?")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Missing key reads as the empty collection.
    async fn read_collection<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Vec<T>> {
        match self.read_raw(key).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(vec![]),
        }
    }

    async fn write_collection<T: Serialize>(&self, key: &str, items: &[T]) -> anyhow::Result<()> {
        self.write_raw(key, &serde_json::to_string(items)?).await
    }

    pub async fn get_listings(&self) -> anyhow::Result<Vec<Listing>> {
        self.read_collection(KEY_LISTINGS).await
    }

    pub async fn save_listings(&self, listings: &[Listing]) -> anyhow::Result<()> {
        self.write_collection(KEY_LISTINGS, listings).await
    }

    pub async fn get_cart(&self) -> anyhow::Result<Vec<CartItem>> {
        self.read_collection(KEY_CART).await
    }

    pub async fn save_cart(&self, items: &[CartItem]) -> anyhow::Result<()> {
        self.write_collection(KEY_CART, items).await
    }

    pub async fn get_wishlist(&self) -> anyhow::Result<Vec<String>> {
        self.read_collection(KEY_WISHLIST).await
    }

    pub async fn save_wishlist(&self, ids: &[String]) -> anyhow::Result<()> {
        self.write_collection(KEY_WISHLIST, ids).await
    }

    pub async fn get_orders(&self) -> anyhow::Result<Vec<Order>> {
        self.read_collection(KEY_ORDERS).await
    }

    pub async fn save_orders(&self, orders: &[Order]) -> anyhow::Result<()> {
        self.write_collection(KEY_ORDERS, orders).await
    }

    pub async fn get_messages(&self) -> anyhow::Result<Vec<ContactMessage>> {
        self.read_collection(KEY_MESSAGES).await
    }

    pub async fn save_messages(&self, messages: &[ContactMessage]) -> anyhow::Result<()> {
        self.write_collection(KEY_MESSAGES, messages).await
    }

    pub async fn get_user(&self) -> anyhow::Result<Option<User>> {
        match self.read_raw(KEY_USER).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn set_user(&self, user: &User) -> anyhow::Result<()> {
        self.write_raw(KEY_USER, &serde_json::to_string(user)?).await
    }

    pub async fn clear_user(&self) -> anyhow::Result<()> {
        self.clear_key(KEY_USER).await
    }

    pub async fn get_participants(&self) -> anyhow::Result<Vec<Participant>> {
        self.read_collection(KEY_PARTICIPANTS).await
    }

    pub async fn save_participants(&self, participants: &[Participant]) -> anyhow::Result<()> {
        self.write_collection(KEY_PARTICIPANTS, participants).await
    }

    /// Defaults to false when the flag has never been persisted.
    pub async fn voting_active(&self) -> anyhow::Result<bool> {
        match self.read_raw(KEY_VOTING_ACTIVE).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(false),
        }
    }

    pub async fn set_voting_active(&self, active: bool) -> anyhow::Result<()> {
        self.write_raw(KEY_VOTING_ACTIVE, &serde_json::to_string(&active)?)
            .await
    }

    /// The local client's current vote target, if any. Stored as the raw
    /// participant id; clearing the key clears the vote.
    pub async fn user_vote(&self) -> anyhow::Result<Option<String>> {
        self.read_raw(KEY_USER_VOTE).await
    }

    pub async fn set_user_vote(&self, vote: Option<&str>) -> anyhow::Result<()> {
        match vote {
            Some(id) => self.write_raw(KEY_USER_VOTE, id).await,
            None => self.clear_key(KEY_USER_VOTE).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vote::Participant;

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let db = MarketDb::open_in_memory().await.unwrap();

        assert!(db.get_participants().await.unwrap().is_empty());

        let roster = vec![
            Participant::new("Asha", "Community gardener"),
            Participant::new("Ravi", "Repair cafe host"),
        ];
        db.save_participants(&roster).await.unwrap();
        assert_eq!(db.get_participants().await.unwrap(), roster);

        let trimmed = &roster[..1];
        db.save_participants(trimmed).await.unwrap();
        assert_eq!(db.get_participants().await.unwrap(), trimmed);
    }

    #[tokio::test]
    async fn test_voting_flag_defaults_off() {
        let db = MarketDb::open_in_memory().await.unwrap();
        assert!(!db.voting_active().await.unwrap());

        db.set_voting_active(true).await.unwrap();
        assert!(db.voting_active().await.unwrap());
    }

    #[tokio::test]
    async fn test_user_vote_set_and_clear() {
        let db = MarketDb::open_in_memory().await.unwrap();
        assert_eq!(db.user_vote().await.unwrap(), None);

        db.set_user_vote(Some("abc123xyz")).await.unwrap();
        assert_eq!(db.user_vote().await.unwrap(), Some("abc123xyz".to_owned()));

        db.set_user_vote(None).await.unwrap();
        assert_eq!(db.user_vote().await.unwrap(), None);
    }
}
