use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::types::time;

use crate::{
    core::db::MarketDb,
    util::{self, deserialize_datetime, serialize_datetime},
};

/// A message submitted through the contact form, shown in the admin inbox.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,

    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub date: Option<time::OffsetDateTime>,

    #[serde(default)]
    pub read: bool,
}

/// Newest messages go to the front of the inbox.
pub async fn submit_message(
    db: &MarketDb,
    name: &str,
    email: &str,
    subject: &str,
    body: &str,
) -> anyhow::Result<ContactMessage> {
    let message = ContactMessage {
        id: util::generate_id(),
        name: name.to_owned(),
        email: email.to_owned(),
        subject: subject.to_owned(),
        message: body.to_owned(),
        date: Some(util::now()),
        read: false,
    };

    let mut messages = db.get_messages().await?;
    messages.insert(0, message.clone());
    db.save_messages(&messages).await?;
    Ok(message)
}

pub async fn mark_read(db: &MarketDb, id: &str) -> anyhow::Result<()> {
    let mut messages = db.get_messages().await?;
    if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
        message.read = true;
    }
    db.save_messages(&messages).await
}

pub async fn delete_message(db: &MarketDb, id: &str) -> anyhow::Result<()> {
    let mut messages = db.get_messages().await?;
    messages.retain(|m| m.id != id);
    db.save_messages(&messages).await
}

/// Keyword-matching support bot. The first matching rule wins; anything
/// else gets the fallback reply.
pub struct ChatBot {
    rules: Vec<(Regex, String)>,
    fallback: String,
}

impl ChatBot {
    pub fn new() -> ChatBot {
        let rules = [
            (
                "how does rentloo work",
                "Rentloo makes renting simple! Browse items nearby and request a booking, \
                 list your own gear in seconds, pay securely (the money is held until the \
                 owner accepts), then meet the owner to pick up and return the item.",
            ),
            (
                "about rentloo",
                "Rentloo is a peer-to-peer rental marketplace where you can borrow items \
                 from your neighbors instead of buying them. We aim to reduce waste, save \
                 you money, and build stronger communities!",
            ),
            (
                "guarantee|insurance",
                "We provide a comprehensive guarantee. Every rental is insured up to \
                 ₹25,00,000 against damage and theft. Both owners and renters are verified \
                 for safety.",
            ),
            (
                "faq",
                "Here are some of our most frequently asked questions. Click on any of the \
                 buttons below to learn more.",
            ),
            (
                "terms",
                "Our Terms and Conditions ensure a safe community. Key points: users must \
                 be 18+, ID verification is mandatory, and you are responsible for the item \
                 during the rental period. Cancellations are free up to 24h before start.",
            ),
            (
                "privacy",
                "We take privacy seriously. Your data is encrypted and stored securely. We \
                 do not sell your data. You can manage your privacy settings in your profile.",
            ),
            (
                "partnership",
                "We are always looking for great partners! Whether you are a business or an \
                 influencer, please reach out to us at partners@rentloo.com with your proposal.",
            ),
        ]
        .iter()
        .map(|(pattern, answer)| {
            (
                Regex::new(&format!("(?i){}", pattern)).expect("Invalid chat rule pattern"),
                (*answer).to_owned(),
            )
        })
        .collect();

        ChatBot {
            rules,
            fallback: "I'm not sure about that. Try one of the suggested questions below."
                .to_owned(),
        }
    }

    pub fn reply(&self, query: &str) -> &str {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(query))
            .map(|(_, answer)| answer.as_str())
            .unwrap_or(&self.fallback)
    }
}

impl Default for ChatBot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_matches_keywords_case_insensitively() {
        let bot = ChatBot::new();
        assert!(bot.reply("Tell me ABOUT RENTLOO").contains("peer-to-peer"));
        assert!(bot.reply("do you offer insurance?").contains("insured"));
        assert!(bot.reply("what about a guarantee").contains("insured"));
        assert!(bot.reply("what are your terms").contains("18+"));
    }

    #[test]
    fn test_bot_falls_back_on_unknown_queries() {
        let bot = ChatBot::new();
        assert!(bot.reply("can you walk my dog").starts_with("I'm not sure"));
    }

    #[tokio::test]
    async fn test_inbox_front_inserts_and_marks_read() {
        let db = MarketDb::open_in_memory().await.unwrap();

        submit_message(&db, "Asha", "asha@example.com", "Damaged item", "The drill arrived broken.")
            .await
            .unwrap();
        let second = submit_message(&db, "Ravi", "ravi@example.com", "Refund", "When is my refund due?")
            .await
            .unwrap();

        let messages = db.get_messages().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, second.id);
        assert!(!messages[0].read);

        mark_read(&db, &second.id).await.unwrap();
        assert!(db.get_messages().await.unwrap()[0].read);

        delete_message(&db, &second.id).await.unwrap();
        assert_eq!(db.get_messages().await.unwrap().len(), 1);
    }
}
