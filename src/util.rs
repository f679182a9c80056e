use rand::Rng;
use serde::{Deserialize, Deserializer, Serializer};
use sqlx::types::time;

pub fn serialize_datetime<S>(x: &Option<time::OffsetDateTime>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if let Some(x) = x {
        s.serialize_u64((x.unix_timestamp_nanos() / 1_000_000) as u64)
    } else {
        s.serialize_none()
    }
}

pub fn deserialize_datetime<'de, D>(d: D) -> Result<Option<time::OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let x = Option::<u64>::deserialize(d)?;
    let time = x.map(|x| time::OffsetDateTime::from_unix_timestamp_nanos(x as i128 * 1_000_000));
    match time {
        Some(Ok(x)) => Ok(Some(x)),
        _ => Ok(None),
    }
}

pub fn now() -> time::OffsetDateTime {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0);
    time::OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
}

pub fn millis_to_datetime(millis: u64) -> time::OffsetDateTime {
    time::OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
}

pub fn add_days(t: time::OffsetDateTime, days: u32) -> time::OffsetDateTime {
    let nanos = t.unix_timestamp_nanos() + i128::from(days) * 86_400_000_000_000;
    time::OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(t)
}

const ID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Short opaque identifier for locally created entities.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..9)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

/// Identicon-style avatar derived from a display name at creation time.
pub fn avatar_url(name: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids() {
        let id = generate_id();
        assert_eq!(id.len(), 9);
        assert!(id.bytes().all(|b| ID_CHARSET.contains(&b)));
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_avatar_derivation() {
        assert_eq!(
            avatar_url("Sarah"),
            "https://api.dicebear.com/7.x/avataaars/svg?seed=Sarah"
        );
        assert_eq!(avatar_url("Sarah"), avatar_url("Sarah"));
    }
}
