use anyhow::Result;
use chrono::Utc;
use fourdata_db::db::{get_profile, upsert_profile};
use fourdata_db::models::Profile;
use fourdata_db::rusqlite::Connection;
use rand::Rng;

use crate::auth::Session;

/// First five characters of the email's local part plus four random digits.
pub fn generate_username(email: &str, rng: &mut impl Rng) -> String {
    let local = email.split('@').next().unwrap_or_default().to_lowercase();
    let local = if local.is_empty() { "user".to_string() } else { local };
    let prefix: String = local.chars().take(5).collect();
    format!("{}{}", prefix, rng.random_range(1000..=9999u16))
}

/// Returns the user's profile, creating it on first sign-in.
pub fn ensure_profile(conn: &Connection, session: &Session, rng: &mut impl Rng) -> Result<Profile> {
    if let Some(existing) = get_profile(conn, &session.user_id)? {
        tracing::debug!(user = %session.user_id, "profile already exists");
        return Ok(existing);
    }

    let email = session.email.clone().unwrap_or_default();
    let profile = Profile {
        id: session.user_id.clone(),
        username: generate_username(&email, rng),
        email,
        full_name: String::new(),
        avatar_url: String::new(),
        updated_at: Utc::now().to_rfc3339(),
    };
    upsert_profile(conn, &profile)?;
    tracing::info!(user = %profile.id, username = %profile.username, "profile created");
    Ok(profile)
}
