//! Fetch every actor updated after a timestamp, page by page.
//!
//! Run:
//! `cargo run --example async_updated_since`
//!
//! Optional env vars:
//! - `ODA_BASE_URL` (defaults to the metadata service root)
//! - `ODA_SINCE` (RFC 3339, defaults to seven days ago)

use chrono::{DateTime, Duration, Utc};
use oda_client::OdaClient;
use oda_client::model::Aktoer;
use oda_client::sync::UpdatedSince;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("ODA_BASE_URL").ok();
    let since = match std::env::var("ODA_SINCE") {
        Ok(raw) => DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc),
        Err(_) => Utc::now() - Duration::days(7),
    };

    let client = match base_url {
        Some(url) => OdaClient::new(url)?,
        None => OdaClient::from_default_server()?,
    };

    let mut pager = UpdatedSince::<Aktoer>::for_entity(since);
    while let Some(rows) = pager.next_page(&client).await? {
        for actor in rows {
            println!(
                "{:>6}  {}",
                actor.id.unwrap_or_default(),
                actor.navn.unwrap_or_default()
            );
        }
    }
    println!("{} actors updated since {since}", pager.received());
    Ok(())
}
