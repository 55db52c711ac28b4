//! List recent bills with their case type using the typed async `OdaClient`.
//!
//! Run:
//! `cargo run --example async_list_sager`
//!
//! Optional env vars:
//! - `ODA_BASE_URL` (defaults to the metadata service root)
//! - `ODA_SAG_LIMIT` (defaults to `5`)

use oda_client::model::Sag;
use oda_client::{OdaClient, QueryOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("ODA_BASE_URL").ok();
    let limit: u32 = std::env::var("ODA_SAG_LIMIT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(5);

    let client = match base_url {
        Some(url) => OdaClient::new(url)?,
        None => OdaClient::from_default_server()?,
    };

    let query = QueryOptions::new()
        .filter("typeid eq 3")
        .order_by("opdateringsdato desc")
        .expand("Sagstype")
        .count(true)
        .top(limit);
    let page = client.list::<Sag>(&query).await?;

    if let Some(count) = page.count {
        println!("{count} bills in total");
    }
    for sag in page.value {
        let kind = sag
            .sagstype
            .as_deref()
            .and_then(|sagstype| sagstype.r#type.as_deref())
            .unwrap_or("?");
        println!(
            "{:>6}  {:<12} {}  {}",
            sag.id.unwrap_or_default(),
            kind,
            sag.opdateringsdato
                .map(|date| date.to_rfc3339())
                .unwrap_or_default(),
            sag.titelkort.unwrap_or_default()
        );
    }
    Ok(())
}
