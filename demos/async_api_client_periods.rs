//! Call a raw path with query parameters using the async `ApiClient`.
//!
//! Run:
//! `cargo run --example async_api_client_periods`
//!
//! Optional env vars:
//! - `ODA_BASE_URL` (defaults to the metadata service root)
//! - `ODA_PERIOD_LIMIT` (defaults to `5`)

use oda_client::{ApiClient, oda_default_server_url};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url =
        std::env::var("ODA_BASE_URL").unwrap_or_else(|_| oda_default_server_url().to_owned());
    let limit = std::env::var("ODA_PERIOD_LIMIT").unwrap_or_else(|_| "5".to_owned());

    let client = ApiClient::new(base_url)?;
    let periods = client
        .get_json_with_query(
            "/Periode",
            &[("$top", limit.as_str()), ("$orderby", "startdato desc")],
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&periods)?);
    Ok(())
}
