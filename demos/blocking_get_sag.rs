//! Read one case and its actors by operation id using `BlockingOdaClient`.
//!
//! Run:
//! `cargo run --example blocking_get_sag`
//!
//! Optional env vars:
//! - `ODA_BASE_URL` (defaults to the metadata service root)
//! - `ODA_SAG_ID` (defaults to `1`)

use oda_client::BlockingOdaClient;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("ODA_BASE_URL").ok();
    let id = std::env::var("ODA_SAG_ID").unwrap_or_else(|_| "1".to_owned());

    let client = match base_url {
        Some(url) => BlockingOdaClient::new(url)?,
        None => BlockingOdaClient::from_default_server()?,
    };

    let sag = client.call_operation(
        "sagGetById",
        &[("id", id.as_str())],
        &[("$expand", "SagAktør/Aktør")],
        None,
    )?;

    println!("{}", serde_json::to_string_pretty(&sag)?);
    Ok(())
}
