//! List generated operations and the entity set dependency order.
//!
//! Run:
//! `cargo run --example blocking_list_operations`

use oda_client::{BlockingOdaClient, catalog, oda_default_server_url};

fn main() {
    println!("Default server: {}", oda_default_server_url());

    let operations = BlockingOdaClient::operations();
    println!("Loaded {} operations", operations.len());
    println!("First 20 operations:");

    for operation in operations.iter().take(20) {
        println!(
            "- {:<6} {:<40} ({})",
            operation.method, operation.path_template, operation.operation_id
        );
    }

    println!("Entity sets, referenced sets first:");
    for name in catalog::dependency_order() {
        println!("- {name}");
    }
}
