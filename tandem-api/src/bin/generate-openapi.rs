//! OpenAPI Specification Generator Binary
//!
//! Prints the TANDEM OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p tandem-api --bin generate-openapi > openapi.json

use tandem_api::ApiDoc;
use utoipa::OpenApi;

fn main() {
    let spec = ApiDoc::openapi();

    match serde_json::to_string_pretty(&spec) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
