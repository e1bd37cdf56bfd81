// rootstrap-net/src/lib.rs
pub mod http;
pub mod index;

pub use http::{build_http_client, fetch_file, fetch_text, FetchOutcome};
pub use index::{fetch_index, parse_listing};
