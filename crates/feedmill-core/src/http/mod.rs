mod client;
mod response;

pub use client::{FetchRequest, Fetcher};
pub use response::FetchResponse;
