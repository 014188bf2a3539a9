//! Engine service clients

#[cfg(test)]
pub(crate) mod fake;
mod http;

pub use http::HttpEngine;
