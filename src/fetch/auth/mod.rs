//! Credential decorators for [`HttpClient`](super::HttpClient).
//!
//! NOAA CDO expects its token in a `token` header; EIA expects an
//! `api_key` query parameter.

mod api_key;
mod url_param;

pub use api_key::ApiKey;
pub use url_param::UrlParam;
