use async_trait::async_trait;
use reqwest::{Request, Response};

/// Minimal HTTP seam so auth can be layered on as decorators.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
