use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

#[async_trait]
#[automock]
pub trait ContentGenerator {
    async fn generate_text(&self, api_key: &str, prompt: String, context: String)
    -> Result<String>;

    /// Raw image bytes.
    async fn generate_image(&self, api_key: &str, prompt: String) -> Result<Vec<u8>>;
}
