use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialProvider {
    Webflow,
    #[serde(rename = "openai")]
    OpenAi,
}

impl CredentialProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialProvider::Webflow => "webflow",
            CredentialProvider::OpenAi => "openai",
        }
    }
}

impl Display for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
