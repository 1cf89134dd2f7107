use crate::domain::value_objects::enums::credential_providers::CredentialProvider;

const OPENAI_KEY_PREFIX: &str = "sk-";
const OPENAI_PLACEHOLDERS: [&str; 4] = ["sk-placeholder", "sk-your-api-key", "sk-xxx", "sk-..."];

/// The key a generation run is billed against, decided once when the credential is resolved.
#[derive(Clone, PartialEq, Eq)]
pub enum GenerationCredential {
    /// User-supplied key. Generations are not metered.
    Owned(String),
    /// Platform key. Generations draw on the free allowance or a payment.
    Managed,
}

impl GenerationCredential {
    pub fn classify(provider: CredentialProvider, token: Option<String>) -> Self {
        match token {
            Some(token) if is_owned_token(provider, &token) => Self::Owned(token.trim().to_string()),
            _ => Self::Managed,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// The key to send upstream, falling back to the platform key for managed runs.
    pub fn api_key<'a>(&'a self, platform_key: &'a str) -> &'a str {
        match self {
            Self::Owned(token) => token,
            Self::Managed => platform_key,
        }
    }
}

impl std::fmt::Debug for GenerationCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owned(_) => f.write_str("Owned(***)"),
            Self::Managed => f.write_str("Managed"),
        }
    }
}

fn is_owned_token(provider: CredentialProvider, token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() {
        return false;
    }

    match provider {
        CredentialProvider::OpenAi => {
            token.starts_with(OPENAI_KEY_PREFIX)
                && !OPENAI_PLACEHOLDERS
                    .iter()
                    .any(|placeholder| token.eq_ignore_ascii_case(placeholder))
        }
        CredentialProvider::Webflow => true,
    }
}
