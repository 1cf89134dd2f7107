use anyhow::{Context, Result};
use std::str::FromStr;

use super::config_model::{
    BackendServer, Billing, Database, DotEnvyConfig, OpenAi, Stripe, Supabase, Webflow,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required_parse("SERVER_PORT_BACKEND")?,
        body_limit: required_parse("SERVER_BODY_LIMIT")?,
        timeout: required_parse("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        pool_size: optional_parse("DATABASE_POOL_SIZE", 10)?,
    };

    let supabase = get_supabase_secret()?;

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        success_url: required("STRIPE_SUCCESS_URL")?,
        cancel_url: required("STRIPE_CANCEL_URL")?,
        currency: optional("STRIPE_CURRENCY", "usd"),
    };

    let billing = Billing {
        unit_price_cents: optional_parse("BILLING_UNIT_PRICE_CENTS", 10)?,
        free_generation_limit: optional_parse("FREE_GENERATION_LIMIT", 10)?,
    };

    let open_ai = OpenAi {
        api_key: required("OPENAI_API_KEY")?,
        base_url: optional("OPENAI_BASE_URL", "https://api.openai.com/v1"),
        text_model: optional("OPENAI_TEXT_MODEL", "gpt-4o-mini"),
        image_model: optional("OPENAI_IMAGE_MODEL", "gpt-image-1"),
    };

    let webflow = Webflow {
        api_base: optional("WEBFLOW_API_BASE", "https://api.webflow.com/v2"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        stripe,
        billing,
        open_ai,
        webflow,
    })
}

/// Only what the auth extractor needs, so token validation does not depend on the
/// rest of the environment.
pub fn get_supabase_secret() -> Result<Supabase> {
    dotenvy::dotenv().ok();

    Ok(Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
    })
}

fn required(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{key} is invalid"))
}

fn required_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(key)?
        .trim()
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn optional_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key).ok().filter(|value| !value.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}
