#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub stripe: Stripe,
    pub billing: Billing,
    pub open_ai: OpenAi,
    pub webflow: Webflow,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Billing {
    pub unit_price_cents: i64,
    pub free_generation_limit: i32,
}

#[derive(Debug, Clone)]
pub struct OpenAi {
    /// Platform key used for managed generations.
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
}

#[derive(Debug, Clone)]
pub struct Webflow {
    pub api_base: String,
}
