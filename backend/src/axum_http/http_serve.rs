use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use regenflow_core::{
    infra::{
        ai::openai::OpenAiClient, db::postgres::postgres_connection::PgPoolSquad,
        storages::webflow::WebflowClient,
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

fn api_routes(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Router {
    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        config.stripe.success_url.clone(),
        config.stripe.cancel_url.clone(),
        config.stripe.currency.clone(),
    ));
    let webflow_client = Arc::new(WebflowClient::new(config.webflow.api_base.clone()));
    let openai_client = Arc::new(OpenAiClient::new(
        config.open_ai.base_url.clone(),
        config.open_ai.text_model.clone(),
        config.open_ai.image_model.clone(),
    ));

    let request_timeout = Duration::from_secs(config.backend_server.timeout);

    // Generation runs hold the request open for the whole batch and are not bounded
    // by the request timeout.
    Router::new()
        .nest(
            "/billing",
            routers::billing::routes(
                Arc::clone(&db_pool),
                Arc::clone(&stripe_client),
                config.billing.clone(),
            ),
        )
        .nest(
            "/webhooks",
            routers::stripe_webhook::routes(Arc::clone(&db_pool), stripe_client),
        )
        .merge(routers::publications::routes(
            Arc::clone(&db_pool),
            Arc::clone(&webflow_client),
        ))
        .route("/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(request_timeout))
        .nest(
            "/generations",
            routers::generations::routes(
                db_pool,
                webflow_client,
                openai_client,
                config.open_ai.api_key.clone(),
                config.billing.free_generation_limit,
            ),
        )
}

pub fn build_router(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    let app = Router::new()
        .nest("/api/v1", api_routes(config, db_pool))
        .fallback(default_routers::not_found)
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = build_router(&config, db_pool)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = ?err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = ?err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_model::{
        BackendServer, Billing, Database, OpenAi, Stripe, Supabase, Webflow,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use diesel::{
        PgConnection,
        r2d2::{ConnectionManager, Pool},
    };
    use tower::ServiceExt;

    fn test_config() -> DotEnvyConfig {
        DotEnvyConfig {
            backend_server: BackendServer {
                port: 0,
                body_limit: 10,
                timeout: 30,
            },
            database: Database {
                url: "postgres://localhost/regenflow_test".to_string(),
                pool_size: 1,
            },
            supabase: Supabase {
                jwt_secret: "secret".to_string(),
            },
            stripe: Stripe {
                secret_key: "sk_test_123".to_string(),
                webhook_secret: "whsec_123".to_string(),
                success_url: "https://example.com/success".to_string(),
                cancel_url: "https://example.com/cancel".to_string(),
                currency: "usd".to_string(),
            },
            billing: Billing {
                unit_price_cents: 10,
                free_generation_limit: 10,
            },
            open_ai: OpenAi {
                api_key: "sk-platform".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                text_model: "gpt-4o-mini".to_string(),
                image_model: "gpt-image-1".to_string(),
            },
            webflow: Webflow {
                api_base: "https://api.webflow.com/v2".to_string(),
            },
        }
    }

    /// Never connects: requests in these tests are answered before any repository call.
    fn router() -> Router {
        let config = test_config();
        let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
        let pool = Pool::builder().max_size(1).build_unchecked(manager);
        build_router(&config, Arc::new(pool)).unwrap()
    }

    #[tokio::test]
    async fn health_check_is_public() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health-check")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_routes_fall_back_to_not_found() {
        let response = router()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/webhooks/stripe")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/webhooks/stripe")
                    .header("stripe-signature", "t=1,v1=deadbeef")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn publish_requires_a_bearer_token() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/publications")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
