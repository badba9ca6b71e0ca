use crate::{
    api::{employee, ledger, transaction},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once at startup and shared by every worker.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let per_ms = (60_000 / u64::from(requests_per_min.max(1))).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min} requests per minute"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(web::resource("/me/ledger").route(web::get().to(ledger::my_ledger)))
            .service(web::resource("/users").route(web::post().to(handlers::register)))
            .service(
                web::scope("/employee")
                    // /employee
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // before /{id} so "stats" is not taken for an id
                    .service(web::resource("/stats").route(web::get().to(employee::employee_stats)))
                    // /employee/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    // /employee/{id}/transactions
                    .service(
                        web::resource("/{id}/transactions")
                            .route(web::post().to(transaction::create_transaction))
                            .route(web::get().to(transaction::list_transactions)),
                    )
                    .service(
                        web::resource("/{id}/transactions/preview")
                            .route(web::post().to(transaction::preview_transaction)),
                    ),
            )
            .service(
                web::scope("/ledger")
                    .service(web::resource("/balances").route(web::get().to(ledger::balances)))
                    .service(web::resource("/summary").route(web::get().to(ledger::summary))),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use actix_web::{App, http::StatusCode, web::Data};

    #[test]
    fn limiters_build_from_defaults() {
        assert!(RateLimiters::from_config(&test_config()).is_ok());
    }

    #[test]
    fn high_rates_still_build() {
        assert!(build_limiter(120_000).is_ok());
    }

    #[actix_web::test]
    async fn protected_scope_requires_a_token() {
        let config = test_config();
        let limiters = RateLimiters::from_config(&config).unwrap();

        let app = actix_web::test::init_service(
            App::new()
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &config, &limiters)),
        )
        .await;

        for uri in ["/api/ledger/balances", "/api/employee/stats", "/api/me/ledger"] {
            let req = actix_web::test::TestRequest::get()
                .uri(uri)
                .peer_addr("127.0.0.1:9000".parse().unwrap())
                .to_request();
            let resp = actix_web::test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }
}
