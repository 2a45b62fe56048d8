//! Admin surface: read-only JSON snapshots plus the reload endpoint.
//!
//! Served on its own port, never on the data plane. Every endpoint renders
//! live counters from the per-route registry.

use crate::routes::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn configure_admin(cfg: &mut web::ServiceConfig, state: Arc<AppState>) {
    cfg.app_data(web::Data::new(state))
        .route("/rate-limits", web::get().to(rate_limits))
        .route("/quotas", web::get().to(quotas))
        .route("/load-balancers", web::get().to(load_balancers))
        .route("/circuit-breakers", web::get().to(circuit_breakers))
        .route("/protocol-translators", web::get().to(protocol_translators))
        .route("/metrics", web::get().to(metrics))
        .route("/reload", web::post().to(reload))
        .route("/reload/status", web::get().to(reload_status));
}

async fn rate_limits(state: web::Data<Arc<AppState>>) -> impl Responder {
    let mut out = BTreeMap::new();
    for components in state.registry.all() {
        if let Some(limiter) = &components.rate_limiter {
            out.insert(components.route.id.clone(), limiter.stats());
        }
    }
    HttpResponse::Ok().json(out)
}

async fn quotas(state: web::Data<Arc<AppState>>) -> impl Responder {
    let mut out = BTreeMap::new();
    for components in state.registry.all() {
        if let Some(quota) = &components.quota {
            out.insert(components.route.id.clone(), quota.stats());
        }
    }
    HttpResponse::Ok().json(out)
}

async fn load_balancers(state: web::Data<Arc<AppState>>) -> impl Responder {
    let mut out = BTreeMap::new();
    for components in state.registry.all() {
        let backends: Vec<_> = components.backends.iter().map(|b| b.snapshot()).collect();
        out.insert(
            components.route.id.clone(),
            json!({
                "strategy": components.route.load_balancer,
                "backends": backends,
                "counters": components.counters.snapshot(),
                "retries": components.retry_metrics.snapshot(),
            }),
        );
    }
    HttpResponse::Ok().json(out)
}

async fn circuit_breakers(state: web::Data<Arc<AppState>>) -> impl Responder {
    let mut out = BTreeMap::new();
    for components in state.registry.all() {
        if let Some(breakers) = &components.breakers {
            let snapshots: BTreeMap<String, _> = breakers.snapshots().into_iter().collect();
            out.insert(components.route.id.clone(), snapshots);
        }
    }
    HttpResponse::Ok().json(out)
}

async fn protocol_translators(state: web::Data<Arc<AppState>>) -> impl Responder {
    let mut out = BTreeMap::new();
    out.insert("http_to_grpc", state.grpc.snapshot());
    HttpResponse::Ok().json(out)
}

async fn metrics(state: web::Data<Arc<AppState>>) -> impl Responder {
    HttpResponse::Ok().json(state.metrics.snapshot())
}

async fn reload(state: web::Data<Arc<AppState>>) -> impl Responder {
    match state.reload_from_disk() {
        Ok(version) => HttpResponse::Ok().json(json!({
            "success": true,
            "version": version,
        })),
        Err(error) => HttpResponse::Ok().json(json!({
            "success": false,
            "error": error,
        })),
    }
}

async fn reload_status(state: web::Data<Arc<AppState>>) -> impl Responder {
    HttpResponse::Ok().json(state.reload_status())
}
