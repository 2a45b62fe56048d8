//! actix-web wiring: shared state, the data-plane resource and the admin
//! surface.

pub mod admin;
pub mod gateway;
pub mod health;

use crate::config::loader;
use crate::config::validation::ConfigValidator;
use crate::middleware::pipeline::Pipeline;
use crate::middleware::priority::PriorityAdmitter;
use crate::models::settings::Settings;
use crate::router::RouteTable;
use crate::services::metrics::MetricsCollector;
use crate::services::proxy::ProxyClient;
use crate::services::registry::PerRouteRegistry;
use crate::translator::grpc::GrpcTranslator;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Result of the most recent reload attempt, shown by `/reload/status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReloadStatus {
    /// Monotonically increasing configuration version.
    pub version: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Process-wide shared state. Reload swaps the routing table, the route
/// registry and the settings handle atomically; listeners and the priority
/// admitter are fixed at boot.
pub struct AppState {
    pub settings: ArcSwap<Settings>,
    pub table: ArcSwap<RouteTable>,
    pub registry: PerRouteRegistry,
    pub metrics: MetricsCollector,
    pub pipeline: Pipeline,
    pub grpc: Arc<GrpcTranslator>,
    pub config_path: String,
    reload_status: Mutex<ReloadStatus>,
}

impl AppState {
    /// Builds the full runtime from validated settings.
    pub fn new(settings: Settings, config_path: String) -> Result<Arc<Self>, String> {
        settings.validate()?;
        let metrics = MetricsCollector::default();
        let grpc = GrpcTranslator::new();
        let registry = PerRouteRegistry::new();
        registry.install(&settings.routes, &metrics, &grpc)?;
        let admitter = settings.priority.clone().map(PriorityAdmitter::new);
        let pipeline = Pipeline {
            proxy: ProxyClient::new().map_err(|e| e.to_string())?,
            admitter,
            metrics: metrics.clone(),
        };
        Ok(Arc::new(Self {
            table: ArcSwap::from_pointee(RouteTable::new(&settings.routes)),
            settings: ArcSwap::from_pointee(settings),
            registry,
            metrics,
            pipeline,
            grpc,
            config_path,
            reload_status: Mutex::new(ReloadStatus {
                version: 1,
                last_success: Some(Utc::now()),
                last_error: None,
            }),
        }))
    }

    /// Re-parses the config file and swaps routes atomically. Failure
    /// leaves the running configuration untouched.
    pub fn reload_from_disk(&self) -> Result<u64, String> {
        let result = self.try_reload();
        let mut status = self.reload_status.lock().expect("reload status lock");
        match &result {
            Ok(version) => {
                status.version = *version;
                status.last_success = Some(Utc::now());
                status.last_error = None;
            }
            Err(error) => {
                status.last_error = Some(error.clone());
            }
        }
        result
    }

    fn try_reload(&self) -> Result<u64, String> {
        let settings = loader::load_settings_from(&self.config_path)?;
        let report = ConfigValidator::validate_comprehensive(&settings);
        if !report.is_valid {
            return Err(report.errors.join("; "));
        }
        for warning in &report.warnings {
            log::warn!("config warning: {}", warning);
        }
        // Build everything before swapping anything.
        self.registry
            .install(&settings.routes, &self.metrics, &self.grpc)?;
        self.table.store(Arc::new(RouteTable::new(&settings.routes)));
        self.settings.store(Arc::new(settings));
        let version = self.reload_status.lock().expect("reload status lock").version + 1;
        log::info!("configuration reloaded, version {}", version);
        Ok(version)
    }

    pub fn reload_status(&self) -> ReloadStatus {
        self.reload_status.lock().expect("reload status lock").clone()
    }
}
