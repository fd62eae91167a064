use std::sync::Arc;

use axum::http::HeaderMap;

use crate::application::bridge::BridgeService;
use crate::application::catalog::UnitCatalogService;
use crate::application::fallback::FallbackStore;
use crate::application::history::HistoryService;
use crate::application::lifecycle::UnitLifecycleService;
use crate::application::repos::{HistoryRepo, UnitsRepo, UnitsWriteRepo};
use crate::application::resolver::UnitResolver;
use crate::infra::http::HealthProbe;

/// Header naming who performed a write; recorded as `changedBy`.
pub const ACTOR_HEADER: &str = "x-actor";

#[derive(Clone)]
pub struct ApiState {
    pub resolver: Arc<UnitResolver>,
    pub lifecycle: Arc<UnitLifecycleService>,
    pub history: Arc<HistoryService>,
    pub bridge: Arc<BridgeService>,
    pub catalog: Arc<UnitCatalogService>,
    pub fallback: Arc<dyn FallbackStore>,
    pub health: Arc<dyn HealthProbe>,
}

impl ApiState {
    /// Wire every service over the same repositories and fallback store.
    pub fn new(
        units: Arc<dyn UnitsRepo>,
        writer: Arc<dyn UnitsWriteRepo>,
        history: Arc<dyn HistoryRepo>,
        fallback: Arc<dyn FallbackStore>,
        health: Arc<dyn HealthProbe>,
    ) -> Self {
        let resolver = UnitResolver::new(units.clone(), fallback.clone());
        Self {
            lifecycle: Arc::new(UnitLifecycleService::new(
                units.clone(),
                writer,
                history.clone(),
                fallback.clone(),
            )),
            history: Arc::new(HistoryService::new(units.clone(), history)),
            bridge: Arc::new(BridgeService::new(resolver.clone())),
            catalog: Arc::new(UnitCatalogService::new(units)),
            resolver: Arc::new(resolver),
            fallback,
            health,
        }
    }

    pub fn actor(headers: &HeaderMap) -> Option<String> {
        headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|actor| !actor.is_empty())
            .map(str::to_string)
    }
}
