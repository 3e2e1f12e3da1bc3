use settlement_core_store::Store;

#[derive(Clone)]
pub struct ApiConfig {
    /// Shared secret a caller must present (via `x-system-secret`) to act
    /// as `Actor::System` — drives admin/worker-triggered transitions like
    /// the expiry sweep through the same HTTP surface as everything else.
    pub system_secret: String,
    pub default_order_ttl: chrono::Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: ApiConfig,
}
