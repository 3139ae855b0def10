use std::time::Instant;
use tracing::info;

use crate::claims::ClaimStore;
use crate::config::EngineConfig;
use crate::hull::HullBuilder;
use crate::output::{BeaconHull, PartitionedRegion};
use crate::partition::RadicalAxisPartitioner;
use crate::query::{PointQueryService, QueryConfig};

/// Everything the renderer needs for one claim snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerritorySnapshot {
    pub regions: Vec<PartitionedRegion>,
    pub hulls: Vec<BeaconHull>,
}

/// Stateless entry point. Holds only configuration, so one engine can serve concurrent
/// callers as long as each brings its own claim snapshot.
#[derive(Clone, Debug, Default)]
pub struct TerritoryEngine {
    config: EngineConfig,
}

impl TerritoryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn partition(&self, store: &ClaimStore) -> Vec<PartitionedRegion> {
        RadicalAxisPartitioner::new(&self.config).partition(store)
    }

    pub fn hulls(&self, store: &ClaimStore) -> Vec<BeaconHull> {
        HullBuilder::new(&self.config).build(store)
    }

    pub fn snapshot(&self, store: &ClaimStore) -> TerritorySnapshot {
        let start = Instant::now();
        let (regions, hulls) = rayon::join(|| self.partition(store), || self.hulls(store));
        info!(
            regions = regions.len(),
            hulls = hulls.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "computed territory snapshot"
        );
        TerritorySnapshot { regions, hulls }
    }

    pub fn query_service<'a>(
        &self,
        store: &'a ClaimStore,
        hulls: &'a [BeaconHull],
        config: QueryConfig,
    ) -> PointQueryService<'a> {
        PointQueryService::new(store, hulls, config)
    }
}
