// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::op_ref
)]

//! Territory partitioning and spatial queries over overlapping ownership claims.
//!
//! Claims are circles (or fixed polygons) on a locally-flat earth. The engine splits them
//! into exclusive regions with a power diagram, joins beacon clusters into hulls, and
//! answers point-containment queries with conflict detection.

#[macro_use]
extern crate serde;

pub mod claims;
pub mod config;
pub mod engine;
pub mod error;
pub mod hull;
pub mod output;
pub mod partition;
pub mod projection;
pub mod query;


pub use claims::{Claim, ClaimId, ClaimShape, ClaimStore, FactionKind, OwnerId, TerritoryClaim};
pub use config::{CoincidentPolicy, EngineConfig};
pub use engine::{TerritoryEngine, TerritorySnapshot};
pub use error::{ClaimRejection, ConfigError, EngineError};
pub use hull::{HullBuilder, HullKind};
pub use output::{BeaconHull, PartitionedRegion, Ring};
pub use partition::{RadicalAxis, RadicalAxisPartitioner};
pub use projection::{GeoProjection, LatLng};
pub use query::{
    Match, MatchKind, MatchTarget, PointQueryService, QueryConfig, QueryResult, ViewRange,
};
