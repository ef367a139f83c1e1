//! Concurrent in-memory stores for placements, campaigns, daily stats,
//! and advertiser activity. Backed by DashMap for development; swap to
//! PostgreSQL for production.

pub mod campaigns;
pub mod owners;
pub mod placements;
pub mod stats;

pub use campaigns::CampaignStore;
pub use owners::OwnerDirectory;
pub use placements::PlacementRegistry;
pub use stats::StatsStore;
