//! Placement registry — static/slow-changing slot definitions, keyed by slug.

use adboard_core::types::{InventoryType, Placement};
use dashmap::DashMap;
use tracing::info;

/// Registry of placements. Placements are never deleted; disabled slots are
/// soft-removed via `is_active`.
pub struct PlacementRegistry {
    placements: DashMap<String, Placement>,
}

impl PlacementRegistry {
    pub fn new() -> Self {
        Self {
            placements: DashMap::new(),
        }
    }

    /// Register or replace a placement definition.
    pub fn upsert(&self, placement: Placement) {
        info!(slug = %placement.slug, "Placement registered");
        self.placements.insert(placement.slug.clone(), placement);
    }

    /// Register a placement from its parts.
    pub fn register(
        &self,
        slug: &str,
        page: &str,
        position: &str,
        inventory_type: InventoryType,
        max_slots: usize,
        base_rate_cents: i64,
    ) -> Placement {
        let placement = Placement {
            slug: slug.to_string(),
            page: page.to_string(),
            position: position.to_string(),
            inventory_type,
            max_slots,
            base_rate_cents,
            is_active: true,
        };
        self.upsert(placement.clone());
        placement
    }

    pub fn get(&self, slug: &str) -> Option<Placement> {
        self.placements.get(slug).map(|p| p.clone())
    }

    pub fn list(&self) -> Vec<Placement> {
        let mut all: Vec<Placement> = self.placements.iter().map(|p| p.clone()).collect();
        all.sort_by(|a, b| a.slug.cmp(&b.slug));
        all
    }

    /// Enable or disable a placement. Returns `false` if the slug is unknown.
    pub fn set_active(&self, slug: &str, active: bool) -> bool {
        match self.placements.get_mut(slug) {
            Some(mut placement) => {
                placement.is_active = active;
                true
            }
            None => false,
        }
    }
}

impl Default for PlacementRegistry {
    fn default() -> Self {
        Self::new()
    }
}
