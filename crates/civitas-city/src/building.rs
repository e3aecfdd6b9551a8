//! A placed building: shared placement and staffing data plus whichever
//! economic capabilities its template grants.
//!
//! Storage-facing queries (`max_store`, `max_retrieve`, `store_mut`)
//! dispatch to the capability that owns the goods, so walkers can treat a
//! factory, a granary and a warehouse alike.

use civitas_core::good::Good;
use civitas_core::id::WalkerId;
use civitas_core::market::MarketRole;
use civitas_core::production::{ProductionUnit, StallReason};
use civitas_core::registry::{BuildingKind, BuildingTemplate, RoleSpec};
use civitas_core::storage::StorageRole;
use civitas_core::store::GoodStore;
use civitas_core::workforce::Workforce;
use civitas_spatial::TilePos;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    kind: BuildingKind,
    origin: TilePos,
    size: u32,
    workforce: Workforce,
    production: Option<ProductionUnit>,
    storage: Option<StorageRole>,
    market: Option<MarketRole>,
    /// Walkers this building sent out that are still alive.
    walkers: Vec<WalkerId>,
    /// Last reported stall reason, to emit stall events only on change.
    trouble: Option<StallReason>,
    removed: bool,
}

impl Building {
    /// A fully staffed building built from `template`.
    pub fn from_template(template: &BuildingTemplate, origin: TilePos) -> Self {
        let mut building = Self {
            kind: template.kind,
            origin,
            size: template.size,
            workforce: Workforce::full(template.max_workers),
            production: None,
            storage: None,
            market: None,
            walkers: Vec::new(),
            trouble: None,
            removed: false,
        };
        match &template.role {
            RoleSpec::Production(spec) => building.production = Some(ProductionUnit::new(spec)),
            RoleSpec::Storage(kind) => building.storage = Some(StorageRole::new(*kind)),
            RoleSpec::Market => building.market = Some(MarketRole::new()),
        }
        building
    }

    pub fn kind(&self) -> BuildingKind {
        self.kind
    }

    pub fn origin(&self) -> TilePos {
        self.origin
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn workforce(&self) -> Workforce {
        self.workforce
    }

    pub fn set_workers(&mut self, present: u32) {
        self.workforce.set_present(present);
    }

    pub fn production(&self) -> Option<&ProductionUnit> {
        self.production.as_ref()
    }

    pub fn production_mut(&mut self) -> Option<&mut ProductionUnit> {
        self.production.as_mut()
    }

    pub fn storage(&self) -> Option<&StorageRole> {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> Option<&mut StorageRole> {
        self.storage.as_mut()
    }

    pub fn market(&self) -> Option<&MarketRole> {
        self.market.as_ref()
    }

    pub fn market_mut(&mut self) -> Option<&mut MarketRole> {
        self.market.as_mut()
    }

    pub fn walkers(&self) -> &[WalkerId] {
        &self.walkers
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    pub(crate) fn add_walker(&mut self, walker: WalkerId) {
        self.walkers.push(walker);
    }

    pub(crate) fn forget_walker(&mut self, walker: WalkerId) {
        self.walkers.retain(|&w| w != walker);
    }

    /// Record the current stall reason; returns it when it is new.
    pub(crate) fn update_trouble(&mut self, trouble: Option<StallReason>) -> Option<StallReason> {
        let changed = trouble != self.trouble;
        self.trouble = trouble;
        if changed { trouble } else { None }
    }

    // -- Capability dispatch --

    pub fn store(&self) -> Option<&GoodStore> {
        if let Some(p) = &self.production {
            return Some(p.store());
        }
        if let Some(s) = &self.storage {
            return Some(s.store());
        }
        self.market.as_ref().map(|m| m.store())
    }

    pub fn store_mut(&mut self) -> Option<&mut GoodStore> {
        if let Some(p) = &mut self.production {
            return Some(p.store_mut());
        }
        if let Some(s) = &mut self.storage {
            return Some(s.store_mut());
        }
        self.market.as_mut().map(|m| m.store_mut())
    }

    /// Room for a delivery of `good`. Markets are stocked by their own
    /// buyers and never accept carts.
    pub fn max_store(&self, good: Good) -> u32 {
        if self.removed {
            return 0;
        }
        if let Some(p) = &self.production {
            return p.max_store(good, self.workforce);
        }
        if let Some(s) = &self.storage {
            return s.max_store(good, self.workforce);
        }
        0
    }

    /// Goods of `good` available to walkers. Only storage hands goods out.
    pub fn max_retrieve(&self, good: Good) -> u32 {
        match &self.storage {
            Some(s) if !self.removed => s.max_retrieve(good),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_core::registry::Registry;
    use civitas_core::test_utils::fill;

    fn build(kind: BuildingKind) -> Building {
        let registry = Registry::standard();
        Building::from_template(registry.get(kind).unwrap(), TilePos::new(0, 0))
    }

    #[test]
    fn capabilities_follow_template() {
        assert!(build(BuildingKind::Pottery).production().is_some());
        assert!(build(BuildingKind::Granary).storage().is_some());
        assert!(build(BuildingKind::Market).market().is_some());
        assert!(build(BuildingKind::Warehouse).production().is_none());
    }

    #[test]
    fn max_store_dispatches_to_role() {
        let mut pottery = build(BuildingKind::Pottery);
        assert_eq!(pottery.max_store(Good::Clay), 200);
        assert_eq!(pottery.max_store(Good::Wheat), 0);
        pottery.set_workers(0);
        assert_eq!(pottery.max_store(Good::Clay), 0);

        let granary = build(BuildingKind::Granary);
        assert_eq!(granary.max_store(Good::Fish), 2400);
        assert_eq!(granary.max_store(Good::Iron), 0);

        assert_eq!(build(BuildingKind::Market).max_store(Good::Wheat), 0);
    }

    #[test]
    fn only_storage_hands_out_goods() {
        let mut warehouse = build(BuildingKind::Warehouse);
        fill(warehouse.store_mut().unwrap(), Good::Oil, 300);
        assert_eq!(warehouse.max_retrieve(Good::Oil), 300);

        let mut pottery = build(BuildingKind::Pottery);
        fill(pottery.store_mut().unwrap(), Good::Pottery, 100);
        assert_eq!(pottery.max_retrieve(Good::Pottery), 0);

        warehouse.mark_removed();
        assert_eq!(warehouse.max_retrieve(Good::Oil), 0);
    }

    #[test]
    fn trouble_reported_once() {
        let mut b = build(BuildingKind::Pottery);
        assert_eq!(
            b.update_trouble(Some(StallReason::MissingInput)),
            Some(StallReason::MissingInput)
        );
        assert_eq!(b.update_trouble(Some(StallReason::MissingInput)), None);
        assert_eq!(b.update_trouble(None), None);
    }
}
