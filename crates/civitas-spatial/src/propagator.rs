//! Breadth-first route enumeration over the road network.
//!
//! A [`Propagator`] is seeded from a building's access roads (or a single
//! tile), floods the roads up to a distance limit, and records the first
//! route found to every building touching a reached road tile. Because the
//! flood is breadth-first, that first route is a shortest one. Neighbor
//! order is fixed, so equal-length ties resolve the same way every run.

use crate::{Direction, Pathway, TilePos, Tilemap};
use civitas_core::id::BuildingId;
use civitas_core::registry::BuildingKind;
use std::collections::{BTreeMap, VecDeque};

/// A road route from the propagation source to a building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRoute {
    pub building: BuildingId,
    pub kind: BuildingKind,
    pub path: Pathway,
}

impl DirectRoute {
    pub fn length(&self) -> u32 {
        self.path.length()
    }
}

pub struct Propagator<'a> {
    map: &'a Tilemap,
    all_directions: bool,
    excluded: Option<BuildingId>,
    seeds: Vec<TilePos>,
    routes: Vec<DirectRoute>,
}

impl<'a> Propagator<'a> {
    pub fn new(map: &'a Tilemap) -> Self {
        Self {
            map,
            all_directions: false,
            excluded: None,
            seeds: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Allow diagonal steps between road tiles.
    pub fn set_all_directions(&mut self, enabled: bool) {
        self.all_directions = enabled;
    }

    /// Seed from the access roads of `building`, which is itself never a
    /// destination.
    pub fn init(&mut self, building: BuildingId) {
        self.seeds = self.map.access_roads(building);
        self.excluded = Some(building);
        self.routes.clear();
    }

    /// Seed from a single tile. Keeps any building exclusion already set.
    pub fn init_tile(&mut self, pos: TilePos) {
        self.seeds = vec![pos];
        self.routes.clear();
    }

    /// Never report routes to `building`.
    pub fn exclude(&mut self, building: Option<BuildingId>) {
        self.excluded = building;
    }

    /// Flood the road network up to `max_distance` steps from the seeds.
    /// Returns the number of routes found.
    pub fn propagate(&mut self, max_distance: u32) -> usize {
        self.routes.clear();
        let directions: &[Direction] = if self.all_directions {
            &Direction::ALL
        } else {
            &Direction::ORTHOGONAL
        };

        let mut parents: BTreeMap<TilePos, Option<TilePos>> = BTreeMap::new();
        let mut queue = VecDeque::new();
        for &seed in &self.seeds {
            if self.map.in_bounds(seed) && !parents.contains_key(&seed) {
                parents.insert(seed, None);
                queue.push_back((seed, 0u32));
            }
        }

        while let Some((tile, dist)) = queue.pop_front() {
            for building in self.map.buildings_adjacent_to(tile) {
                if Some(building) == self.excluded
                    || self.routes.iter().any(|r| r.building == building)
                {
                    continue;
                }
                let Some(placement) = self.map.placement(building) else {
                    continue;
                };
                self.routes.push(DirectRoute {
                    building,
                    kind: placement.kind,
                    path: Pathway::new(trace(&parents, tile)),
                });
            }

            if dist >= max_distance {
                continue;
            }
            for &dir in directions {
                let next = tile.step(dir);
                if self.map.is_road(next) && !parents.contains_key(&next) {
                    parents.insert(next, Some(tile));
                    queue.push_back((next, dist + 1));
                }
            }
        }
        self.routes.len()
    }

    /// Routes to buildings of `kind`, in discovery order.
    pub fn routes(&self, kind: BuildingKind) -> Vec<DirectRoute> {
        self.routes.iter().filter(|r| r.kind == kind).cloned().collect()
    }

    pub fn all_routes(&self) -> &[DirectRoute] {
        &self.routes
    }

    /// Route to one specific building, if it was reached.
    pub fn route_to(&self, building: BuildingId) -> Option<&DirectRoute> {
        self.routes.iter().find(|r| r.building == building)
    }
}

fn trace(parents: &BTreeMap<TilePos, Option<TilePos>>, end: TilePos) -> Vec<TilePos> {
    let mut tiles = vec![end];
    let mut cur = end;
    while let Some(Some(prev)) = parents.get(&cur) {
        tiles.push(*prev);
        cur = *prev;
    }
    tiles.reverse();
    tiles
}
