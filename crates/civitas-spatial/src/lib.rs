//! Tile map, road network and route search.
//!
//! The [`Tilemap`] is a dense grid of terrain tiles with a placement index
//! mapping each tile to the building that covers it. Roads are terrain.
//! [`Propagator`] enumerates the buildings reachable over roads from a
//! source; [`find_path`] connects two tiles point-to-point.

use civitas_core::id::BuildingId;
use civitas_core::registry::{BuildingKind, NearbyTerrain};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

pub mod path;
pub mod pathway;
pub mod propagator;

pub use path::{WayType, find_path};
pub use pathway::Pathway;
pub use propagator::{DirectRoute, Propagator};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        self.offset(dx, dy)
    }
}

/// Compass directions. The first four are the orthogonal ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl Direction {
    pub const ORTHOGONAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
    ];

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
            Direction::NorthWest => (-1, -1),
        }
    }
}

/// Ground cover of a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    Grass,
    Road,
    Tree,
    Rock,
    Water,
}

impl Terrain {
    pub fn matches(self, nearby: NearbyTerrain) -> bool {
        matches!(
            (self, nearby),
            (Terrain::Tree, NearbyTerrain::Forest)
                | (Terrain::Rock, NearbyTerrain::Rock)
                | (Terrain::Water, NearbyTerrain::Water)
        )
    }
}

/// Where a building sits and what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub kind: BuildingKind,
    /// Top-left corner.
    pub origin: TilePos,
    /// Square edge length.
    pub size: u32,
}

impl Placement {
    pub fn tiles(&self) -> impl Iterator<Item = TilePos> + use<> {
        footprint(self.origin, self.size)
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        let s = self.size as i32;
        pos.x >= self.origin.x
            && pos.y >= self.origin.y
            && pos.x < self.origin.x + s
            && pos.y < self.origin.y + s
    }

    /// Tiles orthogonally adjacent to the footprint, clockwise from the
    /// top-left neighbor above the footprint.
    pub fn perimeter(&self) -> Vec<TilePos> {
        let s = self.size as i32;
        let TilePos { x, y } = self.origin;
        let mut out = Vec::with_capacity(4 * self.size as usize);
        out.extend((0..s).map(|dx| TilePos::new(x + dx, y - 1)));
        out.extend((0..s).map(|dy| TilePos::new(x + s, y + dy)));
        out.extend((0..s).rev().map(|dx| TilePos::new(x + dx, y + s)));
        out.extend((0..s).rev().map(|dy| TilePos::new(x - 1, y + dy)));
        out
    }
}

/// All tiles of a square footprint, row by row.
pub fn footprint(origin: TilePos, size: u32) -> impl Iterator<Item = TilePos> {
    let s = size as i32;
    (0..s).flat_map(move |dy| (0..s).map(move |dx| origin.offset(dx, dy)))
}

/// Errors from spatial operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpatialError {
    #[error("tile {0:?} is outside the map")]
    OutOfBounds(TilePos),
    #[error("tile {0:?} is occupied")]
    Occupied(TilePos),
    #[error("tile {0:?} is not buildable terrain")]
    Unbuildable(TilePos),
    #[error("building is not placed on the map")]
    NotPlaced,
    #[error("building is already placed on the map")]
    AlreadyPlaced,
}

// ---------------------------------------------------------------------------
// Tilemap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Tile {
    terrain: Terrain,
    building: Option<BuildingId>,
}

/// Dense grid of tiles plus the building placement index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tilemap {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    placements: SecondaryMap<BuildingId, Placement>,
}

impl Tilemap {
    /// A map of grass.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::default(); (width * height) as usize],
            placements: SecondaryMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    // -- Terrain --

    pub fn terrain(&self, pos: TilePos) -> Option<Terrain> {
        self.tile(pos).map(|t| t.terrain)
    }

    /// Change the ground cover of a free tile.
    pub fn set_terrain(&mut self, pos: TilePos, terrain: Terrain) -> Result<(), SpatialError> {
        let i = self.index(pos).ok_or(SpatialError::OutOfBounds(pos))?;
        if self.tiles[i].building.is_some() {
            return Err(SpatialError::Occupied(pos));
        }
        self.tiles[i].terrain = terrain;
        Ok(())
    }

    pub fn is_road(&self, pos: TilePos) -> bool {
        self.terrain(pos) == Some(Terrain::Road)
    }

    /// A tile a walker may cross off-road: no building, no obstacle.
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        self.tile(pos).is_some_and(|t| {
            t.building.is_none() && matches!(t.terrain, Terrain::Grass | Terrain::Road)
        })
    }

    /// Any tile in the one-tile ring around the footprint (corners
    /// included) has terrain matching `nearby`.
    pub fn has_terrain_near(&self, origin: TilePos, size: u32, nearby: NearbyTerrain) -> bool {
        footprint(origin.offset(-1, -1), size + 2)
            .filter_map(|p| self.terrain(p))
            .any(|t| t.matches(nearby))
    }

    // -- Placement --

    /// Check that every footprint tile is on the map, free, and grass.
    pub fn check_placement(&self, origin: TilePos, size: u32) -> Result<(), SpatialError> {
        for pos in footprint(origin, size) {
            let tile = self.tile(pos).ok_or(SpatialError::OutOfBounds(pos))?;
            if tile.building.is_some() {
                return Err(SpatialError::Occupied(pos));
            }
            if tile.terrain != Terrain::Grass {
                return Err(SpatialError::Unbuildable(pos));
            }
        }
        Ok(())
    }

    pub fn place(
        &mut self,
        building: BuildingId,
        kind: BuildingKind,
        origin: TilePos,
        size: u32,
    ) -> Result<(), SpatialError> {
        if self.placements.contains_key(building) {
            return Err(SpatialError::AlreadyPlaced);
        }
        self.check_placement(origin, size)?;
        for pos in footprint(origin, size) {
            if let Some(i) = self.index(pos) {
                self.tiles[i].building = Some(building);
            }
        }
        self.placements.insert(building, Placement { kind, origin, size });
        Ok(())
    }

    /// Clear a building's tiles. Returns its placement.
    pub fn remove(&mut self, building: BuildingId) -> Result<Placement, SpatialError> {
        let placement = self
            .placements
            .remove(building)
            .ok_or(SpatialError::NotPlaced)?;
        for pos in placement.tiles() {
            if let Some(i) = self.index(pos) {
                self.tiles[i].building = None;
            }
        }
        Ok(placement)
    }

    pub fn placement(&self, building: BuildingId) -> Option<&Placement> {
        self.placements.get(building)
    }

    pub fn building_at(&self, pos: TilePos) -> Option<BuildingId> {
        self.tile(pos).and_then(|t| t.building)
    }

    /// Road tiles orthogonally adjacent to the building, in perimeter order.
    pub fn access_roads(&self, building: BuildingId) -> Vec<TilePos> {
        self.placement(building)
            .map(|p| p.perimeter().into_iter().filter(|&t| self.is_road(t)).collect())
            .unwrap_or_default()
    }

    /// Distinct buildings orthogonally adjacent to `pos`.
    pub fn buildings_adjacent_to(&self, pos: TilePos) -> Vec<BuildingId> {
        let mut out = Vec::with_capacity(4);
        for dir in Direction::ORTHOGONAL {
            if let Some(b) = self.building_at(pos.step(dir))
                && !out.contains(&b)
            {
                out.push(b);
            }
        }
        out
    }

    /// Buildings of `kind` (or any kind) with at least one tile inside the
    /// inclusive rectangle, in row-major order of first contact.
    pub fn buildings_in_rect(
        &self,
        min: TilePos,
        max: TilePos,
        kind: Option<BuildingKind>,
    ) -> Vec<BuildingId> {
        let mut out = Vec::new();
        for y in min.y.max(0)..=max.y.min(self.height as i32 - 1) {
            for x in min.x.max(0)..=max.x.min(self.width as i32 - 1) {
                let Some(b) = self.building_at(TilePos::new(x, y)) else {
                    continue;
                };
                if out.contains(&b) {
                    continue;
                }
                let matches = kind.is_none_or(|k| self.placements.get(b).is_some_and(|p| p.kind == k));
                if matches {
                    out.push(b);
                }
            }
        }
        out
    }

    /// All placed buildings of `kind`.
    pub fn buildings_of_kind(&self, kind: BuildingKind) -> Vec<BuildingId> {
        self.placements
            .iter()
            .filter(|(_, p)| p.kind == kind)
            .map(|(b, _)| b)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<BuildingId> {
        let mut sm = SlotMap::<BuildingId, ()>::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    // -----------------------------------------------------------------------
    // Test 1: Place and remove
    // -----------------------------------------------------------------------
    #[test]
    fn place_and_remove() {
        let mut map = Tilemap::new(10, 10);
        let b = ids(1)[0];
        map.place(b, BuildingKind::Warehouse, TilePos::new(2, 2), 3).unwrap();
        assert_eq!(map.building_at(TilePos::new(4, 4)), Some(b));
        assert_eq!(map.building_at(TilePos::new(5, 4)), None);

        let placement = map.remove(b).unwrap();
        assert_eq!(placement.origin, TilePos::new(2, 2));
        assert_eq!(map.building_at(TilePos::new(4, 4)), None);
        assert_eq!(map.remove(b), Err(SpatialError::NotPlaced));
    }

    // -----------------------------------------------------------------------
    // Test 2: Placement errors
    // -----------------------------------------------------------------------
    #[test]
    fn placement_errors() {
        let mut map = Tilemap::new(6, 6);
        let [a, b] = ids(2).try_into().unwrap();
        map.place(a, BuildingKind::Market, TilePos::new(0, 0), 2).unwrap();

        assert_eq!(
            map.place(a, BuildingKind::Market, TilePos::new(3, 3), 2),
            Err(SpatialError::AlreadyPlaced)
        );
        assert_eq!(
            map.place(b, BuildingKind::Market, TilePos::new(1, 1), 2),
            Err(SpatialError::Occupied(TilePos::new(1, 1)))
        );
        assert_eq!(
            map.place(b, BuildingKind::Market, TilePos::new(5, 5), 2),
            Err(SpatialError::OutOfBounds(TilePos::new(6, 5)))
        );
        map.set_terrain(TilePos::new(4, 4), Terrain::Road).unwrap();
        assert_eq!(
            map.place(b, BuildingKind::Market, TilePos::new(3, 3), 2),
            Err(SpatialError::Unbuildable(TilePos::new(4, 4)))
        );
        assert_eq!(
            map.set_terrain(TilePos::new(0, 0), Terrain::Road),
            Err(SpatialError::Occupied(TilePos::new(0, 0)))
        );
    }

    // -----------------------------------------------------------------------
    // Test 3: Access roads follow the perimeter
    // -----------------------------------------------------------------------
    #[test]
    fn access_roads_are_orthogonal_neighbors() {
        let mut map = Tilemap::new(8, 8);
        let b = ids(1)[0];
        map.place(b, BuildingKind::Pottery, TilePos::new(3, 3), 2).unwrap();
        // Diagonal corner road does not count.
        map.set_terrain(TilePos::new(2, 2), Terrain::Road).unwrap();
        map.set_terrain(TilePos::new(5, 4), Terrain::Road).unwrap();
        map.set_terrain(TilePos::new(3, 2), Terrain::Road).unwrap();

        assert_eq!(
            map.access_roads(b),
            vec![TilePos::new(3, 2), TilePos::new(5, 4)]
        );
    }

    #[test]
    fn perimeter_of_single_tile() {
        let p = Placement {
            kind: BuildingKind::Market,
            origin: TilePos::new(1, 1),
            size: 1,
        };
        assert_eq!(
            p.perimeter(),
            vec![
                TilePos::new(1, 0),
                TilePos::new(2, 1),
                TilePos::new(1, 2),
                TilePos::new(0, 1)
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Test 4: Nearby terrain includes corners
    // -----------------------------------------------------------------------
    #[test]
    fn terrain_near_footprint() {
        let mut map = Tilemap::new(8, 8);
        map.set_terrain(TilePos::new(1, 1), Terrain::Tree).unwrap();
        assert!(map.has_terrain_near(TilePos::new(2, 2), 2, NearbyTerrain::Forest));
        assert!(!map.has_terrain_near(TilePos::new(3, 3), 2, NearbyTerrain::Forest));
        assert!(!map.has_terrain_near(TilePos::new(2, 2), 2, NearbyTerrain::Water));
    }

    // -----------------------------------------------------------------------
    // Test 5: Area queries
    // -----------------------------------------------------------------------
    #[test]
    fn buildings_in_rect_by_kind() {
        let mut map = Tilemap::new(12, 12);
        let [a, b, c] = ids(3).try_into().unwrap();
        map.place(a, BuildingKind::ClayPit, TilePos::new(0, 0), 2).unwrap();
        map.place(b, BuildingKind::Pottery, TilePos::new(4, 0), 2).unwrap();
        map.place(c, BuildingKind::ClayPit, TilePos::new(8, 8), 2).unwrap();

        let all = map.buildings_in_rect(TilePos::new(0, 0), TilePos::new(5, 5), None);
        assert_eq!(all, vec![a, b]);
        let pits = map.buildings_in_rect(
            TilePos::new(0, 0),
            TilePos::new(11, 11),
            Some(BuildingKind::ClayPit),
        );
        assert_eq!(pits, vec![a, c]);
        assert_eq!(map.buildings_of_kind(BuildingKind::Pottery), vec![b]);
    }

    #[test]
    fn walkable_tiles() {
        let mut map = Tilemap::new(4, 4);
        let b = ids(1)[0];
        map.place(b, BuildingKind::Market, TilePos::new(0, 0), 1).unwrap();
        map.set_terrain(TilePos::new(1, 0), Terrain::Water).unwrap();
        assert!(!map.is_walkable(TilePos::new(0, 0)));
        assert!(!map.is_walkable(TilePos::new(1, 0)));
        assert!(map.is_walkable(TilePos::new(2, 0)));
        assert!(!map.is_walkable(TilePos::new(-1, 0)));
    }

    #[test]
    fn diagonal_step() {
        assert_eq!(TilePos::new(2, 2).step(Direction::NorthEast), TilePos::new(3, 1));
    }
}
