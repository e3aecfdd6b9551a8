use crate::{Direction, Pathway, TilePos, Tilemap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Which tiles a point-to-point search may cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WayType {
    RoadOnly,
    /// Any free tile without an obstacle, roads included.
    AllTerrain,
    /// Roads if a road path exists, otherwise all terrain.
    RoadFirst,
}

/// Shortest orthogonal path from `from` to `to`. The start tile may be of
/// any terrain; every later tile must satisfy `way`.
pub fn find_path(map: &Tilemap, from: TilePos, to: TilePos, way: WayType) -> Option<Pathway> {
    match way {
        WayType::RoadOnly => search(map, from, to, |m, p| m.is_road(p)),
        WayType::AllTerrain => search(map, from, to, |m, p| m.is_walkable(p)),
        WayType::RoadFirst => find_path(map, from, to, WayType::RoadOnly)
            .or_else(|| find_path(map, from, to, WayType::AllTerrain)),
    }
}

fn search(
    map: &Tilemap,
    from: TilePos,
    to: TilePos,
    passable: impl Fn(&Tilemap, TilePos) -> bool,
) -> Option<Pathway> {
    if !map.in_bounds(from) || !map.in_bounds(to) {
        return None;
    }
    if from == to {
        return Some(Pathway::new(vec![from]));
    }

    let mut parents: BTreeMap<TilePos, TilePos> = BTreeMap::new();
    let mut queue = VecDeque::from([from]);
    parents.insert(from, from);

    while let Some(tile) = queue.pop_front() {
        for dir in Direction::ORTHOGONAL {
            let next = tile.step(dir);
            if parents.contains_key(&next) || !passable(map, next) {
                continue;
            }
            parents.insert(next, tile);
            if next == to {
                let mut tiles = vec![to];
                let mut cur = to;
                while cur != from {
                    cur = parents[&cur];
                    tiles.push(cur);
                }
                tiles.reverse();
                return Some(Pathway::new(tiles));
            }
            queue.push_back(next);
        }
    }
    None
}
