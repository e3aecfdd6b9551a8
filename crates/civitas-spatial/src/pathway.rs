use crate::TilePos;
use serde::{Deserialize, Serialize};

/// An ordered tile path a walker follows, traversable in either direction.
///
/// The cursor sits on the tile the walker currently occupies. Advancing
/// moves it one tile toward the end, or toward the start once reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pathway {
    tiles: Vec<TilePos>,
    cursor: usize,
    reversed: bool,
}

impl Pathway {
    /// A path over `tiles`. Empty input yields an empty path that is
    /// always finished.
    pub fn new(tiles: Vec<TilePos>) -> Self {
        Self {
            tiles,
            cursor: 0,
            reversed: false,
        }
    }

    pub fn tiles(&self) -> &[TilePos] {
        &self.tiles
    }

    /// Number of steps from the first tile to the last.
    pub fn length(&self) -> u32 {
        self.tiles.len().saturating_sub(1) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn start(&self) -> Option<TilePos> {
        self.tiles.first().copied()
    }

    pub fn stop(&self) -> Option<TilePos> {
        self.tiles.last().copied()
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn position(&self) -> Option<TilePos> {
        self.tiles.get(self.cursor).copied()
    }

    /// The tile the next [`advance`](Self::advance) would move onto.
    pub fn next_tile(&self) -> Option<TilePos> {
        if self.is_finished() {
            return None;
        }
        let next = if self.reversed {
            self.cursor - 1
        } else {
            self.cursor + 1
        };
        self.tiles.get(next).copied()
    }

    /// Whether the cursor has reached the end in the current direction.
    pub fn is_finished(&self) -> bool {
        if self.tiles.is_empty() {
            return true;
        }
        if self.reversed {
            self.cursor == 0
        } else {
            self.cursor + 1 >= self.tiles.len()
        }
    }

    /// Step one tile. Returns the new position, or `None` when finished.
    pub fn advance(&mut self) -> Option<TilePos> {
        let next = self.next_tile()?;
        if self.reversed {
            self.cursor -= 1;
        } else {
            self.cursor += 1;
        }
        Some(next)
    }

    /// Turn around on the current tile.
    pub fn toggle_direction(&mut self) {
        self.reversed = !self.reversed;
    }

    /// Replace the tiles ahead with `route`, keeping the ones already
    /// walked so that turning back still leads to the original start.
    ///
    /// `route` must begin on the current tile; returns `false` and leaves
    /// the path untouched otherwise.
    pub fn splice(&mut self, route: &Pathway) -> bool {
        if route.is_empty() || route.start() != self.position() {
            return false;
        }
        let ahead = &route.tiles[1..];
        if self.reversed {
            let mut tiles: Vec<TilePos> = ahead.iter().rev().copied().collect();
            tiles.extend_from_slice(&self.tiles[self.cursor..]);
            self.cursor = ahead.len();
            self.tiles = tiles;
        } else {
            self.tiles.truncate(self.cursor + 1);
            self.tiles.extend_from_slice(ahead);
        }
        true
    }

    /// Steps left in the current direction.
    pub fn remaining(&self) -> u32 {
        if self.tiles.is_empty() {
            return 0;
        }
        if self.reversed {
            self.cursor as u32
        } else {
            (self.tiles.len() - 1 - self.cursor) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: i32) -> Pathway {
        Pathway::new((0..n).map(|x| TilePos::new(x, 0)).collect())
    }

    #[test]
    fn walk_there_and_back() {
        let mut path = line(4);
        assert_eq!(path.length(), 3);
        assert_eq!(path.position(), Some(TilePos::new(0, 0)));

        let mut steps = 0;
        while path.advance().is_some() {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(path.position(), path.stop());
        assert!(path.is_finished());

        path.toggle_direction();
        assert!(!path.is_finished());
        assert_eq!(path.remaining(), 3);
        assert_eq!(path.next_tile(), Some(TilePos::new(2, 0)));
        while path.advance().is_some() {}
        assert_eq!(path.position(), path.start());
    }

    #[test]
    fn single_tile_path_is_finished() {
        let path = line(1);
        assert_eq!(path.length(), 0);
        assert!(path.is_finished());
        assert_eq!(path.next_tile(), None);
    }

    #[test]
    fn splice_keeps_walked_tiles() {
        let mut path = line(5);
        path.advance();
        path.advance();
        // Detour north from (2,0) to (4,1).
        let detour = Pathway::new(vec![
            TilePos::new(2, 0),
            TilePos::new(2, 1),
            TilePos::new(3, 1),
            TilePos::new(4, 1),
        ]);
        assert!(path.splice(&detour));
        assert_eq!(path.position(), Some(TilePos::new(2, 0)));
        assert_eq!(path.start(), Some(TilePos::new(0, 0)));
        assert_eq!(path.stop(), Some(TilePos::new(4, 1)));
        assert_eq!(path.remaining(), 3);

        while path.advance().is_some() {}
        path.toggle_direction();
        while path.advance().is_some() {}
        assert_eq!(path.position(), Some(TilePos::new(0, 0)));
    }

    #[test]
    fn splice_while_reversed() {
        let mut path = line(5);
        while path.advance().is_some() {}
        path.toggle_direction();
        path.advance();
        // On (3,0) heading home; go around through y=1.
        let detour = Pathway::new(vec![
            TilePos::new(3, 0),
            TilePos::new(3, 1),
            TilePos::new(2, 1),
            TilePos::new(1, 1),
            TilePos::new(0, 1),
            TilePos::new(0, 0),
        ]);
        assert!(path.splice(&detour));
        assert!(path.is_reversed());
        assert_eq!(path.position(), Some(TilePos::new(3, 0)));
        assert_eq!(path.remaining(), 5);
        assert_eq!(path.next_tile(), Some(TilePos::new(3, 1)));
        assert_eq!(path.stop(), Some(TilePos::new(4, 0)));

        while path.advance().is_some() {}
        assert_eq!(path.position(), Some(TilePos::new(0, 0)));
    }

    #[test]
    fn splice_rejects_route_from_elsewhere() {
        let mut path = line(4);
        let other = Pathway::new(vec![TilePos::new(1, 1), TilePos::new(2, 1)]);
        assert!(!path.splice(&other));
        assert_eq!(path, line(4));
    }

    #[test]
    fn empty_path() {
        let mut path = Pathway::new(Vec::new());
        assert!(path.is_empty());
        assert!(path.is_finished());
        assert_eq!(path.advance(), None);
        assert_eq!(path.position(), None);
        assert_eq!(path.remaining(), 0);
    }
}
