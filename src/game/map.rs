//! Tile map and connected obstacle generation

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Map units per tile edge
pub const TILE_SIZE: f32 = 32.0;

/// Default arena dimensions in tiles
pub const DEFAULT_ROWS: usize = 50;
pub const DEFAULT_COLS: usize = 50;
pub const DEFAULT_OBSTACLES: usize = 250;
/// Chebyshev radius (in tiles) of the obstacle-free zone around the center
pub const DEFAULT_KEEP_CLEAR_RADIUS: usize = 6;

/// Placement attempts allowed per requested obstacle
const ATTEMPTS_PER_OBSTACLE: usize = 12;
/// Full regenerations before the connectivity policy decides
const MAX_GENERATIONS: usize = 10;
/// Obstacle edge lengths are drawn from 1..=MAX_OBSTACLE_EDGE
const MAX_OBSTACLE_EDGE: usize = 3;

const DIAGONALS: [(i32, i32); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

/// State of one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    Open,
    Wall,
}

/// Integer tile coordinate (x = column, y = row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing a continuous map position
    pub fn from_world(x: f32, y: f32) -> Self {
        Self {
            x: (x / TILE_SIZE).floor() as i32,
            y: (y / TILE_SIZE).floor() as i32,
        }
    }

    /// Continuous position of this tile's center
    pub fn center(self) -> (f32, f32) {
        (
            (self.x as f32 + 0.5) * TILE_SIZE,
            (self.y as f32 + 0.5) * TILE_SIZE,
        )
    }

    pub fn manhattan(self, other: GridPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn neighbors(self) -> [GridPos; 4] {
        [
            GridPos::new(self.x - 1, self.y),
            GridPos::new(self.x + 1, self.y),
            GridPos::new(self.x, self.y - 1),
            GridPos::new(self.x, self.y + 1),
        ]
    }
}

/// Immutable-after-generation arena grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMap {
    rows: usize,
    cols: usize,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// Open grid with a walled border ring
    pub fn bordered(rows: usize, cols: usize) -> Self {
        let mut map = Self {
            rows,
            cols,
            tiles: vec![Tile::Open; rows * cols],
        };
        for y in 0..rows {
            for x in 0..cols {
                if x == 0 || y == 0 || x + 1 == cols || y + 1 == rows {
                    map.tiles[y * cols + x] = Tile::Wall;
                }
            }
        }
        map
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Width of the map in continuous units
    pub fn width(&self) -> f32 {
        self.cols as f32 * TILE_SIZE
    }

    /// Height of the map in continuous units
    pub fn height(&self) -> f32 {
        self.rows as f32 * TILE_SIZE
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.cols && (pos.y as usize) < self.rows
    }

    /// Tile at `pos`, `None` outside the grid
    pub fn tile(&self, pos: GridPos) -> Option<Tile> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(self.tiles[pos.y as usize * self.cols + pos.x as usize])
    }

    /// Out-of-bounds tiles count as walls
    pub fn is_wall(&self, pos: GridPos) -> bool {
        !matches!(self.tile(pos), Some(Tile::Open))
    }

    pub fn center(&self) -> GridPos {
        GridPos::new((self.cols / 2) as i32, (self.rows / 2) as i32)
    }

    fn set(&mut self, pos: GridPos, tile: Tile) {
        if self.in_bounds(pos) {
            self.tiles[pos.y as usize * self.cols + pos.x as usize] = tile;
        }
    }

    /// Bordered map with extra walls at the given `(x, y)` tiles
    #[cfg(test)]
    pub(crate) fn with_walls(rows: usize, cols: usize, walls: &[(i32, i32)]) -> Self {
        let mut map = Self::bordered(rows, cols);
        for &(x, y) in walls {
            map.set(GridPos::new(x, y), Tile::Wall);
        }
        map
    }

    /// Row-major rendering, `#` for wall and `.` for open
    pub fn to_rows(&self) -> Vec<String> {
        self.tiles
            .chunks(self.cols.max(1))
            .map(|row| {
                row.iter()
                    .map(|t| match t {
                        Tile::Open => '.',
                        Tile::Wall => '#',
                    })
                    .collect()
            })
            .collect()
    }

    pub fn open_tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| **t == Tile::Open).count()
    }

    /// Open tiles 4-reachable from `start` (BFS)
    pub fn reachable_from(&self, start: GridPos) -> usize {
        if self.is_wall(start) {
            return 0;
        }
        let mut visited = vec![false; self.tiles.len()];
        let mut queue = VecDeque::new();
        visited[start.y as usize * self.cols + start.x as usize] = true;
        queue.push_back(start);
        let mut count = 1;

        while let Some(pos) = queue.pop_front() {
            for next in pos.neighbors() {
                if self.is_wall(next) {
                    continue;
                }
                let idx = next.y as usize * self.cols + next.x as usize;
                if !visited[idx] {
                    visited[idx] = true;
                    count += 1;
                    queue.push_back(next);
                }
            }
        }

        count
    }

    /// Every open tile is reachable from the center tile
    pub fn is_fully_connected(&self) -> bool {
        self.reachable_from(self.center()) == self.open_tile_count()
    }
}

/// What to do when connectivity cannot be verified after every regeneration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityPolicy {
    /// Accept the last generated map and log a warning
    #[default]
    BestEffort,
    /// Fail generation
    Strict,
}

/// Map generation errors
#[derive(Debug, thiserror::Error)]
pub enum MapGenError {
    #[error("map still disconnected after {attempts} generation attempts")]
    Disconnected { attempts: usize },

    #[error("map of {rows}x{cols} has no interior inside its border ring")]
    TooSmall { rows: usize, cols: usize },
}

/// Axis-aligned obstacle candidate in tile coordinates
#[derive(Debug, Clone, Copy)]
struct Rect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl Rect {
    fn contains(&self, pos: GridPos) -> bool {
        pos.x >= self.x && pos.x < self.x + self.w && pos.y >= self.y && pos.y < self.y + self.h
    }

    fn tiles(&self) -> impl Iterator<Item = GridPos> + '_ {
        (self.y..self.y + self.h)
            .flat_map(move |y| (self.x..self.x + self.w).map(move |x| GridPos::new(x, y)))
    }

    fn perimeter(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.tiles().filter(move |p| {
            p.x == self.x || p.y == self.y || p.x == self.x + self.w - 1 || p.y == self.y + self.h - 1
        })
    }
}

/// Builds bordered maps with connectivity-preserving obstacles
#[derive(Debug, Clone)]
pub struct MapGenerator {
    pub rows: usize,
    pub cols: usize,
    pub obstacle_count: usize,
    pub keep_clear_radius: usize,
    pub policy: ConnectivityPolicy,
}

impl Default for MapGenerator {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            obstacle_count: DEFAULT_OBSTACLES,
            keep_clear_radius: DEFAULT_KEEP_CLEAR_RADIUS,
            policy: ConnectivityPolicy::BestEffort,
        }
    }
}

impl MapGenerator {
    pub fn new(rows: usize, cols: usize, obstacle_count: usize) -> Self {
        Self {
            rows,
            cols,
            obstacle_count,
            ..Self::default()
        }
    }

    /// Generate a map connected from its center tile
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TileMap, MapGenError> {
        // A border ring around at least one interior tile.
        if self.rows < 3 || self.cols < 3 {
            return Err(MapGenError::TooSmall {
                rows: self.rows,
                cols: self.cols,
            });
        }

        let mut last = TileMap::bordered(self.rows, self.cols);
        for attempt in 1..=MAX_GENERATIONS {
            let map = self.generate_once(rng);
            if map.is_fully_connected() {
                debug!(attempt, obstacles = self.obstacle_count, "Map generated");
                return Ok(map);
            }
            warn!(attempt, "Generated map failed connectivity check, regenerating");
            last = map;
        }

        match self.policy {
            ConnectivityPolicy::BestEffort => {
                warn!(
                    attempts = MAX_GENERATIONS,
                    "Accepting map without verified connectivity"
                );
                Ok(last)
            }
            ConnectivityPolicy::Strict => Err(MapGenError::Disconnected {
                attempts: MAX_GENERATIONS,
            }),
        }
    }

    fn generate_once<R: Rng + ?Sized>(&self, rng: &mut R) -> TileMap {
        let mut map = TileMap::bordered(self.rows, self.cols);
        let center = map.center();
        let mut placed = 0;

        for _ in 0..self.obstacle_count * ATTEMPTS_PER_OBSTACLE {
            if placed >= self.obstacle_count {
                break;
            }

            let rect = self.random_rect(rng);
            if self.touches_keep_clear(&rect, center) {
                continue;
            }
            if rect.tiles().any(|p| map.is_wall(p)) {
                continue;
            }
            if creates_diagonal_leak(&map, &rect) {
                continue;
            }

            for pos in rect.tiles() {
                map.set(pos, Tile::Wall);
            }
            if map.is_fully_connected() {
                placed += 1;
            } else {
                for pos in rect.tiles() {
                    map.set(pos, Tile::Open);
                }
            }
        }

        debug!(placed, requested = self.obstacle_count, "Obstacle placement finished");
        map
    }

    /// Random rectangle fully inside the non-border interior.
    /// Requires `rows` and `cols` of at least 3.
    fn random_rect<R: Rng + ?Sized>(&self, rng: &mut R) -> Rect {
        // Interior spans 1..=cols-2; edges are clamped so the rectangle fits.
        let w = rng.gen_range(1..=MAX_OBSTACLE_EDGE.min(self.cols - 2));
        let h = rng.gen_range(1..=MAX_OBSTACLE_EDGE.min(self.rows - 2));
        let x = rng.gen_range(1..=self.cols - 1 - w);
        let y = rng.gen_range(1..=self.rows - 1 - h);
        Rect {
            x: x as i32,
            y: y as i32,
            w: w as i32,
            h: h as i32,
        }
    }

    fn touches_keep_clear(&self, rect: &Rect, center: GridPos) -> bool {
        let r = self.keep_clear_radius as i32;
        rect.tiles()
            .any(|p| (p.x - center.x).abs() <= r && (p.y - center.y).abs() <= r)
    }
}

/// A wall diagonal to the rectangle whose two bridging tiles stay open
/// would leave a corner-only gap.
fn creates_diagonal_leak(map: &TileMap, rect: &Rect) -> bool {
    let will_be_wall = |p: GridPos| rect.contains(p) || map.is_wall(p);

    rect.perimeter().any(|p| {
        DIAGONALS.iter().any(|&(dx, dy)| {
            let diag = GridPos::new(p.x + dx, p.y + dy);
            if !will_be_wall(diag) {
                return false;
            }
            let bridge_a = GridPos::new(p.x + dx, p.y);
            let bridge_b = GridPos::new(p.x, p.y + dy);
            !will_be_wall(bridge_a) && !will_be_wall(bridge_b)
        })
    })
}
