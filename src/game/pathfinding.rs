//! A* search over the 4-connected tile grid

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::map::{GridPos, TileMap};

/// Shortest path from `start` to `goal`, both inclusive.
///
/// Returns `None` when the goal is outside the grid, a wall, or not reachable.
/// Equal-cost entries are expanded in discovery order.
pub fn find_path(map: &TileMap, start: GridPos, goal: GridPos) -> Option<Vec<GridPos>> {
    if !map.in_bounds(start) || map.is_wall(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    // (f, discovery sequence, g, tile); Reverse turns the max-heap into a min-heap.
    let mut open = BinaryHeap::<Reverse<(i32, u64, i32, GridPos)>>::new();
    let mut g_scores = HashMap::<GridPos, i32>::new();
    let mut came_from = HashMap::<GridPos, GridPos>::new();
    let mut seq: u64 = 0;

    g_scores.insert(start, 0);
    open.push(Reverse((start.manhattan(goal), seq, 0, start)));

    while let Some(Reverse((_f, _seq, g_cost, cell))) = open.pop() {
        let best_g = g_scores.get(&cell).copied().unwrap_or(i32::MAX);
        if g_cost > best_g {
            continue;
        }
        if cell == goal {
            return Some(reconstruct_path(start, goal, &came_from));
        }

        for next in cell.neighbors() {
            if map.is_wall(next) {
                continue;
            }
            let tentative_g = g_cost + 1;
            let known_g = g_scores.get(&next).copied().unwrap_or(i32::MAX);
            if tentative_g >= known_g {
                continue;
            }

            came_from.insert(next, cell);
            g_scores.insert(next, tentative_g);
            seq += 1;
            open.push(Reverse((tentative_g + next.manhattan(goal), seq, tentative_g, next)));
        }
    }

    None
}

fn reconstruct_path(
    start: GridPos,
    goal: GridPos,
    came_from: &HashMap<GridPos, GridPos>,
) -> Vec<GridPos> {
    let mut path = vec![goal];
    let mut cursor = goal;
    while cursor != start {
        match came_from.get(&cursor) {
            Some(prev) => {
                cursor = *prev;
                path.push(cursor);
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Tile after `start` on the shortest route to `goal`
pub fn next_hop(map: &TileMap, start: GridPos, goal: GridPos) -> Option<GridPos> {
    find_path(map, start, goal).and_then(|path| path.get(1).copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(path: &[GridPos], map: &TileMap) {
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan(pair[1]), 1, "non-adjacent step {pair:?}");
        }
        for tile in path {
            assert!(!map.is_wall(*tile), "path crosses wall at {tile:?}");
        }
    }

    #[test]
    fn free_grid_path_length_is_manhattan_plus_one() {
        let map = TileMap::bordered(20, 20);
        let cases = [
            (GridPos::new(1, 1), GridPos::new(18, 18)),
            (GridPos::new(5, 10), GridPos::new(5, 2)),
            (GridPos::new(17, 3), GridPos::new(2, 16)),
            (GridPos::new(9, 9), GridPos::new(10, 9)),
        ];
        for (start, goal) in cases {
            let path = find_path(&map, start, goal).expect("path on open grid");
            assert_eq!(path.len() as i32, start.manhattan(goal) + 1);
            assert_eq!(path.first(), Some(&start));
            assert_eq!(path.last(), Some(&goal));
            assert_contiguous(&path, &map);
        }
    }

    #[test]
    fn start_equals_goal() {
        let map = TileMap::bordered(5, 5);
        let here = GridPos::new(2, 2);
        assert_eq!(find_path(&map, here, here), Some(vec![here]));
        assert_eq!(next_hop(&map, here, here), None);
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        // Goal (5, 5) boxed in on all four sides.
        let map = TileMap::with_walls(10, 10, &[(4, 5), (6, 5), (5, 4), (5, 6)]);
        assert_eq!(find_path(&map, GridPos::new(1, 1), GridPos::new(5, 5)), None);
    }

    #[test]
    fn wall_or_out_of_bounds_goal_is_unreachable() {
        let map = TileMap::with_walls(10, 10, &[(4, 4)]);
        assert_eq!(find_path(&map, GridPos::new(1, 1), GridPos::new(4, 4)), None);
        assert_eq!(find_path(&map, GridPos::new(1, 1), GridPos::new(40, 4)), None);
    }

    #[test]
    fn routes_around_a_wall() {
        // Vertical wall at x = 5 from y = 1..=7 leaves a gap at y = 8.
        let walls: Vec<(i32, i32)> = (1..=7).map(|y| (5, y)).collect();
        let map = TileMap::with_walls(10, 10, &walls);
        let start = GridPos::new(3, 2);
        let goal = GridPos::new(7, 2);
        let path = find_path(&map, start, goal).expect("detour exists");
        assert_contiguous(&path, &map);
        assert!(path.contains(&GridPos::new(5, 8)));
        // Down 6, across 4, up 6.
        assert_eq!(path.len(), 17);
        assert_eq!(next_hop(&map, start, goal), Some(path[1]));
    }
}
