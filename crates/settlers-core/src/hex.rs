//! Hex grid topology using axial coordinates (q, r).
//!
//! This module gives every shared point and side of the grid one canonical name:
//! - `HexCoord`: identifies individual cells
//! - `VertexKey`: identifies corners, where settlements and cities are placed
//! - `EdgeKey`: identifies sides, where roads are placed
//!
//! A corner is shared by three cells and a side by two, so the same physical
//! location can be written several ways. Canonicalization picks the
//! lexicographically smallest `(q, r, index)` triple among those spellings, and
//! all adjacency is derived from coordinate arithmetic. No graph is stored.
//!
//! Orientation is pointy-top: corner 0 is the top point and corners run
//! clockwise. Side `k` lies between corner `k` and corner `k + 1`.

use serde::{Deserialize, Serialize};

/// Axial delta of the neighbor across each side, indexed by side.
pub const DIRECTIONS: [(i32, i32); 6] = [(1, -1), (1, 0), (0, 1), (-1, 1), (-1, 0), (0, -1)];

/// The two other spellings of each corner: `(dq, dr, corner)` relative to the cell.
const CORNER_ALIASES: [[(i32, i32, u8); 2]; 6] = [
    [(0, -1, 2), (1, -1, 4)],
    [(1, -1, 3), (1, 0, 5)],
    [(1, 0, 4), (0, 1, 0)],
    [(0, 1, 5), (-1, 1, 1)],
    [(-1, 1, 0), (-1, 0, 2)],
    [(-1, 0, 1), (0, -1, 3)],
];

/// Axial coordinate for hex grid.
///
/// In axial coordinates:
/// - `q` increases going east (right)
/// - `r` increases going southeast
/// - The third coordinate `s` (not stored) satisfies: q + r + s = 0
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    /// Column (increases going east)
    pub q: i32,
    /// Row (increases going southeast)
    pub r: i32,
}

impl HexCoord {
    /// Create a new hex coordinate
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implicit third coordinate (s = -q - r)
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// The cell across the given side
    pub fn neighbor(&self, side: u8) -> HexCoord {
        let (dq, dr) = DIRECTIONS[(side % 6) as usize];
        HexCoord::new(self.q.wrapping_add(dq), self.r.wrapping_add(dr))
    }

    /// The six neighboring cells, indexed by side
    pub fn neighbors(&self) -> [HexCoord; 6] {
        std::array::from_fn(|side| self.neighbor(side as u8))
    }

    /// Distance to another hex (in hex steps)
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Canonical keys of this cell's six corners, indexed by corner
    pub fn corners(&self) -> [VertexKey; 6] {
        std::array::from_fn(|corner| normalize_vertex(self.q, self.r, corner as u8))
    }

    /// Canonical keys of this cell's six sides, indexed by side
    pub fn sides(&self) -> [EdgeKey; 6] {
        std::array::from_fn(|side| normalize_edge(self.q, self.r, side as u8))
    }

    /// Every cell within `radius` steps of the origin, `q`-major then `r`.
    pub fn within_radius(radius: i32) -> Vec<HexCoord> {
        let mut cells = Vec::new();
        for q in -radius..=radius {
            for r in -radius..=radius {
                if (-radius..=radius).contains(&(q + r)) {
                    cells.push(HexCoord::new(q, r));
                }
            }
        }
        cells
    }
}

/// Canonical identity of a grid corner.
///
/// Ordering is lexicographic on `(q, r, corner)`, which is what canonicalization
/// minimizes over. Values built with [`VertexKey::raw`] are not canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexKey {
    pub q: i32,
    pub r: i32,
    /// Corner index 0-5, clockwise from the top
    pub corner: u8,
}

impl VertexKey {
    /// Create a canonical vertex key from any of its spellings
    pub fn new(q: i32, r: i32, corner: u8) -> Self {
        normalize_vertex(q, r, corner)
    }

    /// Create without canonicalization
    pub const fn raw(q: i32, r: i32, corner: u8) -> Self {
        Self { q, r, corner }
    }

    /// The cell this spelling is expressed against
    pub fn hex(&self) -> HexCoord {
        HexCoord::new(self.q, self.r)
    }

    pub fn canonical(self) -> Self {
        normalize_vertex(self.q, self.r, self.corner)
    }

    pub fn aliases(&self) -> [VertexKey; 3] {
        vertex_aliases(self.q, self.r, self.corner)
    }

    /// The 3 edges meeting at this vertex
    pub fn incident_edges(&self) -> Vec<EdgeKey> {
        incident_edges(self.q, self.r, self.corner)
    }

    /// The 3 vertices one edge away (for the distance rule)
    pub fn adjacent_vertices(&self) -> Vec<VertexKey> {
        adjacent_vertices(self.q, self.r, self.corner)
    }
}

/// Canonical identity of a grid side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub q: i32,
    pub r: i32,
    /// Side index 0-5; side `k` joins corners `k` and `k + 1`
    #[serde(rename = "edge")]
    pub side: u8,
}

impl EdgeKey {
    /// Create a canonical edge key from either of its spellings
    pub fn new(q: i32, r: i32, side: u8) -> Self {
        normalize_edge(q, r, side)
    }

    /// Create without canonicalization
    pub const fn raw(q: i32, r: i32, side: u8) -> Self {
        Self { q, r, side }
    }

    pub fn hex(&self) -> HexCoord {
        HexCoord::new(self.q, self.r)
    }

    pub fn canonical(self) -> Self {
        normalize_edge(self.q, self.r, self.side)
    }

    /// The same side seen from the cell on the other side of it
    pub fn alias(&self) -> EdgeKey {
        let side = self.side % 6;
        let other = self.hex().neighbor(side);
        EdgeKey::raw(other.q, other.r, (side + 3) % 6)
    }

    /// Get the 2 hexes that share this edge
    pub fn touching_hexes(&self) -> [HexCoord; 2] {
        [self.hex(), self.hex().neighbor(self.side)]
    }

    /// The canonical vertices at both ends of this edge
    pub fn endpoints(&self) -> [VertexKey; 2] {
        let side = self.side % 6;
        [
            normalize_vertex(self.q, self.r, side),
            normalize_vertex(self.q, self.r, (side + 1) % 6),
        ]
    }
}

/// Canonical form of side `side` of cell `(q, r)`.
pub fn normalize_edge(q: i32, r: i32, side: u8) -> EdgeKey {
    let here = EdgeKey::raw(q, r, side % 6);
    here.min(here.alias())
}

/// All three spellings of corner `corner` of cell `(q, r)`, the given one first.
pub fn vertex_aliases(q: i32, r: i32, corner: u8) -> [VertexKey; 3] {
    let corner = corner % 6;
    let [(dq1, dr1, c1), (dq2, dr2, c2)] = CORNER_ALIASES[corner as usize];
    [
        VertexKey::raw(q, r, corner),
        VertexKey::raw(q.wrapping_add(dq1), r.wrapping_add(dr1), c1),
        VertexKey::raw(q.wrapping_add(dq2), r.wrapping_add(dr2), c2),
    ]
}

/// Canonical form of corner `corner` of cell `(q, r)`.
pub fn normalize_vertex(q: i32, r: i32, corner: u8) -> VertexKey {
    let [a, b, c] = vertex_aliases(q, r, corner);
    a.min(b).min(c)
}

/// The canonical edges meeting at a vertex, sorted. Always three.
pub fn incident_edges(q: i32, r: i32, corner: u8) -> Vec<EdgeKey> {
    let mut edges: Vec<EdgeKey> = vertex_aliases(q, r, corner)
        .iter()
        .flat_map(|alias| {
            [
                normalize_edge(alias.q, alias.r, alias.corner),
                normalize_edge(alias.q, alias.r, (alias.corner + 5) % 6),
            ]
        })
        .collect();
    edges.sort();
    edges.dedup();
    edges
}

/// The canonical vertices one edge away from a vertex, sorted. Always three.
pub fn adjacent_vertices(q: i32, r: i32, corner: u8) -> Vec<VertexKey> {
    let start = normalize_vertex(q, r, corner);
    let mut adjacent: Vec<VertexKey> = incident_edges(q, r, corner)
        .iter()
        .map(|edge| {
            let [a, b] = edge.endpoints();
            if a == start {
                b
            } else {
                a
            }
        })
        .collect();
    adjacent.sort();
    adjacent.dedup();
    adjacent
}
