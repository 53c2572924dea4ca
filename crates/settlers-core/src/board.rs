//! Game board: the fixed layout of terrain cells and their number tokens.
//!
//! This module contains:
//! - Resource and terrain types
//! - The `Cell` carried by each hex of the board
//! - Randomized board generation over a radius-2 grid
//!
//! Buildings and roads are not stored here; they belong to the game state,
//! which keys them by canonical vertex and edge.

use crate::hex::{EdgeKey, HexCoord, VertexKey};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Board radius in cells around the center
pub const BOARD_RADIUS: i32 = 2;

/// Resource types a player can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Brick,
    Lumber,
    Wool,
    Grain,
    Ore,
}

impl Resource {
    /// All resource types
    pub const ALL: [Resource; 5] = [
        Resource::Brick,
        Resource::Lumber,
        Resource::Wool,
        Resource::Grain,
        Resource::Ore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Brick => "brick",
            Resource::Lumber => "lumber",
            Resource::Wool => "wool",
            Resource::Grain => "grain",
            Resource::Ore => "ore",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a cell is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    Brick,
    Lumber,
    Wool,
    Grain,
    Ore,
    /// Produces nothing and never carries a token
    Desert,
}

impl Terrain {
    /// The resource this terrain produces, if any
    pub fn resource(&self) -> Option<Resource> {
        match self {
            Terrain::Brick => Some(Resource::Brick),
            Terrain::Lumber => Some(Resource::Lumber),
            Terrain::Wool => Some(Resource::Wool),
            Terrain::Grain => Some(Resource::Grain),
            Terrain::Ore => Some(Resource::Ore),
            Terrain::Desert => None,
        }
    }
}

impl From<Resource> for Terrain {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Brick => Terrain::Brick,
            Resource::Lumber => Terrain::Lumber,
            Resource::Wool => Terrain::Wool,
            Resource::Grain => Terrain::Grain,
            Resource::Ore => Terrain::Ore,
        }
    }
}

/// A single hex cell on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: usize,
    #[serde(rename = "resource")]
    pub terrain: Terrain,
    /// Dice number that triggers production (2-12, None for desert)
    pub number: Option<u8>,
    pub q: i32,
    pub r: i32,
}

impl Cell {
    /// Create a new producing cell
    pub fn new_resource(id: usize, coord: HexCoord, resource: Resource, number: u8) -> Self {
        Self {
            id,
            terrain: resource.into(),
            number: Some(number),
            q: coord.q,
            r: coord.r,
        }
    }

    /// Create a desert cell
    pub fn desert(id: usize, coord: HexCoord) -> Self {
        Self {
            id,
            terrain: Terrain::Desert,
            number: None,
            q: coord.q,
            r: coord.r,
        }
    }

    pub fn coord(&self) -> HexCoord {
        HexCoord::new(self.q, self.r)
    }

    /// Get the resource this cell produces, if any
    pub fn resource(&self) -> Option<Resource> {
        self.terrain.resource()
    }

    /// Canonical keys of the six corners of this cell
    pub fn corners(&self) -> [VertexKey; 6] {
        self.coord().corners()
    }
}

/// The generated board. Immutable for the lifetime of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    #[serde(rename = "hexes")]
    pub cells: Vec<Cell>,
}

impl Board {
    /// Generate a board with a thread-local RNG
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self::generate_with_rng(&mut rng)
    }

    /// Generate a board with a provided RNG.
    ///
    /// The center cell is always a desert without a token. The 18 others get a
    /// shuffled set of 4 lumber, 4 wool, 4 grain, 3 brick and 3 ore, and a
    /// shuffled token set of one 2, one 12 and two each of 3-6 and 8-11.
    pub fn generate_with_rng<R: Rng>(rng: &mut R) -> Self {
        let mut resources: Vec<Resource> = Vec::with_capacity(18);
        resources.extend(std::iter::repeat(Resource::Lumber).take(4));
        resources.extend(std::iter::repeat(Resource::Wool).take(4));
        resources.extend(std::iter::repeat(Resource::Grain).take(4));
        resources.extend(std::iter::repeat(Resource::Brick).take(3));
        resources.extend(std::iter::repeat(Resource::Ore).take(3));
        resources.shuffle(rng);

        let mut numbers: Vec<u8> = vec![2, 12];
        for _ in 0..2 {
            numbers.extend([3, 4, 5, 6, 8, 9, 10, 11]);
        }
        numbers.shuffle(rng);

        let center = HexCoord::new(0, 0);
        let mut producing = resources.into_iter().zip(numbers);
        let mut cells = Vec::with_capacity(19);

        for (id, coord) in HexCoord::within_radius(BOARD_RADIUS).into_iter().enumerate() {
            if coord == center {
                cells.push(Cell::desert(id, coord));
            } else if let Some((resource, number)) = producing.next() {
                cells.push(Cell::new_resource(id, coord, resource, number));
            }
        }

        Self { cells }
    }

    /// Get a cell by coordinate
    pub fn get_cell(&self, coord: &HexCoord) -> Option<&Cell> {
        self.cells.iter().find(|c| c.q == coord.q && c.r == coord.r)
    }

    pub fn contains(&self, coord: &HexCoord) -> bool {
        self.get_cell(coord).is_some()
    }

    /// Whether any of the three cells around a corner is on the board
    pub fn touches_vertex(&self, vertex: &VertexKey) -> bool {
        vertex.aliases().iter().any(|v| self.contains(&v.hex()))
    }

    /// Whether either cell beside a side is on the board
    pub fn touches_edge(&self, edge: &EdgeKey) -> bool {
        edge.touching_hexes().iter().any(|h| self.contains(h))
    }

    /// Cells whose token matches a dice total. Never includes the desert.
    pub fn cells_with_number(&self, number: u8) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(move |c| c.number == Some(number))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::generate()
    }
}
