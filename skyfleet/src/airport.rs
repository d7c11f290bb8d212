//! Airport placement and lookup.
//!
//! Airports are immutable once placed. [`AirportIndex`] owns every airport
//! and hands out sequential ids; aircraft and requests refer to airports by
//! id only, so no component holds a reference into another component's state.
//!
//! # Placement
//!
//! [`AirportIndex::random`] scatters airports uniformly inside the world
//! bounds by rejection sampling: a candidate position is drawn, and redrawn
//! until it sits at least the minimum separation away from every airport
//! placed so far. A world too crowded to satisfy the constraint within the
//! attempt cap is a fatal setup error.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Identifier of an airport within an [`AirportIndex`].
///
/// Ids are assigned sequentially from zero in placement order.
pub type AirportId = u32;

/// Default number of airports placed by [`AirportIndex::random`].
pub const DEFAULT_AIRPORT_COUNT: u32 = 10;
/// Default width and height of the world, in grid units.
pub const DEFAULT_WORLD_SIZE: f64 = 10.0;
/// Default minimum pairwise distance between airports, in grid units.
pub const DEFAULT_MIN_SEPARATION: f64 = 1.0;
/// Candidate positions tried per airport before placement is abandoned.
const MAX_PLACEMENT_ATTEMPTS: u32 = 1000;

/// Error returned when airport placement fails.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    /// The requested airport count was zero.
    #[error("airport count must be at least 1")]
    NoAirports,

    /// The world could not fit another airport at the required separation.
    #[error(
        "could not place airport {index} at separation {min_separation} after {attempts} attempts"
    )]
    Crowded {
        index: u32,
        min_separation: f64,
        attempts: u32,
    },
}

/// A fixed ground location that aircraft fly between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Airport {
    id: AirportId,
    x: f64,
    y: f64,
}

impl Airport {
    pub fn id(&self) -> AirportId {
        self.id
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Position as an `(x, y)` pair.
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Euclidean distance from this airport to an arbitrary point.
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Placement parameters for [`AirportIndex::random`].
#[derive(Debug, Clone)]
pub struct PlacementConfig {
    /// Number of airports to place.
    pub count: u32,
    /// World width in grid units.
    pub world_width: f64,
    /// World height in grid units.
    pub world_height: f64,
    /// Minimum pairwise distance between airports.
    pub min_separation: f64,
    /// Seed for reproducible layouts; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_AIRPORT_COUNT,
            world_width: DEFAULT_WORLD_SIZE,
            world_height: DEFAULT_WORLD_SIZE,
            min_separation: DEFAULT_MIN_SEPARATION,
            seed: None,
        }
    }
}

/// Immutable arena of airports, indexed by id.
#[derive(Debug)]
pub struct AirportIndex {
    airports: Vec<Airport>,
}

impl AirportIndex {
    /// Places `config.count` airports by rejection sampling.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::NoAirports`] for a zero count and
    /// [`PlacementError::Crowded`] when the separation constraint cannot be
    /// met within the attempt cap.
    pub fn random(config: &PlacementConfig) -> Result<Self, PlacementError> {
        if config.count == 0 {
            return Err(PlacementError::NoAirports);
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut airports: Vec<Airport> = Vec::with_capacity(config.count as usize);
        for index in 0..config.count {
            let mut placed = false;
            for _ in 0..MAX_PLACEMENT_ATTEMPTS {
                let x = rng.gen_range(0.0..config.world_width);
                let y = rng.gen_range(0.0..config.world_height);
                if airports
                    .iter()
                    .all(|airport| airport.distance_to(x, y) >= config.min_separation)
                {
                    airports.push(Airport { id: index, x, y });
                    placed = true;
                    break;
                }
            }
            if !placed {
                return Err(PlacementError::Crowded {
                    index,
                    min_separation: config.min_separation,
                    attempts: MAX_PLACEMENT_ATTEMPTS,
                });
            }
        }

        Ok(Self { airports })
    }

    /// Builds an index from explicit positions, id order following the slice.
    pub fn from_positions(positions: &[(f64, f64)]) -> Self {
        let airports = positions
            .iter()
            .enumerate()
            .map(|(index, &(x, y))| Airport {
                id: index as AirportId,
                x,
                y,
            })
            .collect();
        Self { airports }
    }

    /// Looks up an airport by id.
    pub fn get(&self, id: AirportId) -> Option<&Airport> {
        self.airports.get(id as usize)
    }

    /// Number of airports in the index.
    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// Iterates airports in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Airport> {
        self.airports.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn places_requested_number_of_airports() {
        let config = PlacementConfig {
            seed: Some(42),
            ..PlacementConfig::default()
        };
        let index = AirportIndex::random(&config).unwrap();
        assert_eq!(index.len(), DEFAULT_AIRPORT_COUNT as usize);
    }

    #[test]
    fn placement_respects_min_separation() {
        let config = PlacementConfig {
            count: 10,
            min_separation: 1.5,
            seed: Some(7),
            ..PlacementConfig::default()
        };
        let index = AirportIndex::random(&config).unwrap();
        for a in index.iter() {
            for b in index.iter() {
                if a.id() != b.id() {
                    assert!(
                        a.distance_to(b.x(), b.y()) >= 1.5,
                        "airports {} and {} too close",
                        a.id(),
                        b.id()
                    );
                }
            }
        }
    }

    #[test]
    fn seeded_placement_is_reproducible() {
        let config = PlacementConfig {
            seed: Some(99),
            ..PlacementConfig::default()
        };
        let first = AirportIndex::random(&config).unwrap();
        let second = AirportIndex::random(&config).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.position(), b.position());
        }
    }

    #[test]
    fn ids_are_sequential_from_zero() {
        let index = AirportIndex::from_positions(&[(0.0, 0.0), (3.0, 4.0), (8.0, 1.0)]);
        let ids: Vec<AirportId> = index.iter().map(Airport::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn lookup_of_unknown_id_returns_none() {
        let index = AirportIndex::from_positions(&[(0.0, 0.0)]);
        assert!(index.get(0).is_some());
        assert!(index.get(1).is_none());
    }

    #[test]
    fn zero_airports_is_a_setup_error() {
        let config = PlacementConfig {
            count: 0,
            ..PlacementConfig::default()
        };
        assert!(matches!(
            AirportIndex::random(&config),
            Err(PlacementError::NoAirports)
        ));
    }

    #[test]
    fn crowded_world_fails_placement() {
        // 50 airports at separation 1.0 cannot fit in a 2x2 world.
        let config = PlacementConfig {
            count: 50,
            world_width: 2.0,
            world_height: 2.0,
            min_separation: 1.0,
            seed: Some(1),
        };
        assert!(matches!(
            AirportIndex::random(&config),
            Err(PlacementError::Crowded { .. })
        ));
    }

    #[test]
    fn distance_is_euclidean() {
        let index = AirportIndex::from_positions(&[(0.0, 0.0)]);
        let origin = index.get(0).unwrap();
        assert!((origin.distance_to(3.0, 4.0) - 5.0).abs() < 1e-9);
    }
}
