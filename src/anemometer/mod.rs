pub mod ambient;
pub mod anemometer;
pub mod calibration;
pub mod conditioner;
pub mod config;
pub mod error;
pub mod psychrometry;
pub mod resolver;
pub mod selector;
pub mod storage;
pub mod threshold;
pub mod zero_crossing;

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Transducer position. Every echo travels from the named transducer to the
/// opposite one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

/// Ordered pair of opposing directions. One wind component is resolved per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis(pub Direction, pub Direction);

impl Axis {
    pub const NORTH_SOUTH: Axis = Axis(Direction::North, Direction::South);
    pub const EAST_WEST: Axis = Axis(Direction::East, Direction::West);
}

/// One value per transducer direction. All four are always present, so a
/// lookup by `Direction` can never miss.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerDirection<T> {
    pub north: T,
    pub south: T,
    pub east: T,
    pub west: T,
}

impl<T> PerDirection<T> {
    pub fn from_fn<F: FnMut(Direction) -> T>(mut f: F) -> PerDirection<T> {
        PerDirection {
            north: f(Direction::North),
            south: f(Direction::South),
            east: f(Direction::East),
            west: f(Direction::West),
        }
    }

    /// Builds the structure from a fallible per-direction computation, stopping
    /// at the first direction that fails (in `Direction::ALL` order).
    pub fn try_from_fn<E, F>(mut f: F) -> Result<PerDirection<T>, E>
    where
        F: FnMut(Direction) -> Result<T, E>,
    {
        Ok(PerDirection {
            north: f(Direction::North)?,
            south: f(Direction::South)?,
            east: f(Direction::East)?,
            west: f(Direction::West)?,
        })
    }

    pub fn splat(value: T) -> PerDirection<T>
    where
        T: Clone,
    {
        PerDirection::from_fn(|_| value.clone())
    }

    pub fn map<U, F: FnMut(Direction, &T) -> U>(&self, mut f: F) -> PerDirection<U> {
        PerDirection::from_fn(|direction| f(direction, &self[direction]))
    }

    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<PerDirection<U>, E>
    where
        F: FnMut(Direction, &T) -> Result<U, E>,
    {
        PerDirection::try_from_fn(|direction| f(direction, &self[direction]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL
            .into_iter()
            .map(move |direction| (direction, &self[direction]))
    }
}

impl<T> Index<Direction> for PerDirection<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &self.west,
        }
    }
}

impl<T> IndexMut<Direction> for PerDirection<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        match direction {
            Direction::North => &mut self.north,
            Direction::South => &mut self.south,
            Direction::East => &mut self.east,
            Direction::West => &mut self.west,
        }
    }
}

/// Amplitude samples of one measurement cycle, per direction.
pub type EchoSet = PerDirection<Vec<f64>>;

/// Interpolated zero-crossing positions (fractional sample indices), per direction.
pub type ZeroCrossingSet = PerDirection<Vec<f64>>;

/// Signed wind component in meters per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindSpeed(f64);

impl WindSpeed {
    pub fn new(meters_per_sec: f64) -> WindSpeed {
        WindSpeed(meters_per_sec)
    }

    pub fn meters_per_sec(&self) -> f64 {
        self.0
    }

    pub fn km_per_hour(&self) -> f64 {
        self.meters_per_sec() * 3.6
    }
}

/// Result of one wind measurement: a component per configured axis, in axis order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindReading {
    pub components: Vec<WindSpeed>,
    /// Set when the echoes were unusable and the components are the zero fallback,
    /// not a measured calm.
    pub degraded: bool,
}

impl WindReading {
    pub fn new(components: Vec<WindSpeed>) -> WindReading {
        WindReading {
            components,
            degraded: false,
        }
    }

    pub fn fallback(axes: usize) -> WindReading {
        WindReading {
            components: vec![WindSpeed::new(0.0); axes],
            degraded: true,
        }
    }

    /// Horizontal wind magnitude, treating the components as orthogonal.
    pub fn magnitude(&self) -> WindSpeed {
        let sum: f64 = self
            .components
            .iter()
            .map(|c| c.meters_per_sec() * c.meters_per_sec())
            .sum();
        WindSpeed::new(sum.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_direction_index_matches_fields() {
        let mut values = PerDirection::from_fn(|d| d as usize);
        assert_eq!(values[Direction::North], 0);
        assert_eq!(values[Direction::West], 3);

        values[Direction::East] = 10;
        assert_eq!(values.east, 10);
    }

    #[test]
    fn try_from_fn_stops_at_first_error() {
        let mut visited = Vec::new();
        let result: Result<PerDirection<u8>, Direction> = PerDirection::try_from_fn(|d| {
            visited.push(d);
            if d == Direction::South {
                Err(d)
            } else {
                Ok(1)
            }
        });
        assert_eq!(result, Err(Direction::South));
        assert_eq!(visited, vec![Direction::North, Direction::South]);
    }

    #[test]
    fn opposite_is_involution() {
        for direction in Direction::ALL {
            assert_ne!(direction.opposite(), direction);
            assert_eq!(direction.opposite().opposite(), direction);
        }
    }

    #[test]
    fn fallback_reading_is_flagged() {
        let reading = WindReading::fallback(2);
        assert!(reading.degraded);
        assert_eq!(reading.components, vec![WindSpeed::new(0.0); 2]);
        assert_eq!(reading.magnitude(), WindSpeed::new(0.0));
    }

    #[test]
    fn magnitude_and_units() {
        let reading = WindReading::new(vec![WindSpeed::new(3.0), WindSpeed::new(-4.0)]);
        assert_eq!(reading.magnitude().meters_per_sec(), 5.0);
        assert_eq!(WindSpeed::new(10.0).km_per_hour(), 36.0);
    }
}
