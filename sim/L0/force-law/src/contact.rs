//! Contact point state shared with the outer solver.
//!
//! The outer solver owns the contact list; laws read the gap data and write
//! only the force slot `la`. Contours are referred to by [`ContourId`] handles
//! issued by a [`ContourArena`].

use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ForceLawError, Result};

/// Stable handle of a contour registered in a [`ContourArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContourId(pub usize);

impl ContourId {
    /// Get the raw index.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ContourId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Contour({})", self.0)
    }
}

/// A registered contour: its name and characteristic length.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contour {
    /// Unique name, used by configuration files to reference the contour.
    pub name: String,
    /// Characteristic length (e.g. radius or edge length). Always positive.
    pub characteristic_length: f64,
}

/// Registry of contours handing out [`ContourId`]s.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContourArena {
    contours: Vec<Contour>,
}

impl ContourArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contour.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::DegenerateContour`] for a non-positive or
    /// non-finite characteristic length and [`ForceLawError::InvalidConfig`]
    /// if the name is already taken.
    pub fn insert(&mut self, name: impl Into<String>, characteristic_length: f64) -> Result<ContourId> {
        let name = name.into();
        if !characteristic_length.is_finite() || characteristic_length <= 0.0 {
            return Err(ForceLawError::DegenerateContour {
                name,
                length: characteristic_length,
            });
        }
        if self.find(&name).is_some() {
            return Err(ForceLawError::invalid_config(format!(
                "contour '{name}' registered twice"
            )));
        }
        let id = ContourId(self.contours.len());
        self.contours.push(Contour {
            name,
            characteristic_length,
        });
        Ok(id)
    }

    /// Look up a contour by handle.
    #[must_use]
    pub fn get(&self, id: ContourId) -> Option<&Contour> {
        self.contours.get(id.0)
    }

    /// Look up a contour handle by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ContourId> {
        self.contours.iter().position(|c| c.name == name).map(ContourId)
    }

    /// Check that a handle belongs to this arena.
    pub fn check(&self, id: ContourId) -> Result<&Contour> {
        self.get(id).ok_or_else(|| ForceLawError::UnknownContour {
            name: id.to_string(),
        })
    }

    /// Number of registered contours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }
}

/// Index of a contact point: `(kinematics, point)` into the outer contact list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactIndex {
    /// Index of the contact kinematics (contour pair).
    pub kinematics: usize,
    /// Index of the point within that kinematics.
    pub point: usize,
}

impl ContactIndex {
    /// Create a contact index.
    #[must_use]
    pub const fn new(kinematics: usize, point: usize) -> Self {
        Self { kinematics, point }
    }
}

/// State of a single contact point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SingleContact {
    /// The two contours in contact.
    pub contours: [ContourId; 2],
    /// Contour parameters of the contact point on each contour.
    pub zeta: [Vector2<f64>; 2],
    /// Normal gap; negative means penetration.
    pub g: f64,
    /// Normal gap velocity.
    pub gd: f64,
    /// Normal force slot written by the law.
    pub la: f64,
}

impl SingleContact {
    /// Create a contact between two contours with zero state.
    #[must_use]
    pub fn new(first: ContourId, second: ContourId) -> Self {
        Self {
            contours: [first, second],
            zeta: [Vector2::zeros(), Vector2::zeros()],
            g: 0.0,
            gd: 0.0,
            la: 0.0,
        }
    }

    /// Set the gap and gap velocity.
    #[must_use]
    pub fn with_gap(mut self, g: f64, gd: f64) -> Self {
        self.g = g;
        self.gd = gd;
        self
    }

    /// Set the contour parameters of the contact point.
    #[must_use]
    pub fn with_zeta(mut self, first: Vector2<f64>, second: Vector2<f64>) -> Self {
        self.zeta = [first, second];
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_insert_and_find() {
        let mut arena = ContourArena::new();
        let a = arena.insert("plane", 1.0).unwrap();
        let b = arena.insert("ball", 0.1).unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.find("ball"), Some(b));
        assert_eq!(arena.get(a).unwrap().name, "plane");
        assert_eq!(arena.len(), 2);
        assert!(arena.find("missing").is_none());
    }

    #[test]
    fn test_arena_rejects_degenerate_contour() {
        let mut arena = ContourArena::new();
        let err = arena.insert("line", 0.0).unwrap_err();
        assert!(matches!(err, ForceLawError::DegenerateContour { .. }));
        assert!(arena.insert("nan", f64::NAN).is_err());
        assert!(arena.is_empty());
    }

    #[test]
    fn test_arena_rejects_duplicate_name() {
        let mut arena = ContourArena::new();
        arena.insert("plane", 1.0).unwrap();
        assert!(arena.insert("plane", 2.0).unwrap_err().is_config_error());
    }

    #[test]
    fn test_unknown_handle() {
        let arena = ContourArena::new();
        assert!(matches!(
            arena.check(ContourId(3)),
            Err(ForceLawError::UnknownContour { .. })
        ));
    }
}
