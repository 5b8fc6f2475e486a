//! Spatial value types for scripts (3-vectors and rotations)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-component vector (positions, velocities, colors)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vector) -> Vector {
        Vector::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Vector) -> Vector {
        Vector::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, factor: f64) -> Vector {
        Vector::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn dot(self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vector) -> Vector {
        Vector::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length of the vector
    pub fn magnitude(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalize(self) -> Vector {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector::ZERO
        } else {
            self.scale(1.0 / mag)
        }
    }

    /// Rotate this vector by a rotation
    pub fn rotate(self, rot: Rotation) -> Vector {
        let q = Rotation::new(self.x, self.y, self.z, 0.0);
        let r = rot.conjugate().mul(q).mul(rot);
        Vector::new(r.x, r.y, r.z)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:.5}, {:.5}, {:.5}>", self.x, self.y, self.z)
    }
}

/// Quaternion rotation (`s` is the real part)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub s: f64,
}

impl Rotation {
    pub const IDENTITY: Rotation = Rotation::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64, s: f64) -> Self {
        Self { x, y, z, s }
    }

    /// Hamilton product, applying `self` first and then `other`
    pub fn mul(self, other: Rotation) -> Rotation {
        let (a, b) = (other, self);
        Rotation::new(
            a.s * b.x + a.x * b.s + a.y * b.z - a.z * b.y,
            a.s * b.y - a.x * b.z + a.y * b.s + a.z * b.x,
            a.s * b.z + a.x * b.y - a.y * b.x + a.z * b.s,
            a.s * b.s - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }

    pub fn conjugate(self) -> Rotation {
        Rotation::new(-self.x, -self.y, -self.z, self.s)
    }

    pub fn add(self, other: Rotation) -> Rotation {
        Rotation::new(self.x + other.x, self.y + other.y, self.z + other.z, self.s + other.s)
    }

    pub fn sub(self, other: Rotation) -> Rotation {
        Rotation::new(self.x - other.x, self.y - other.y, self.z - other.z, self.s - other.s)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:.5}, {:.5}, {:.5}, {:.5}>", self.x, self.y, self.z, self.s)
    }
}
