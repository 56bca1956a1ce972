//! Spatial types shared by the proximity crates: vectors, tracked positions and distances.
#![forbid(unsafe_code)]

use core::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::time::Instant;

/// Point or offset in world space, meters. `y` is the vertical axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(self, rhs: Vec3) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Length projected onto the horizontal (x/z) plane.
    #[inline]
    pub fn length_horizontal(self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    #[inline]
    fn sub_assign(&mut self, rhs: Vec3) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Euclidean distance over all three axes.
#[inline]
pub fn distance_3d(a: Vec3, b: Vec3) -> f32 {
    (a - b).length()
}

/// Euclidean distance over x and z; the vertical axis is ignored.
#[inline]
pub fn distance_horizontal(a: Vec3, b: Vec3) -> f32 {
    (a - b).length_horizontal()
}

/// Yaw in degrees about the vertical axis for a unit quaternion `(x, y, z, w)`.
pub fn heading_from_quaternion(x: f32, y: f32, z: f32, w: f32) -> f32 {
    let siny = 2.0 * (w * y + x * z);
    let cosy = 1.0 - 2.0 * (x * x + y * y);
    siny.atan2(cosy).to_degrees()
}

/// One sighting of an identity. Replaced wholesale on every update.
#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub id: String,
    pub name: String,
    pub coords: Vec3,
    /// Degrees about the vertical axis, when the source reports one.
    pub heading: Option<f32>,
    pub captured_at: Instant,
}

impl Position {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        coords: Vec3,
        captured_at: Instant,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coords,
            heading: None,
            captured_at,
        }
    }

    pub fn with_heading(mut self, heading: f32) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Distance to `other`, over three axes or horizontally only.
    #[inline]
    pub fn distance_to(&self, other: &Position, use_vertical: bool) -> f32 {
        if use_vertical {
            distance_3d(self.coords, other.coords)
        } else {
            distance_horizontal(self.coords, other.coords)
        }
    }

    /// Age of this sighting at `now`; zero if `now` precedes the capture.
    #[inline]
    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.captured_at)
    }
}
