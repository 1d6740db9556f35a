use crate::Point;
use crate::geom::EPS;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Direction or displacement in 3-D, also used for velocity and intensity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl Vector {
    pub fn new(dx: f64, dy: f64, dz: f64) -> Self {
        Self { dx, dy, dz }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Vector pointing from `beg` to `end`.
    pub fn from_points(beg: Point, end: Point) -> Self {
        Self::new(end.x - beg.x, end.y - beg.y, end.z - beg.z)
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.dy * other.dz - self.dz * other.dy,
            self.dz * other.dx - self.dx * other.dz,
            self.dx * other.dy - self.dy * other.dx,
        )
    }

    pub fn dot(self, other: Self) -> f64 {
        self.dx * other.dx + self.dy * other.dy + self.dz * other.dz
    }

    pub fn length(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    pub fn is_close(&self, other: &Self) -> bool {
        (*self - *other).to_abs_max() < EPS
    }

    /// Unit vector with the same direction, `None` for a (near) zero vector.
    pub fn normalize(&self) -> Option<Self> {
        let len = self.length();
        (len >= EPS).then(|| *self * (1. / len))
    }

    fn to_abs_max(self) -> f64 {
        self.dx.abs().max(self.dy.abs()).max(self.dz.abs())
    }
}

impl Add for Vector {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.dx + other.dx, self.dy + other.dy, self.dz + other.dz)
    }
}

impl Sub for Vector {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        self + -other
    }
}

impl Neg for Vector {
    type Output = Self;
    fn neg(self) -> Self {
        self * -1.
    }
}

impl Mul<f64> for Vector {
    type Output = Self;
    fn mul(self, k: f64) -> Self {
        Self::new(self.dx * k, self.dy * k, self.dz * k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_normal() {
        let p0 = Point::new(0., 0., 0.);
        let p1 = Point::new(2., 0., 0.);
        let p2 = Point::new(0., 3., 0.);
        let n = Vector::from_points(p0, p1).cross(Vector::from_points(p0, p2));
        assert!(n.is_close(&Vector::new(0., 0., 6.)));
        assert_eq!(n.dot(Vector::new(1., 1., 0.)), 0.);
    }

    #[test]
    fn test_operators() {
        let a = Vector::new(1., -2., 3.);
        let b = Vector::new(0.5, 0.5, 0.5);
        assert!((a - b).is_close(&Vector::new(0.5, -2.5, 2.5)));
        assert!((a + -a).is_close(&Vector::zero()));
        assert!((b * 4.).is_close(&Vector::new(2., 2., 2.)));
    }

    #[test]
    fn test_normalize() {
        let v = Vector::new(0., -4., 3.).normalize();
        assert!(v.is_some_and(|v| v.is_close(&Vector::new(0., -0.8, 0.6))));
        assert!(Vector::zero().normalize().is_none());
    }
}
