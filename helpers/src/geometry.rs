use approx::ulps_eq;
use serde::{Deserialize, Serialize};

// 2D ----------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

impl Point2d {
    pub fn as_vector2d(&self) -> Vector2d {
        Vector2d {
            dx: self.x,
            dy: self.y,
        }
    }

    pub fn shift(&self, other: &Vector2d) -> Point2d {
        self.as_vector2d().add(other).as_point2d()
    }

    /// with_height lifts the point into 3D, e.g. to place a car on a banked track surface.
    pub fn with_height(&self, z: f64) -> Point3d {
        Point3d {
            x: self.x,
            y: self.y,
            z,
        }
    }
}

impl PartialEq for Point2d {
    fn eq(&self, other: &Self) -> bool {
        ulps_eq!(self.x, other.x) && ulps_eq!(self.y, other.y)
    }
}

#[derive(Debug, Clone)]
pub struct Vector2d {
    pub dx: f64,
    pub dy: f64,
}

impl Vector2d {
    pub fn as_point2d(&self) -> Point2d {
        Point2d {
            x: self.dx,
            y: self.dy,
        }
    }

    pub fn sub(&self, other: &Self) -> Vector2d {
        Vector2d {
            dx: self.dx - other.dx,
            dy: self.dy - other.dy,
        }
    }

    pub fn add(&self, other: &Self) -> Vector2d {
        Vector2d {
            dx: self.dx + other.dx,
            dy: self.dy + other.dy,
        }
    }

    pub fn mult(&self, k: f64) -> Vector2d {
        Vector2d {
            dx: self.dx * k,
            dy: self.dy * k,
        }
    }

    /// rotated returns the vector rotated counter-clockwise by the given angle in radians.
    pub fn rotated(&self, angle: f64) -> Vector2d {
        let (sin_a, cos_a) = angle.sin_cos();
        Vector2d {
            dx: self.dx * cos_a - self.dy * sin_a,
            dy: self.dx * sin_a + self.dy * cos_a,
        }
    }

    pub fn abs(&self) -> f64 {
        (self.dx.powf(2.0) + self.dy.powf(2.0)).sqrt()
    }

    pub fn normal_vector(&self) -> Vector2d {
        Vector2d {
            dx: -self.dy,
            dy: self.dx,
        }
    }

    pub fn normalized(&self) -> Vector2d {
        self.mult(1.0 / self.abs())
    }
}

impl PartialEq for Vector2d {
    fn eq(&self, other: &Self) -> bool {
        ulps_eq!(self.dx, other.dx) && ulps_eq!(self.dy, other.dy)
    }
}

// 3D ----------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Point3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PartialEq for Point3d {
    fn eq(&self, other: &Self) -> bool {
        ulps_eq!(self.x, other.x) && ulps_eq!(self.y, other.y) && ulps_eq!(self.z, other.z)
    }
}
