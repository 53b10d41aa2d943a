//! Spatial types: points, vectors, spacing and direction matrices.
//!
//! All types are thin nalgebra wrappers over `f64` storage.

pub mod direction;
pub mod point;
pub mod spacing;
pub mod vector;

pub use direction::Direction;
pub use point::Point;
pub use spacing::Spacing;
pub use vector::Vector;

pub type Point2 = Point<2>;
pub type Point3 = Point<3>;
pub type Point4 = Point<4>;
pub type Vector2 = Vector<2>;
pub type Vector3 = Vector<3>;
pub type Vector4 = Vector<4>;
pub type Spacing2 = Spacing<2>;
pub type Spacing3 = Spacing<3>;
pub type Spacing4 = Spacing<4>;
pub type Direction2 = Direction<2>;
pub type Direction3 = Direction<3>;
pub type Direction4 = Direction<4>;
