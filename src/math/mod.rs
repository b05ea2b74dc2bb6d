//! Linear algebra used by every transform and geometric test.

pub mod matrix;
pub mod vector;

pub use matrix::SquareMatrix;
pub use vector::Vector;
