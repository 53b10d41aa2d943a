//! Image geometry: the mapping between index space and physical space.

use nalgebra::SMatrix;

use crate::error::{CoreError, Result};
use crate::spatial::{Direction, Point, Spacing, Vector};

/// Physical layout of a D-dimensional image grid.
///
/// Index axis 0 varies fastest in memory (x, then y, then z, then t).
/// The last index axis of a stack image is the timepoint axis.
///
/// * index → physical: `p = origin + Direction · diag(spacing) · c`
/// * physical → index: `c = (Direction · diag(spacing))⁻¹ · (p − origin)`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry<const D: usize> {
    size: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    index_to_physical: SMatrix<f64, D, D>,
    physical_to_index: SMatrix<f64, D, D>,
}

impl<const D: usize> ImageGeometry<D> {
    /// Create a geometry, validating size, spacing and direction.
    pub fn new(
        size: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Result<Self> {
        if size.iter().any(|&s| s == 0) {
            return Err(CoreError::invalid_geometry(format!(
                "image size must be non-zero along every axis, got {:?}",
                size
            )));
        }
        if !spacing.is_valid() {
            return Err(CoreError::invalid_geometry(format!(
                "spacing must be positive and finite, got {:?}",
                spacing.to_vec()
            )));
        }
        let index_to_physical = direction.0 * SMatrix::from_diagonal(&spacing.0);
        let physical_to_index = index_to_physical
            .try_inverse()
            .ok_or_else(|| CoreError::invalid_geometry("direction matrix is singular"))?;

        Ok(Self {
            size,
            origin,
            spacing,
            direction,
            index_to_physical,
            physical_to_index,
        })
    }

    /// Unit spacing, zero origin, identity direction.
    pub fn with_size(size: [usize; D]) -> Result<Self> {
        Self::new(size, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    /// Extent along every index axis.
    pub fn size(&self) -> [usize; D] {
        self.size
    }

    /// Physical coordinate of index `(0, .., 0)`.
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Index of the last (slowest varying) axis.
    pub fn last_axis(&self) -> usize {
        D - 1
    }

    /// Extent along the last axis, i.e. the number of timepoints of a stack.
    pub fn last_axis_size(&self) -> usize {
        self.size[D - 1]
    }

    /// Total number of pixels.
    pub fn number_of_pixels(&self) -> usize {
        self.size.iter().product()
    }

    /// Map a physical point to a continuous index.
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        let diff = *point - self.origin;
        Point((self.physical_to_index * diff.0).into())
    }

    /// Map a continuous index to a physical point.
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        self.origin + Vector(self.index_to_physical * index.0.coords)
    }

    /// Map a discrete index to a physical point.
    pub fn transform_index_to_physical_point(&self, index: &[usize; D]) -> Point<D> {
        let mut cindex = Point::origin();
        for (axis, &i) in index.iter().enumerate() {
            cindex[axis] = i as f64;
        }
        self.transform_continuous_index_to_physical_point(&cindex)
    }

    /// True when every coordinate lies in `[0, size - 1]`.
    pub fn is_inside_buffer(&self, cindex: &Point<D>) -> bool {
        (0..D).all(|axis| {
            let c = cindex[axis];
            c.is_finite() && c >= 0.0 && c <= (self.size[axis] - 1) as f64
        })
    }

    /// Convert a gradient taken with respect to the continuous index into a
    /// gradient with respect to physical coordinates.
    pub fn gradient_to_physical(&self, index_gradient: &Vector<D>) -> Vector<D> {
        Vector(self.physical_to_index.transpose() * index_gradient.0)
    }

    /// Linear offset of a discrete index (axis 0 fastest).
    pub fn offset(&self, index: &[usize; D]) -> usize {
        let mut offset = 0;
        let mut stride = 1;
        for axis in 0..D {
            offset += index[axis] * stride;
            stride *= self.size[axis];
        }
        offset
    }

    /// Inverse of [`offset`](Self::offset).
    pub fn index_from_offset(&self, mut offset: usize) -> [usize; D] {
        let mut index = [0; D];
        for axis in 0..D {
            index[axis] = offset % self.size[axis];
            offset /= self.size[axis];
        }
        index
    }
}
