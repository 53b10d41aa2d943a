//! Device image: tensor pixel data plus physical geometry.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use crate::error::{CoreError, Result};
use crate::image::{HostImage, ImageGeometry};
use crate::spatial::{Direction, Point, Spacing};

/// Medical image whose pixels live on a burn backend (CPU or GPU).
///
/// The tensor is stored slowest axis first, so a 4-D stack has shape
/// `[T, Z, Y, X]` while indices and points are written `(x, y, z, t)`.
///
/// # Examples
/// ```rust
/// use groupreg_core::Image;
/// use groupreg_core::spatial::{Point3, Spacing3, Direction3};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([4, 5, 6], &device);
/// let image = Image::new(
///     data,
///     Point3::new([0.0, 0.0, 0.0]),
///     Spacing3::new([1.0, 1.0, 1.0]),
///     Direction3::identity(),
/// ).unwrap();
/// assert_eq!(image.geometry().size(), [6, 5, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    geometry: ImageGeometry<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create an image from tensor data and physical metadata.
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Result<Self> {
        let dims = data.dims();
        let mut size = [0usize; D];
        for axis in 0..D {
            size[axis] = dims[D - 1 - axis];
        }
        let geometry = ImageGeometry::new(size, origin, spacing, direction)?;
        Ok(Self { data, geometry })
    }

    /// Upload a host image to `device`.
    pub fn from_host(host: &HostImage<D>, device: &B::Device) -> Self {
        let size = host.geometry().size();
        let mut dims = [0usize; D];
        for axis in 0..D {
            dims[D - 1 - axis] = size[axis];
        }
        let values: Vec<f32> = host.values().iter().map(|&v| v as f32).collect();
        let data = Tensor::<B, D>::from_data(TensorData::new(values, Shape::new(dims)), device);
        Self {
            data,
            geometry: host.geometry().clone(),
        }
    }

    /// The pixel tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn geometry(&self) -> &ImageGeometry<D> {
        &self.geometry
    }

    /// Tensor shape, slowest axis first.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Copy the pixels to host memory.
    pub fn to_host(&self) -> Result<HostImage<D>> {
        let values = self
            .data
            .clone()
            .into_data()
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|e| CoreError::TensorData(format!("{:?}", e)))?;
        HostImage::new(self.geometry.clone(), values)
    }

    /// Batch-map physical points `[Batch, D]` to continuous indices `[Batch, D]`.
    ///
    /// `I = (P - O) · Mᵀ` with `M = (Direction · diag(spacing))⁻¹`.
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let origin = self.geometry.origin();
        let origin_vec: Vec<f32> = (0..D).map(|i| origin[i] as f32).collect();
        let origin_tensor =
            Tensor::<B, 1>::from_data(TensorData::new(origin_vec, Shape::new([D])), &device)
                .reshape([1, D]);

        // Row r of the right operand holds column r of M: t[r, c] = M[c, r].
        let mut t_data = vec![0.0f32; D * D];
        for c in 0..D {
            let mut shifted = *origin;
            shifted[c] += 1.0;
            let column = self
                .geometry
                .transform_physical_point_to_continuous_index(&shifted);
            for r in 0..D {
                t_data[c * D + r] = column[r] as f32;
            }
        }
        let t_tensor = Tensor::<B, 2>::from_data(TensorData::new(t_data, Shape::new([D, D])), &device);

        (points - origin_tensor).matmul(t_tensor)
    }
}
