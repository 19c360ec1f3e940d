use candle_core::{DType, Device, Tensor};
use ndarray::Array4;

/// Moving image batches between `ndarray` and `Tensor`
pub trait ConvertImageOps {
    type Image;

    /// Read off a rank-4 `(n, c, h, w)` tensor; a rank-5
    /// `(b, s, c, h, w)` tensor, e.g. importance-sampled
    /// reconstructions, is folded into `(b * s, c, h, w)`
    fn from_tensor(x: &Tensor) -> anyhow::Result<Self::Image>;

    fn to_tensor(&self, dev: &Device) -> anyhow::Result<Tensor>;
}

impl ConvertImageOps for Array4<f32> {
    type Image = Self;

    fn from_tensor(x: &Tensor) -> anyhow::Result<Self::Image> {
        let x = match x.rank() {
            4 => x.clone(),
            5 => {
                let (b, s, c, h, w) = x.dims5()?;
                x.reshape((b * s, c, h, w))?
            }
            _ => anyhow::bail!("expected a rank 4 or 5 image tensor: {:?}", x.dims()),
        };
        let (n, c, h, w) = x.dims4()?;
        let data = x.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(Array4::from_shape_vec((n, c, h, w), data)?)
    }

    fn to_tensor(&self, dev: &Device) -> anyhow::Result<Tensor> {
        let (n, c, h, w) = self.dim();
        let data: Vec<f32> = self.iter().copied().collect();
        Ok(Tensor::from_vec(data, (n, c, h, w), dev)?)
    }
}

/// Map pixel intensities in [0, 1] onto the decoder's [-1, 1]
pub fn scale_to_unit_range(x: &Tensor) -> candle_core::Result<Tensor> {
    (x * 2.)? - 1.
}

/// Map decoder output in [-1, 1] back onto [0, 1]
pub fn unscale_from_unit_range(x: &Tensor) -> candle_core::Result<Tensor> {
    ((x + 1.)? * 0.5)?.clamp(0_f32, 1_f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ndarray_layout_is_nchw() -> anyhow::Result<()> {
        let dev = Device::Cpu;
        let arr = Array4::<f32>::from_shape_fn((2, 3, 4, 5), |(n, c, h, w)| {
            (n * 1000 + c * 100 + h * 10 + w) as f32
        });
        let x = arr.to_tensor(&dev)?;
        assert_eq!(x.dims(), &[2, 3, 4, 5]);

        let v = x.get(1)?.get(2)?.get(3)?.get(4)?.to_scalar::<f32>()?;
        assert_abs_diff_eq!(v, 1234.0);

        let back = Array4::<f32>::from_tensor(&x)?;
        assert_eq!(back, arr);
        Ok(())
    }

    #[test]
    fn folds_sample_axis() -> anyhow::Result<()> {
        let dev = Device::Cpu;
        let x = Tensor::zeros((2, 3, 1, 4, 4), DType::F32, &dev)?;
        let arr = Array4::<f32>::from_tensor(&x)?;
        assert_eq!(arr.dim(), (6, 1, 4, 4));

        let bad = Tensor::zeros((2, 3), DType::F32, &dev)?;
        assert!(Array4::<f32>::from_tensor(&bad).is_err());
        Ok(())
    }

    #[test]
    fn unit_range_scaling() -> anyhow::Result<()> {
        let dev = Device::Cpu;
        let x = Tensor::new(&[0f32, 0.25, 1.0], &dev)?;
        let y: Vec<f32> = scale_to_unit_range(&x)?.to_vec1()?;
        assert_eq!(y, vec![-1.0, -0.5, 1.0]);
        let z: Vec<f32> = unscale_from_unit_range(&scale_to_unit_range(&x)?)?.to_vec1()?;
        for (a, b) in z.iter().zip([0f32, 0.25, 1.0].iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
        Ok(())
    }
}
