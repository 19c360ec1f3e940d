use candle_core::{DType, Device, Result, Tensor};

pub trait EncoderModuleT {
    /// An encoder that spits out the parameters of a diagonal
    /// Gaussian posterior over the latent states
    ///
    /// # Arguments
    /// * `x_nchw` - input images (n x c x h x w)
    /// * `train` - whether to use batchnorm statistics of this batch
    ///
    /// # Returns `(z_mean_nk, z_lnvar_nk)`
    /// * `z_mean_nk` - posterior mean (n x k)
    /// * `z_lnvar_nk` - posterior log variance (n x k)
    fn latent_gaussian_params(&self, x_nchw: &Tensor, train: bool) -> Result<(Tensor, Tensor)>;

    /// `(channels, height, width)` of the expected input
    fn dim_obs(&self) -> (usize, usize, usize);

    fn dim_latent(&self) -> usize;
}

pub trait DecoderModuleT {
    /// A decoder that spits out reconstructed images (n x c x h x w)
    /// from latent states `z_nk` (n x k)
    fn forward_t(&self, z_nk: &Tensor, train: bool) -> Result<Tensor>;

    /// `(channels, height, width)` of the reconstruction
    fn dim_obs(&self) -> (usize, usize, usize);

    fn dim_latent(&self) -> usize;

    fn dtype(&self) -> DType;

    fn device(&self) -> &Device;
}
