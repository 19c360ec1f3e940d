use crate::candle_aux_layers::*;
use crate::candle_iwae_config::IwaeConfig;
use crate::candle_model_traits::EncoderModuleT;
use candle_core::{Result, Tensor};
use candle_nn::{Activation, Conv2d, Linear, Module, ModuleT, VarBuilder};

/// Convolutional encoder of square images into a diagonal Gaussian
pub struct ConvGaussianEncoder {
    in_channels: usize,
    image_size: usize,
    latent_dim: usize,
    conv: StackLayers<BatchNormed<Conv2d>>,
    z_mean: Linear,
    z_lnvar: Linear,
}

impl EncoderModuleT for ConvGaussianEncoder {
    ///
    /// Evaluate latent Gaussian parameters: mu and log_var
    /// z ~ (mu(x), log_var(x))
    fn latent_gaussian_params(&self, x_nchw: &Tensor, train: bool) -> Result<(Tensor, Tensor)> {
        let min_lv = -8.; // stabilize
        let max_lv = 8.; // log variance

        self.check_input(x_nchw)?;

        let h_nchw = self.conv.forward_t(x_nchw, train)?;
        let h_nl = h_nchw.flatten_from(1)?;
        let z_mean_nk = self.z_mean.forward(&h_nl)?;
        let z_lnvar_nk = self.z_lnvar.forward(&h_nl)?.clamp(min_lv, max_lv)?;
        Ok((z_mean_nk, z_lnvar_nk))
    }

    fn dim_obs(&self) -> (usize, usize, usize) {
        (self.in_channels, self.image_size, self.image_size)
    }

    fn dim_latent(&self) -> usize {
        self.latent_dim
    }
}

impl ConvGaussianEncoder {
    fn check_input(&self, x_nchw: &Tensor) -> Result<()> {
        if x_nchw.rank() != 4 {
            candle_core::bail!(
                "encoder expects (n, c, h, w) images, got {:?}",
                x_nchw.dims()
            );
        }
        let (_, c, h, w) = x_nchw.dims4()?;
        if c != self.in_channels || h != self.image_size || w != self.image_size {
            candle_core::bail!(
                "encoder expects ({}, {}, {}) images, got ({}, {}, {})",
                self.in_channels,
                self.image_size,
                self.image_size,
                c,
                h,
                w
            );
        }
        Ok(())
    }

    /// Will create a new convolutional encoder module
    /// with these variables:
    ///
    /// * `enc.conv.{}.conv.*` and `enc.conv.{}.bn.*` where {} is the block index
    /// * `enc.z.mean.weight`
    /// * `enc.z.lnvar.weight`
    ///
    /// # Arguments
    /// * `config` - architecture, validated by the caller
    /// * `vs` - variable builder
    pub fn new(config: &IwaeConfig, vs: VarBuilder) -> Result<Self> {
        // (1) image -> stride-2 conv blocks
        let mut conv = StackLayers::<BatchNormed<Conv2d>>::new();
        let mut prev_dim = config.in_channels;
        for (j, &next_dim) in config.hidden_dims.iter().enumerate() {
            let _name = format!("enc.conv.{}", j);
            conv.push_with_act(
                conv_bn_block(prev_dim, next_dim, vs.pp(_name))?,
                Activation::LeakyRelu(LEAKY_SLOPE),
            );
            prev_dim = next_dim;
        }

        // (2) flattened bottleneck -> K
        let flat_dim = config.flat_dim();
        let z_mean = candle_nn::linear(flat_dim, config.latent_dim, vs.pp("enc.z.mean"))?;
        let z_lnvar = candle_nn::linear(flat_dim, config.latent_dim, vs.pp("enc.z.lnvar"))?;

        Ok(Self {
            in_channels: config.in_channels,
            image_size: config.image_size,
            latent_dim: config.latent_dim,
            conv,
            z_mean,
            z_lnvar,
        })
    }
}
