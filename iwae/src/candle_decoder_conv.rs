use crate::candle_aux_layers::*;
use crate::candle_iwae_config::IwaeConfig;
use crate::candle_model_traits::DecoderModuleT;
use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{Activation, Conv2d, ConvTranspose2d, Linear, Module, ModuleT, VarBuilder};

/// Transposed-convolution decoder mirroring `ConvGaussianEncoder`;
/// outputs lie in [-1, 1]
pub struct ConvDecoder {
    out_channels: usize,
    image_size: usize,
    latent_dim: usize,
    top_channels: usize,
    encoded_size: usize,
    dec_input: Linear,
    deconv: StackLayers<BatchNormed<ConvTranspose2d>>,
    final_deconv: BatchNormed<ConvTranspose2d>,
    final_conv: Conv2d,
}

impl DecoderModuleT for ConvDecoder {
    fn forward_t(&self, z_nk: &Tensor, train: bool) -> Result<Tensor> {
        let (n, k) = z_nk.dims2()?;
        if k != self.latent_dim {
            candle_core::bail!(
                "decoder expects latent dim {}, got {}",
                self.latent_dim,
                k
            );
        }

        let s = self.encoded_size;
        let h = self
            .dec_input
            .forward(z_nk)?
            .reshape((n, self.top_channels, s, s))?;
        let h = self.deconv.forward_t(&h, train)?;
        let h = self.final_deconv.forward_t(&h, train)?;
        let h = Activation::LeakyRelu(LEAKY_SLOPE).forward(&h)?;
        self.final_conv.forward(&h)?.tanh()
    }

    fn dim_obs(&self) -> (usize, usize, usize) {
        (self.out_channels, self.image_size, self.image_size)
    }

    fn dim_latent(&self) -> usize {
        self.latent_dim
    }

    fn dtype(&self) -> DType {
        self.dec_input.weight().dtype()
    }

    fn device(&self) -> &Device {
        self.dec_input.weight().device()
    }
}

impl ConvDecoder {
    /// Will create a new decoder module with these variables:
    ///
    /// * `dec.input.weight`
    /// * `dec.deconv.{}.deconv.*` and `dec.deconv.{}.bn.*`
    /// * `dec.final.deconv.*`, `dec.final.bn.*`, `dec.final.conv.*`
    ///
    /// # Arguments
    /// * `config` - architecture, validated by the caller
    /// * `vs` - variable builder
    pub fn new(config: &IwaeConfig, vs: VarBuilder) -> Result<Self> {
        let top_channels = config.top_channels();
        let encoded_size = config.encoded_size();

        // (1) K -> bottleneck
        let dec_input = candle_nn::linear(config.latent_dim, config.flat_dim(), vs.pp("dec.input"))?;

        // (2) walk back the hidden dims, doubling the size each time
        let reversed: Vec<usize> = config.hidden_dims.iter().rev().copied().collect();
        let mut deconv = StackLayers::<BatchNormed<ConvTranspose2d>>::new();
        for (j, dims) in reversed.windows(2).enumerate() {
            let _name = format!("dec.deconv.{}", j);
            deconv.push_with_act(
                conv_transpose_bn_block(dims[0], dims[1], vs.pp(_name))?,
                Activation::LeakyRelu(LEAKY_SLOPE),
            );
        }

        // (3) last doubling, then back to image channels
        let Some(&last_dim) = config.hidden_dims.first() else {
            candle_core::bail!("need at least one hidden layer");
        };
        let final_deconv = conv_transpose_bn_block(last_dim, last_dim, vs.pp("dec.final"))?;
        let conv_config = candle_nn::Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let final_conv = candle_nn::conv2d(
            last_dim,
            config.in_channels,
            3,
            conv_config,
            vs.pp("dec.final.conv"),
        )?;

        Ok(Self {
            out_channels: config.in_channels,
            image_size: config.image_size,
            latent_dim: config.latent_dim,
            top_channels,
            encoded_size,
            dec_input,
            deconv,
            final_deconv,
            final_conv,
        })
    }
}
