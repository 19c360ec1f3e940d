use crate::candle_decoder_conv::ConvDecoder;
use crate::candle_encoder_conv::ConvGaussianEncoder;
use crate::candle_iwae_config::IwaeConfig;
use crate::candle_loss_functions::*;
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};

use candle_core::{DType, Result, Tensor};
use candle_nn::VarBuilder;
use log::{debug, info};

/// Importance-weighted autoencoder
///
/// Draws `num_samples` latent states per image from the encoder's
/// Gaussian and trains on the importance-weighted bound over them.
pub struct Iwae<Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    pub encoder: Enc,
    pub decoder: Dec,
    num_samples: usize,
}

/// The convolutional model built from an `IwaeConfig`
pub type ConvIwae = Iwae<ConvGaussianEncoder, ConvDecoder>;

/// Everything `forward_t` computed, kept for `loss`
pub struct IwaeForward {
    /// reconstructions (b x s x c x h x w)
    pub recon: Tensor,
    /// input images (b x c x h x w)
    pub input: Tensor,
    /// posterior mean (b x k)
    pub z_mean: Tensor,
    /// posterior log variance (b x k)
    pub z_lnvar: Tensor,
    /// latent draws (b x s x k)
    pub z: Tensor,
    /// standardized draws (z - mean) / std (b x s x k)
    pub eps: Tensor,
}

/// Importance-weighted loss and its components
pub struct IwaeLoss {
    /// scalar to minimize
    pub loss: Tensor,
    /// average squared error over pixels, samples and images
    pub reconstruction_loss: f32,
    /// average log p(z) - log q(z|x) over samples and images
    pub kld: f32,
    /// closed-form KL(q(z|x) || p(z)) averaged over images
    pub analytic_kld: f32,
    /// average log (1/S) sum_s w(s), the bound itself
    pub iw_bound: f32,
}

impl IwaeLoss {
    pub fn metrics(&self) -> [(&'static str, f32); 4] {
        [
            ("reconstruction_loss", self.reconstruction_loss),
            ("kld", self.kld),
            ("analytic_kld", self.analytic_kld),
            ("iw_bound", self.iw_bound),
        ]
    }
}

fn scalar_f32(x: &Tensor) -> Result<f32> {
    x.to_dtype(DType::F32)?.to_scalar::<f32>()
}

impl ConvIwae {
    /// Build the convolutional encoder and decoder
    ///
    /// * `enc.*` - encoder variables (see `ConvGaussianEncoder::new`)
    /// * `dec.*` - decoder variables (see `ConvDecoder::new`)
    pub fn new(config: &IwaeConfig, vs: VarBuilder) -> Result<Self> {
        config.validate()?;

        let encoder = ConvGaussianEncoder::new(config, vs.clone())?;
        let decoder = ConvDecoder::new(config, vs)?;

        info!(
            "IWAE: {}x{}x{} images, hidden {:?}, bottleneck {}x{}x{}, latent {}, {} samples",
            config.in_channels,
            config.image_size,
            config.image_size,
            config.hidden_dims,
            config.top_channels(),
            config.encoded_size(),
            config.encoded_size(),
            config.latent_dim,
            config.num_samples
        );

        Self::build(encoder, decoder, config.num_samples)
    }
}

impl<Enc, Dec> Iwae<Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    /// Pair up an encoder and a decoder
    /// * `encoder` - encoder module
    /// * `decoder` - decoder module
    /// * `num_samples` - importance samples per image
    pub fn build(encoder: Enc, decoder: Dec, num_samples: usize) -> Result<Self> {
        if encoder.dim_latent() != decoder.dim_latent() {
            candle_core::bail!(
                "latent dims differ: encoder {} vs. decoder {}",
                encoder.dim_latent(),
                decoder.dim_latent()
            );
        }
        if encoder.dim_obs() != decoder.dim_obs() {
            candle_core::bail!(
                "image dims differ: encoder {:?} vs. decoder {:?}",
                encoder.dim_obs(),
                decoder.dim_obs()
            );
        }
        if num_samples == 0 {
            candle_core::bail!("num_samples must be positive");
        }
        Ok(Self {
            encoder,
            decoder,
            num_samples,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn dim_latent(&self) -> usize {
        self.encoder.dim_latent()
    }

    /// `(channels, height, width)`
    pub fn dim_obs(&self) -> (usize, usize, usize) {
        self.encoder.dim_obs()
    }

    /// # Returns `(z_mean_bk, z_lnvar_bk)`
    pub fn encode(&self, x_bchw: &Tensor, train: bool) -> Result<(Tensor, Tensor)> {
        self.encoder.latent_gaussian_params(x_bchw, train)
    }

    /// `z` (n x k) gives (n x c x h x w); `z` (b x s x k) gives
    /// (b x s x c x h x w)
    pub fn decode(&self, z: &Tensor, train: bool) -> Result<Tensor> {
        match z.rank() {
            2 => self.decoder.forward_t(z, train),
            3 => {
                let (b, s, k) = z.dims3()?;
                let x_nchw = self.decoder.forward_t(&z.reshape((b * s, k))?, train)?;
                let (_, c, h, w) = x_nchw.dims4()?;
                x_nchw.reshape((b, s, c, h, w))
            }
            _ => candle_core::bail!("latent states must be rank 2 or 3, got {:?}", z.dims()),
        }
    }

    ///
    /// z = mu + sigma * eps
    /// where eps ~ N(0, 1), `num_samples` times per row
    ///
    /// # Arguments
    /// * `z_mean` - mean of Gaussian distribution (b x k)
    /// * `z_lnvar` - log variance of Gaussian distribution (b x k)
    ///
    /// # Returns `(z_bsk, eps_bsk)`
    pub fn reparameterize(&self, z_mean: &Tensor, z_lnvar: &Tensor) -> Result<(Tensor, Tensor)> {
        let (b, k) = z_mean.dims2()?;
        let shape = (b, self.num_samples, k);

        let mean_bsk = z_mean.unsqueeze(1)?.broadcast_as(shape)?;
        let std_bsk = (z_lnvar * 0.5)?.exp()?.unsqueeze(1)?.broadcast_as(shape)?;
        let noise_bsk = Tensor::randn_like(&mean_bsk, 0., 1.)?;

        let z_bsk = (&mean_bsk + (&std_bsk * &noise_bsk)?)?;
        let eps_bsk = ((&z_bsk - &mean_bsk)? / &std_bsk)?;
        Ok((z_bsk, eps_bsk))
    }

    /// encode -> sample -> decode
    pub fn forward_t(&self, x_bchw: &Tensor, train: bool) -> Result<IwaeForward> {
        let (z_mean, z_lnvar) = self.encode(x_bchw, train)?;
        let (z, eps) = self.reparameterize(&z_mean, &z_lnvar)?;
        let recon = self.decode(&z, train)?;
        debug!(
            "forward: input {:?} -> latent {:?} -> recon {:?}",
            x_bchw.dims(),
            z.dims(),
            recon.dims()
        );
        Ok(IwaeForward {
            recon,
            input: x_bchw.clone(),
            z_mean,
            z_lnvar,
            z,
            eps,
        })
    }

    /// Importance-weighted loss
    ///
    /// log w(b,s) = -err(b,s) + log p(z) - log q(z|x)
    /// w(b,s) = softmax_s log w(b,s), held constant
    /// loss = mean_b sum_s w(b,s) * [err(b,s) + kld_weight * (log q - log p)]
    ///
    /// # Arguments
    /// * `fwd` - output of `forward_t`
    /// * `kld_weight` - scale of the divergence term, e.g., minibatch
    ///   size over the number of training images
    pub fn loss(&self, fwd: &IwaeForward, kld_weight: f64) -> Result<IwaeLoss> {
        let recon_err_bs = mean_squared_error(&fwd.recon, &fwd.input.unsqueeze(1)?, 2)?;

        let log_q_bs = diagonal_gaussian_log_density(&fwd.eps, &fwd.z_lnvar.unsqueeze(1)?)?;
        let log_p_bs = standard_normal_log_density(&fwd.z)?;
        let kld_bs = (&log_q_bs - &log_p_bs)?;

        let log_w_bs = (&log_p_bs - &log_q_bs)?.sub(&recon_err_bs)?;
        let w_bs = importance_weights(&log_w_bs, 1)?;

        let term_bs = (&recon_err_bs + (&kld_bs * kld_weight)?)?;
        let loss = (&w_bs * &term_bs)?.sum(1)?.mean(0)?;

        let s = log_w_bs.dim(1)?;
        let iw_bound = (log_sum_exp(&log_w_bs.detach(), 1)? - (s as f64).ln())?.mean(0)?;
        let analytic_kld = gaussian_kl_loss(&fwd.z_mean, &fwd.z_lnvar)?.mean(0)?;

        let ret = IwaeLoss {
            reconstruction_loss: scalar_f32(&recon_err_bs.mean_all()?)?,
            kld: -scalar_f32(&kld_bs.mean_all()?)?,
            analytic_kld: scalar_f32(&analytic_kld)?,
            iw_bound: scalar_f32(&iw_bound)?,
            loss,
        };
        debug!("loss components: {:?}", ret.metrics());
        Ok(ret)
    }

    /// Decode `num_images` draws from the standard normal prior
    pub fn sample(&self, num_images: usize) -> Result<Tensor> {
        let z_nk = Tensor::randn(
            0_f32,
            1_f32,
            (num_images, self.dim_latent()),
            self.decoder.device(),
        )?
        .to_dtype(self.decoder.dtype())?;
        self.decode(&z_nk, false)
    }

    /// Reconstruct images through the posterior mean
    ///
    /// Deterministic and in evaluation mode, unlike the sampled
    /// reconstructions `forward_t` returns in `IwaeForward::recon`.
    pub fn generate(&self, x_bchw: &Tensor) -> Result<Tensor> {
        let (z_mean, _) = self.encode(x_bchw, false)?;
        self.decode(&z_mean, false)
    }
}
