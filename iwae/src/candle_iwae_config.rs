use clap::Args;

/// Architecture of the convolutional IWAE
///
/// Derives `clap::Args` so that a command-line front end can
/// `#[command(flatten)]` it next to its own options.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct IwaeConfig {
    #[arg(long, default_value = "3", help = "Number of image channels")]
    pub in_channels: usize,

    #[arg(long, default_value = "128", help = "Latent dimension")]
    pub latent_dim: usize,

    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = vec![32, 64, 128, 256, 512],
        help = "Encoder channels, one stride-2 block each (comma-separated)"
    )]
    pub hidden_dims: Vec<usize>,

    #[arg(long, default_value = "5", help = "Importance samples per image")]
    pub num_samples: usize,

    #[arg(long, default_value = "64", help = "Height and width of square images")]
    pub image_size: usize,
}

impl Default for IwaeConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            latent_dim: 128,
            hidden_dims: vec![32, 64, 128, 256, 512],
            num_samples: 5,
            image_size: 64,
        }
    }
}

impl IwaeConfig {
    pub fn new(in_channels: usize, latent_dim: usize, image_size: usize) -> Self {
        Self {
            in_channels,
            latent_dim,
            image_size,
            ..Default::default()
        }
    }

    pub fn with_hidden_dims(mut self, hidden_dims: &[usize]) -> Self {
        self.hidden_dims = hidden_dims.to_vec();
        self
    }

    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Number of stride-2 blocks on each side
    pub fn num_blocks(&self) -> usize {
        self.hidden_dims.len()
    }

    /// Spatial size after the encoder's last block
    pub fn encoded_size(&self) -> usize {
        self.image_size
            .checked_shr(self.num_blocks() as u32)
            .unwrap_or(0)
    }

    /// Channels at the bottleneck
    pub fn top_channels(&self) -> usize {
        self.hidden_dims.last().copied().unwrap_or(0)
    }

    /// Length of the flattened bottleneck feeding the latent heads
    pub fn flat_dim(&self) -> usize {
        let s = self.encoded_size();
        self.top_channels() * s * s
    }

    pub fn validate(&self) -> candle_core::Result<()> {
        if self.in_channels == 0 {
            candle_core::bail!("in_channels must be positive");
        }
        if self.latent_dim == 0 {
            candle_core::bail!("latent_dim must be positive");
        }
        if self.num_samples == 0 {
            candle_core::bail!("num_samples must be positive");
        }
        if self.hidden_dims.is_empty() {
            candle_core::bail!("need at least one hidden layer");
        }
        if let Some(j) = self.hidden_dims.iter().position(|&h| h == 0) {
            candle_core::bail!("hidden_dims[{}] is zero", j);
        }
        let l = self.num_blocks();
        if l >= usize::BITS as usize {
            candle_core::bail!("too many hidden layers: {}", l);
        }
        let stride = 1_usize << l;
        if self.image_size == 0 || self.image_size % stride != 0 {
            candle_core::bail!(
                "image_size {} must be a positive multiple of 2^{} = {}",
                self.image_size,
                l,
                stride
            );
        }
        Ok(())
    }
}
