pub mod candle_aux_layers;
pub mod candle_decoder_conv;
pub mod candle_encoder_conv;
pub mod candle_image_util;
pub mod candle_iwae;
pub mod candle_iwae_config;
pub mod candle_loss_functions;
pub mod candle_model_traits;

pub use candle_iwae::{ConvIwae, Iwae, IwaeForward, IwaeLoss};
pub use candle_iwae_config::IwaeConfig;

pub use candle_core;
pub use candle_nn;
