use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{Activation, ModuleT, VarBuilder, VarMap};
use iwae::candle_aux_layers::*;
use iwae::candle_decoder_conv::ConvDecoder;
use iwae::candle_encoder_conv::ConvGaussianEncoder;
use iwae::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use iwae::IwaeConfig;

#[test]
fn conv_blocks_halve_and_double() -> Result<()> {
    let dev = Device::Cpu;
    let varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

    let mut down = StackLayers::new();
    down.push_with_act(
        conv_bn_block(3, 4, vs.pp("down.0"))?,
        Activation::LeakyRelu(LEAKY_SLOPE),
    );
    down.push(conv_bn_block(4, 8, vs.pp("down.1"))?);
    assert_eq!(down.len(), 2);

    let x = Tensor::randn(0f32, 1f32, (2, 3, 16, 16), &dev)?;
    let h = down.forward_t(&x, true)?;
    assert_eq!(h.dims(), &[2, 8, 4, 4]);

    let up = conv_transpose_bn_block(8, 4, vs.pp("up"))?;
    let y = up.forward_t(&h, false)?;
    assert_eq!(y.dims(), &[2, 4, 8, 8]);
    Ok(())
}

#[test]
fn empty_stack_is_identity() -> Result<()> {
    let dev = Device::Cpu;
    let stack = StackLayers::<BatchNormed<candle_nn::Conv2d>>::default();
    assert!(stack.is_empty());
    let x = Tensor::randn(0f32, 1f32, (1, 2, 4, 4), &dev)?;
    let y = stack.forward_t(&x, true)?;
    let diff = (x - y)?.abs()?.sum_all()?.to_scalar::<f32>()?;
    assert_eq!(diff, 0.0);
    Ok(())
}

#[test]
fn encoder_decoder_agree_on_shapes() -> Result<()> {
    let dev = Device::Cpu;
    let varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
    let config = IwaeConfig::new(1, 6, 32).with_hidden_dims(&[4, 8, 16]);
    config.validate()?;

    let enc = ConvGaussianEncoder::new(&config, vs.clone())?;
    let dec = ConvDecoder::new(&config, vs)?;
    assert_eq!(enc.dim_obs(), (1, 32, 32));
    assert_eq!(enc.dim_obs(), dec.dim_obs());
    assert_eq!(enc.dim_latent(), dec.dim_latent());

    let x = Tensor::randn(0f32, 1f32, (3, 1, 32, 32), &dev)?;
    let (mu, lnvar) = enc.latent_gaussian_params(&x, true)?;
    assert_eq!(mu.dims(), &[3, 6]);
    assert_eq!(lnvar.dims(), &[3, 6]);

    let lv_max = lnvar.max_all()?.to_scalar::<f32>()?;
    let lv_min = lnvar.min_all()?.to_scalar::<f32>()?;
    assert!(lv_min >= -8. && lv_max <= 8.);

    let recon = dec.forward_t(&mu, true)?;
    assert_eq!(recon.dims(), &[3, 1, 32, 32]);
    assert_eq!(dec.dtype(), DType::F32);
    Ok(())
}

#[test]
fn encoder_rejects_wrong_images() -> Result<()> {
    let dev = Device::Cpu;
    let varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
    let config = IwaeConfig::new(3, 4, 16).with_hidden_dims(&[4, 8]);
    let enc = ConvGaussianEncoder::new(&config, vs.clone())?;
    let dec = ConvDecoder::new(&config, vs)?;

    let wrong_channels = Tensor::zeros((2, 1, 16, 16), DType::F32, &dev)?;
    assert!(enc.latent_gaussian_params(&wrong_channels, false).is_err());

    let wrong_size = Tensor::zeros((2, 3, 32, 32), DType::F32, &dev)?;
    assert!(enc.latent_gaussian_params(&wrong_size, false).is_err());

    let flat = Tensor::zeros((2, 3 * 16 * 16), DType::F32, &dev)?;
    assert!(enc.latent_gaussian_params(&flat, false).is_err());

    let wrong_latent = Tensor::zeros((2, 5), DType::F32, &dev)?;
    assert!(dec.forward_t(&wrong_latent, false).is_err());
    Ok(())
}
