use candle_core::{Result, Tensor};
use candle_nn::{
    Activation, BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, ConvTranspose2d,
    ConvTranspose2dConfig, Module, ModuleT, VarBuilder,
};

/// slope of the negative part in every hidden block
pub const LEAKY_SLOPE: f64 = 0.01;

/// build a stack of alternating `M` and `A` layers
pub struct StackLayers<M>
where
    M: ModuleT,
{
    module_layers: Vec<M>,
    activation_layers: Vec<Option<Activation>>,
}

impl<M> ModuleT for StackLayers<M>
where
    M: ModuleT,
{
    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor> {
        let mut x = input.clone();
        for (module, activation) in self.module_layers.iter().zip(self.activation_layers.iter()) {
            x = module.forward_t(&x, train)?;
            if let Some(activation) = activation {
                x = activation.forward(&x)?;
            }
        }
        Ok(x)
    }
}

impl<M> StackLayers<M>
where
    M: ModuleT,
{
    pub fn new() -> Self {
        Self {
            module_layers: Vec::new(),
            activation_layers: Vec::new(),
        }
    }

    /// Appends a layer after all the current layers.
    pub fn push_with_act(&mut self, layer: M, activation: Activation) {
        self.module_layers.push(layer);
        self.activation_layers.push(Some(activation));
    }

    pub fn push(&mut self, layer: M) {
        self.module_layers.push(layer);
        self.activation_layers.push(None);
    }

    pub fn len(&self) -> usize {
        self.module_layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.module_layers.is_empty()
    }
}

impl<M> Default for StackLayers<M>
where
    M: ModuleT,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A spatial layer `M` followed by 2d batch normalization over
/// its output channels
pub struct BatchNormed<M>
where
    M: Module,
{
    layer: M,
    bn: BatchNorm,
}

impl<M> ModuleT for BatchNormed<M>
where
    M: Module,
{
    fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let h = self.layer.forward(x)?;
        self.bn.forward_t(&h, train)
    }
}

fn bn_config() -> BatchNormConfig {
    BatchNormConfig {
        eps: 1e-5,
        remove_mean: true,
        affine: true,
        momentum: 0.1,
    }
}

/// Downsampling block: `(n, c_in, h, w) -> (n, c_out, h/2, w/2)`
///
/// * `{prefix}.conv.weight`, `{prefix}.conv.bias`
/// * `{prefix}.bn.{weight,bias,running_mean,running_var}`
pub fn conv_bn_block(
    in_channels: usize,
    out_channels: usize,
    vs: VarBuilder,
) -> Result<BatchNormed<Conv2d>> {
    let config = Conv2dConfig {
        padding: 1,
        stride: 2,
        ..Default::default()
    };
    let layer = candle_nn::conv2d(in_channels, out_channels, 3, config, vs.pp("conv"))?;
    let bn = candle_nn::batch_norm(out_channels, bn_config(), vs.pp("bn"))?;
    Ok(BatchNormed { layer, bn })
}

/// Upsampling block: `(n, c_in, h, w) -> (n, c_out, 2h, 2w)`
///
/// * `{prefix}.deconv.weight`, `{prefix}.deconv.bias`
/// * `{prefix}.bn.{weight,bias,running_mean,running_var}`
pub fn conv_transpose_bn_block(
    in_channels: usize,
    out_channels: usize,
    vs: VarBuilder,
) -> Result<BatchNormed<ConvTranspose2d>> {
    let config = ConvTranspose2dConfig {
        padding: 1,
        output_padding: 1,
        stride: 2,
        dilation: 1,
    };
    let layer =
        candle_nn::conv_transpose2d(in_channels, out_channels, 3, config, vs.pp("deconv"))?;
    let bn = candle_nn::batch_norm(out_channels, bn_config(), vs.pp("bn"))?;
    Ok(BatchNormed { layer, bn })
}
