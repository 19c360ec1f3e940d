use candle_core::{Result, Tensor};

/// 0.5 * ln(2π)
const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;

/// KL divergence loss between two Gaussian distributions
///
/// -0.5 * (1 + log(sigma^2) - mu^2 - sigma^2)
///
/// * `z_mean` - mean of Gaussian distribution
/// * `z_lnvar` - log variance of Gaussian distribution
///
pub fn gaussian_kl_loss(z_mean: &Tensor, z_lnvar: &Tensor) -> Result<Tensor> {
    let z_var = z_lnvar.exp()?;
    (z_var - 1. + z_mean.powf(2.)? - z_lnvar)?.sum(z_mean.rank() - 1)? * 0.5
}

/// Log density of a standard normal, summed over the last dimension
///
/// log p(z) = sum_d -0.5 * z(d)^2 - 0.5 * log(2π)
///
pub fn standard_normal_log_density(z: &Tensor) -> Result<Tensor> {
    ((z.sqr()? * (-0.5))? - HALF_LN_2PI)?.sum(z.rank() - 1)
}

/// Log density of a diagonal Gaussian evaluated at a standardized
/// draw, summed over the last dimension
///
/// log q(z) = sum_d -0.5 * eps(d)^2 - 0.5 * log(2π) - 0.5 * lnvar(d)
///
/// * `eps` - (z - mean) / std
/// * `z_lnvar` - log variance, broadcast against `eps`
///
pub fn diagonal_gaussian_log_density(eps: &Tensor, z_lnvar: &Tensor) -> Result<Tensor> {
    ((eps.sqr()? * (-0.5))? - HALF_LN_2PI)?
        .broadcast_sub(&(z_lnvar * 0.5)?)?
        .sum(eps.rank() - 1)
}

/// Mean squared error per leading index
///
/// err(i..) = mean_w [ x(i.., w..) - xhat(i.., w..) ]^2
///
/// * `recon` - reconstruction tensor
/// * `target` - observed tensor, broadcast against `recon`
/// * `num_lead_dims` - how many leading dims to keep
///
pub fn mean_squared_error(recon: &Tensor, target: &Tensor, num_lead_dims: usize) -> Result<Tensor> {
    let sq = recon.broadcast_sub(target)?.sqr()?;
    if num_lead_dims == 0 {
        return sq.mean_all();
    }
    sq.flatten_from(num_lead_dims)?.mean(num_lead_dims)
}

/// log sum_i exp(x(i)) along `dim`, shifted by the max
pub fn log_sum_exp(x: &Tensor, dim: usize) -> Result<Tensor> {
    let max_x = x.max_keepdim(dim)?;
    let lse = x
        .broadcast_sub(&max_x)?
        .exp()?
        .sum_keepdim(dim)?
        .log()?
        .add(&max_x)?;
    lse.squeeze(dim)
}

/// Self-normalized importance weights along `dim`
///
/// w(i) = exp(log_w(i) - max) / sum_j exp(log_w(j) - max)
///
/// The weights are detached: they scale the gradient of each sample's
/// term but receive none themselves.
pub fn importance_weights(log_w: &Tensor, dim: usize) -> Result<Tensor> {
    candle_nn::ops::softmax(&log_w.detach(), dim)
}
