use qt_tensor::{Shape, Tensor};
use rand::rngs::StdRng;
use rand::Rng;

/// Draw a standard-normal tensor via the Box-Muller transform.
///
/// Two uniform deviates yield two normal deviates; the spare one is kept
/// when the element count is odd-adjacent.
pub fn normal(rng: &mut StdRng, dims: &[usize]) -> Tensor {
    let n: usize = dims.iter().product();
    let mut data = Vec::with_capacity(n);
    while data.len() < n {
        // gen::<f32>() is in [0, 1); keep u1 away from 0 for the log.
        let u1 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
        let u2: f32 = rng.gen();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f32::consts::PI * u2;
        data.push(r * theta.cos());
        if data.len() < n {
            data.push(r * theta.sin());
        }
    }
    Tensor::new(data, Shape::from_slice(dims))
}
