use ndarray::{ArrayD, IxDyn};
use rand::prelude::*;
use rand_distr::{Normal, Uniform};
use serde::Deserialize;

use crate::{Error, Result, Tensor};

/// Recipes for the initial value of a trainable parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Initializer {
    Zeros,
    Ones,
    Constant {
        value: f32,
    },
    RandomUniform {
        minval: f32,
        maxval: f32,
        #[serde(default)]
        seed: Option<u64>,
    },
    RandomNormal {
        mean: f32,
        stddev: f32,
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Normal samples redrawn until they fall within two standard deviations.
    TruncatedNormal {
        mean: f32,
        stddev: f32,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl Default for Initializer {
    fn default() -> Self {
        Initializer::random_normal(0.0, 0.05)
    }
}

impl Initializer {
    pub fn constant(value: f32) -> Self {
        Initializer::Constant { value }
    }

    pub fn random_uniform(minval: f32, maxval: f32) -> Self {
        Initializer::RandomUniform {
            minval,
            maxval,
            seed: None,
        }
    }

    pub fn random_normal(mean: f32, stddev: f32) -> Self {
        Initializer::RandomNormal {
            mean,
            stddev,
            seed: None,
        }
    }

    pub fn truncated_normal(mean: f32, stddev: f32) -> Self {
        Initializer::TruncatedNormal {
            mean,
            stddev,
            seed: None,
        }
    }

    /// Pins the random stream. Deterministic initializers are returned as is.
    pub fn with_seed(self, seed: u64) -> Self {
        match self {
            Initializer::RandomUniform { minval, maxval, .. } => Initializer::RandomUniform {
                minval,
                maxval,
                seed: Some(seed),
            },
            Initializer::RandomNormal { mean, stddev, .. } => Initializer::RandomNormal {
                mean,
                stddev,
                seed: Some(seed),
            },
            Initializer::TruncatedNormal { mean, stddev, .. } => Initializer::TruncatedNormal {
                mean,
                stddev,
                seed: Some(seed),
            },
            other => other,
        }
    }

    pub fn sample(&self, shape: &[usize]) -> Result<Tensor> {
        let count: usize = shape.iter().product();
        let values = match *self {
            Initializer::Zeros => return Ok(Tensor::zeros(shape)),
            Initializer::Ones => return Ok(Tensor::ones(shape)),
            Initializer::Constant { value } => return Ok(Tensor::full(shape, value)),
            Initializer::RandomUniform {
                minval,
                maxval,
                seed,
            } => {
                if !(minval.is_finite() && maxval.is_finite() && minval < maxval) {
                    return Err(Error::InvalidConfig(format!(
                        "random_uniform needs finite minval < maxval, got {} and {}",
                        minval, maxval
                    )));
                }
                let dist = Uniform::new(minval, maxval);
                let mut rng = rng_for(seed);
                (0..count).map(|_| dist.sample(&mut rng)).collect()
            }
            Initializer::RandomNormal { mean, stddev, seed } => {
                let dist = normal(mean, stddev)?;
                let mut rng = rng_for(seed);
                (0..count).map(|_| dist.sample(&mut rng)).collect()
            }
            Initializer::TruncatedNormal { mean, stddev, seed } => {
                let dist = normal(mean, stddev)?;
                let mut rng = rng_for(seed);
                let bound = 2.0 * stddev;
                (0..count)
                    .map(|_| loop {
                        let x: f32 = dist.sample(&mut rng);
                        if (x - mean).abs() <= bound {
                            break x;
                        }
                    })
                    .collect()
            }
        };

        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| Error::Layer(format!("Initializer produced a bad buffer: {}", e)))?;
        Ok(Tensor::new(data))
    }
}

fn normal(mean: f32, stddev: f32) -> Result<Normal<f32>> {
    Normal::new(mean, stddev)
        .map_err(|e| Error::InvalidConfig(format!("bad normal distribution: {}", e)))
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_initializers() {
        assert!(Initializer::Zeros.sample(&[2, 2]).unwrap().to_vec().iter().all(|&x| x == 0.0));
        assert!(Initializer::Ones.sample(&[3]).unwrap().to_vec().iter().all(|&x| x == 1.0));
        assert_eq!(
            Initializer::constant(0.1).sample(&[2]).unwrap().to_vec(),
            vec![0.1, 0.1]
        );
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let init = Initializer::random_normal(0.0, 1.0).with_seed(7);
        let a = init.sample(&[4, 4]).unwrap();
        let b = init.sample(&[4, 4]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shape(), &[4, 4]);
    }

    #[test]
    fn test_truncated_normal_stays_in_bounds() {
        let init = Initializer::truncated_normal(0.0, 0.1).with_seed(3);
        let values = init.sample(&[1000]).unwrap().to_vec();
        assert!(values.iter().all(|x| x.abs() <= 0.2));
    }

    #[test]
    fn test_uniform_range() {
        let init = Initializer::random_uniform(-0.5, 0.5).with_seed(11);
        let values = init.sample(&[500]).unwrap().to_vec();
        assert!(values.iter().all(|&x| (-0.5..0.5).contains(&x)));

        assert!(Initializer::random_uniform(1.0, 1.0).sample(&[1]).is_err());
    }

    #[test]
    fn test_uniform_rejects_non_finite_bounds() {
        for (lo, hi) in [(f32::NAN, 1.0), (0.0, f32::NAN), (f32::NEG_INFINITY, 1.0), (0.0, f32::INFINITY)] {
            let err = Initializer::random_uniform(lo, hi).sample(&[2]).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_deserialize_tagged() {
        let init: Initializer = serde_json::from_value(serde_json::json!({
            "type": "truncated_normal",
            "mean": 0.0,
            "stddev": 0.1
        }))
        .unwrap();
        assert_eq!(init, Initializer::truncated_normal(0.0, 0.1));
    }
}
