use serde::Deserialize;
use serde_json::Value;

use crate::tensor::{Shapes, Tensors};
use crate::{config, Error, Result, Tensor};

use super::{Layer, LayerCore};

#[derive(Debug, Clone, Deserialize)]
pub struct ConcatConfig {
    /// Axis to join along; negative values count from the last axis.
    #[serde(default = "default_concat_dim")]
    pub concat_dim: isize,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_concat_dim() -> isize {
    -1
}

impl Default for ConcatConfig {
    fn default() -> Self {
        Self {
            concat_dim: default_concat_dim(),
            name: None,
        }
    }
}

/// Joins the outputs of several upstream layers. Invoke it with a sequence of
/// layers.
#[derive(Debug)]
pub struct Concat {
    core: LayerCore,
    concat_dim: isize,
}

impl Concat {
    pub fn new(config: ConcatConfig) -> Self {
        let core = LayerCore::new::<Self>(config.name);
        log::info!("Concat {}: concat_dim: {}", core.name(), config.concat_dim);
        Self {
            core,
            concat_dim: config.concat_dim,
        }
    }

    pub fn from_json(args: &Value) -> Result<Self> {
        Ok(Self::new(config::parse("concat", args)?))
    }

    fn axis_for(&self, rank: usize) -> Result<usize> {
        let axis = if self.concat_dim < 0 {
            rank as isize + self.concat_dim
        } else {
            self.concat_dim
        };
        if axis < 0 || axis as usize >= rank {
            return Err(Error::Layer(format!(
                "Concat {}: concat_dim {} out of range for rank {}",
                self.core.name(),
                self.concat_dim,
                rank
            )));
        }
        Ok(axis as usize)
    }
}

impl Layer for Concat {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn build(&mut self, _input_shape: &Shapes) -> Result<()> {
        Ok(())
    }

    fn forward(&self, inputs: &Tensors) -> Result<Tensors> {
        let tensors = inputs.as_slice();
        let rank = tensors
            .first()
            .map(Tensor::rank)
            .ok_or_else(|| Error::Layer(format!("Concat {} got no inputs", self.core.name())))?;
        let axis = self.axis_for(rank)?;
        Ok(Tensors::Single(Tensor::concatenate(tensors, axis)?))
    }

    fn describe(&self) -> String {
        format!(
            "Concat(concat_dim={}, name='{}')",
            self.concat_dim,
            self.core.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_negative_axis() {
        let concat = Concat::new(ConcatConfig::default());
        let inputs = Tensors::Many(vec![Tensor::zeros(&[2, 3]), Tensor::ones(&[2, 1])]);

        let out = concat.forward(&inputs).unwrap().into_single().unwrap();
        assert_eq!(out.shape(), &[2, 4]);
        assert_eq!(out.to_vec()[3], 1.0);
    }

    #[test]
    fn test_concat_axis_out_of_range() {
        let concat = Concat::from_json(&serde_json::json!({"concat_dim": 3})).unwrap();
        let inputs = Tensors::Many(vec![Tensor::zeros(&[2, 3]), Tensor::zeros(&[2, 3])]);
        assert!(concat.forward(&inputs).is_err());
    }
}
