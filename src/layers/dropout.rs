use std::cell::RefCell;

use rand::prelude::*;
use serde::Deserialize;
use serde_json::Value;

use crate::tensor::{Shapes, Tensors};
use crate::{config, Error, Result, Tensor};

use super::{Layer, LayerCore};

#[derive(Debug, Clone, Deserialize)]
pub struct DropoutConfig {
    /// Probability of keeping an element.
    #[serde(default = "default_keep")]
    pub keep: f32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_keep() -> f32 {
    0.5
}

impl Default for DropoutConfig {
    fn default() -> Self {
        Self {
            keep: default_keep(),
            seed: None,
            name: None,
        }
    }
}

impl DropoutConfig {
    pub fn new(keep: f32) -> Self {
        Self {
            keep,
            ..Self::default()
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Zeroes elements with probability `1 - keep` while training and rescales the
/// survivors; passes input through unchanged in evaluation mode.
#[derive(Debug)]
pub struct Dropout {
    core: LayerCore,
    keep: f32,
    rng: RefCell<StdRng>,
}

impl Dropout {
    pub fn new(config: DropoutConfig) -> Result<Self> {
        if !(config.keep > 0.0 && config.keep <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "Dropout keep must be in (0, 1], got {}",
                config.keep
            )));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let core = LayerCore::new::<Self>(config.name);
        log::info!("Dropout {}: keep: {}", core.name(), config.keep);

        Ok(Self {
            core,
            keep: config.keep,
            rng: RefCell::new(rng),
        })
    }

    pub fn from_json(args: &Value) -> Result<Self> {
        Self::new(config::parse("dropout", args)?)
    }

    pub fn keep(&self) -> f32 {
        self.keep
    }
}

impl Layer for Dropout {
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
        if !self.core.is_train() || self.keep >= 1.0 {
            return Ok(inputs.clone());
        }

        let keep = self.keep;
        let mut rng = self.rng.borrow_mut();
        let mut dropped = Vec::with_capacity(inputs.as_slice().len());
        for tensor in inputs.as_slice() {
            let data = tensor
                .data()
                .mapv(|x| if rng.gen::<f32>() < keep { x / keep } else { 0.0 });
            dropped.push(Tensor::new(data));
        }

        Ok(match inputs {
            Tensors::Single(_) => Tensors::Single(dropped.remove(0)),
            Tensors::Many(_) => Tensors::Many(dropped),
        })
    }

    fn describe(&self) -> String {
        format!("Dropout(keep={}, name='{}')", self.keep, self.core.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dropout_eval_is_identity() {
        let mut dropout = Dropout::new(DropoutConfig::new(0.5).seed(1)).unwrap();
        dropout.set_training_mode(false);

        let x = Tensors::Single(Tensor::ones(&[4, 4]));
        assert_eq!(dropout.forward(&x).unwrap(), x);
    }

    #[test]
    fn test_dropout_train_masks_and_scales() {
        let dropout = Dropout::new(DropoutConfig::new(0.5).seed(42)).unwrap();
        let x = Tensors::Single(Tensor::ones(&[50, 40]));

        let out = dropout.forward(&x).unwrap().into_single().unwrap().to_vec();
        assert!(out.iter().all(|&v| v == 0.0 || v == 2.0));

        let kept = out.iter().filter(|&&v| v > 0.0).count() as f32 / out.len() as f32;
        assert!((0.4..0.6).contains(&kept), "kept fraction {}", kept);
    }

    #[test]
    fn test_keep_one_passes_through() {
        let dropout = Dropout::new(DropoutConfig::new(1.0)).unwrap();
        let x = Tensors::Single(Tensor::full(&[3], 7.0));
        assert_eq!(dropout.forward(&x).unwrap(), x);
    }

    #[test]
    fn test_invalid_keep() {
        assert!(matches!(Dropout::new(DropoutConfig::new(0.0)), Err(Error::InvalidConfig(_))));
        assert!(Dropout::new(DropoutConfig::new(1.5)).is_err());
        assert!(Dropout::new(DropoutConfig::new(f32::NAN)).is_err());
    }

    #[test]
    fn test_from_json_defaults() {
        let dropout = Dropout::from_json(&Value::Null).unwrap();
        assert_eq!(dropout.keep(), 0.5);

        let dropout = Dropout::from_json(&json!({"keep": 0.8})).unwrap();
        assert_eq!(dropout.keep(), 0.8);

        assert!(matches!(
            Dropout::from_json(&json!(0.8)),
            Err(Error::ArgumentShape { .. })
        ));
    }
}
