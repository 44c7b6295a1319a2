use serde::Deserialize;
use serde_json::Value;

use crate::tensor::{Shapes, Tensors};
use crate::{config, Result, Tensor};

use super::{Layer, LayerCore, LayerKind};

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub shape: Vec<usize>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry node of a graph. Holds a ones tensor of its declared shape until it is
/// called on real data.
#[derive(Debug)]
pub struct Input {
    core: LayerCore,
    shape: Vec<usize>,
}

impl Input {
    pub fn new(shape: &[usize]) -> Self {
        Self::from_config(InputConfig {
            shape: shape.to_vec(),
            name: None,
        })
    }

    pub fn named(name: impl Into<String>, shape: &[usize]) -> Self {
        Self::from_config(InputConfig {
            shape: shape.to_vec(),
            name: Some(name.into()),
        })
    }

    pub fn from_config(config: InputConfig) -> Self {
        let mut core = LayerCore::new::<Self>(config.name);
        core.set_outputs(Some(Tensors::Single(Tensor::ones(&config.shape))));
        core.mark_built();
        log::info!("Input  {}: {:?}", core.name(), config.shape);
        Self {
            core,
            shape: config.shape,
        }
    }

    pub fn from_json(args: &Value) -> Result<Self> {
        Ok(Self::from_config(config::parse("input", args)?))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

impl Layer for Input {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Input
    }

    fn build(&mut self, input_shape: &Shapes) -> Result<()> {
        if let Shapes::Single(shape) = input_shape {
            self.shape = shape.clone();
        }
        Ok(())
    }

    fn forward(&self, inputs: &Tensors) -> Result<Tensors> {
        Ok(inputs.clone())
    }

    fn describe(&self) -> String {
        format!("Input(shape={:?}, name='{}')", self.shape, self.core.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerRef;
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_input_starts_built_with_placeholder() {
        let input = LayerRef::new(Input::named("x", &[2, 3]));
        assert!(input.is_built());
        assert_eq!(input.outputs_shape(), Some(Shapes::Single(vec![2, 3])));
        assert_eq!(input.outputs().unwrap().single().unwrap().to_vec(), vec![1.0; 6]);
    }

    #[test]
    fn test_input_accepts_raw_values() {
        let input = LayerRef::new(Input::new(&[3]));
        input.call(vec![1.0f32, 2.0, 3.0]).unwrap();

        assert_eq!(input.outputs().unwrap().single().unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
        assert!(input.input_layers().is_empty());
        assert!(input.weights().is_none());
    }

    #[test]
    fn test_input_rejects_layers() {
        let a = LayerRef::new(Input::new(&[1]));
        let b = LayerRef::new(Input::new(&[1]));
        assert!(matches!(b.call(&a), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_input_from_json() {
        let input = Input::from_json(&json!({"shape": [4, 2], "name": "pixels"})).unwrap();
        assert_eq!(input.shape(), &[4, 2]);
        assert_eq!(input.core().name(), "pixels");
        assert!(Input::from_json(&json!("pixels")).is_err());
    }
}
