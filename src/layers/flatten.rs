use crate::tensor::{Shapes, Tensors};
use crate::Result;

use super::{Layer, LayerCore};

/// Collapses every dimension after the batch axis.
#[derive(Debug)]
pub struct Flatten {
    core: LayerCore,
}

impl Flatten {
    pub fn new(name: Option<String>) -> Self {
        let core = LayerCore::new::<Self>(name);
        log::info!("Flatten {}", core.name());
        Self { core }
    }
}

fn flattened_shape(shape: &[usize]) -> Vec<usize> {
    match shape {
        [] => vec![1],
        [n] => vec![*n],
        [batch, rest @ ..] => vec![*batch, rest.iter().product()],
    }
}

impl Layer for Flatten {
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
        let input = inputs.single()?;
        let reshaped = input.reshape(&flattened_shape(input.shape()))?;
        Ok(Tensors::Single(reshaped))
    }

    fn describe(&self) -> String {
        format!("Flatten(name='{}')", self.core.name())
    }
}
