use crate::model::Sequential;
use crate::tensor::{Shapes, Tensors};
use crate::{Error, Result};

use super::{add_indent, Layer, LayerCore, Upstream};

/// A built model packaged as a single layer so it can be nested in another
/// composite. Its weight list is the model's own list, not a copy.
#[derive(Debug)]
pub struct ModelLayer {
    core: LayerCore,
    model: Sequential,
}

impl ModelLayer {
    pub fn new(model: Sequential) -> Result<Self> {
        let mut core = LayerCore::named(format!("{}_layer", model.name()));

        let input = model.input().clone();
        let inputs = input
            .outputs()
            .ok_or_else(|| Error::MissingOutputs(input.name()))?;
        let outputs = model.forward(&inputs)?;

        core.set_inputs(Some(inputs));
        core.set_outputs(Some(outputs));
        core.set_input_layer(Some(Upstream::single(&input)));
        core.share_weights(model.weights().clone());
        core.mark_built();

        log::info!("ModelLayer {} from Model: {}", core.name(), model.name());
        Ok(Self { core, model })
    }

    pub fn model(&self) -> &Sequential {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Sequential {
        &mut self.model
    }
}

impl Layer for ModelLayer {
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
        self.model.forward(inputs)
    }

    fn set_training_mode(&mut self, is_train: bool) {
        self.core.set_train(is_train);
        self.model.set_training_mode(is_train);
    }

    fn release_memory(&mut self) {
        self.core.release_memory();
        self.model.release_memory();
    }

    fn describe(&self) -> String {
        format!("ModelLayer(\n  {})", add_indent(&self.model.describe(), 2))
    }
}
