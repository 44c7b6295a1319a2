use std::cell::RefCell;
use std::rc::Weak;

use crate::engine::{self, Parameter, WeightList};
use crate::initializers::Initializer;
use crate::naming;
use crate::tensor::{Shapes, Tensors};
use crate::{Error, Result};

use super::{Layer, LayerRef};

/// Non-owning link to the layer(s) whose outputs fed the last invocation.
#[derive(Clone, Debug)]
pub enum Upstream {
    Single(Weak<RefCell<dyn Layer>>),
    Many(Vec<Weak<RefCell<dyn Layer>>>),
}

impl Upstream {
    pub(crate) fn single(layer: &LayerRef) -> Self {
        Upstream::Single(layer.downgrade())
    }

    pub(crate) fn many(layers: &[LayerRef]) -> Self {
        Upstream::Many(layers.iter().map(LayerRef::downgrade).collect())
    }
}

/// A layer's inputs, their shape and upstream, saved across a build attempt.
#[derive(Debug)]
pub(crate) struct SavedInputs {
    inputs: Option<Tensors>,
    inputs_shape: Option<Shapes>,
    input_layer: Option<Upstream>,
}

/// State shared by every layer kind.
#[derive(Debug)]
pub struct LayerCore {
    name: String,
    inputs: Option<Tensors>,
    outputs: Option<Tensors>,
    inputs_shape: Option<Shapes>,
    outputs_shape: Option<Shapes>,
    input_layer: Option<Upstream>,
    built: bool,
    building: bool,
    weights: Option<WeightList>,
    is_train: bool,
}

impl LayerCore {
    /// Creates the state for a layer of type `L`, drawing a name from the active
    /// registry when none is given.
    pub fn new<L: ?Sized>(name: Option<String>) -> Self {
        let name = name.unwrap_or_else(|| naming::next_name(&naming::default_prefix::<L>()));
        Self::named(name)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: None,
            outputs: None,
            inputs_shape: None,
            outputs_shape: None,
            input_layer: None,
            built: false,
            building: false,
            weights: None,
            is_train: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> Option<&Tensors> {
        self.inputs.as_ref()
    }

    pub fn outputs(&self) -> Option<&Tensors> {
        self.outputs.as_ref()
    }

    pub fn set_inputs(&mut self, inputs: Option<Tensors>) {
        if let Some(ref t) = inputs {
            self.inputs_shape = Some(t.shapes());
        }
        self.inputs = inputs;
    }

    pub fn set_outputs(&mut self, outputs: Option<Tensors>) {
        if let Some(ref t) = outputs {
            self.outputs_shape = Some(t.shapes());
        }
        self.outputs = outputs;
    }

    /// Shape of the current inputs, or of the last inputs seen before a release.
    pub fn inputs_shape(&self) -> Option<&Shapes> {
        self.inputs_shape.as_ref()
    }

    pub fn outputs_shape(&self) -> Option<&Shapes> {
        self.outputs_shape.as_ref()
    }

    pub fn input_layer(&self) -> Option<&Upstream> {
        self.input_layer.as_ref()
    }

    pub fn set_input_layer(&mut self, upstream: Option<Upstream>) {
        self.input_layer = upstream;
    }

    pub(crate) fn save_inputs(&self) -> SavedInputs {
        SavedInputs {
            inputs: self.inputs.clone(),
            inputs_shape: self.inputs_shape.clone(),
            input_layer: self.input_layer.clone(),
        }
    }

    pub(crate) fn restore_inputs(&mut self, saved: SavedInputs) {
        self.inputs = saved.inputs;
        self.inputs_shape = saved.inputs_shape;
        self.input_layer = saved.input_layer;
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn mark_built(&mut self) {
        self.built = true;
    }

    pub(crate) fn set_building(&mut self, building: bool) {
        self.building = building;
    }

    pub fn weights(&self) -> Option<&WeightList> {
        self.weights.as_ref()
    }

    /// Installs `weights` as this layer's list. Used by composites that share or
    /// aggregate their members' parameters.
    pub fn share_weights(&mut self, weights: WeightList) {
        self.weights = Some(weights);
    }

    pub(crate) fn weights_or_init(&mut self) -> &WeightList {
        self.weights.get_or_insert_with(WeightList::new)
    }

    pub fn is_train(&self) -> bool {
        self.is_train
    }

    pub fn set_train(&mut self, is_train: bool) {
        self.is_train = is_train;
    }

    /// Creates a trainable parameter scoped under this layer's name and records it
    /// in the weight list. Only valid while the layer is building.
    pub fn acquire_weight(
        &mut self,
        var_name: &str,
        shape: &[usize],
        init: &Initializer,
    ) -> Result<Parameter> {
        if !self.building {
            return Err(Error::Layer(format!(
                "{}: weight `{}` requested outside of build",
                self.name, var_name
            )));
        }
        let weight = engine::create_variable(&self.name, var_name, shape, init)?;
        self.weights_or_init().push(weight.clone());
        Ok(weight)
    }

    pub fn acquire_default_weight(&mut self, var_name: &str, shape: &[usize]) -> Result<Parameter> {
        self.acquire_weight(var_name, shape, &Initializer::default())
    }

    /// Drops the tensors, keeping their shapes for later queries.
    pub fn release_memory(&mut self) {
        self.inputs = None;
        self.outputs = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tensor;

    #[test]
    fn test_acquire_weight_requires_build() {
        let mut core = LayerCore::named("scope");
        assert!(core.acquire_weight("w", &[2, 2], &Initializer::Zeros).is_err());
        assert!(core.weights().is_none());

        core.set_building(true);
        let w = core.acquire_weight("w", &[2, 2], &Initializer::Zeros).unwrap();
        let b = core.acquire_default_weight("b", &[2]).unwrap();
        core.set_building(false);

        assert_eq!(w.name(), "scope/w");
        assert_eq!(core.weights().unwrap().names(), vec!["scope/w", "scope/b"]);
        assert_eq!(b.shape(), vec![2]);
    }

    #[test]
    fn test_release_keeps_shapes() {
        let mut core = LayerCore::named("scope");
        core.set_inputs(Some(Tensor::zeros(&[4, 3]).into()));
        core.set_outputs(Some(Tensor::zeros(&[4, 2]).into()));

        core.release_memory();
        core.release_memory();

        assert!(core.inputs().is_none() && core.outputs().is_none());
        assert_eq!(core.inputs_shape(), Some(&Shapes::Single(vec![4, 3])));
        assert_eq!(core.outputs_shape(), Some(&Shapes::Single(vec![4, 2])));
    }
}
