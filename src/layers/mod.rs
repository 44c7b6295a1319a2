//! The layer abstraction.
//!
//! A layer owns a [`LayerCore`] and implements [`Layer::build`] and
//! [`Layer::forward`]. Layers are composed through [`LayerRef`] handles: calling a
//! handle on an upstream handle builds the layer once (sized from the upstream
//! outputs) and forwards on every call.

pub mod base;
pub mod concat;
pub mod dense;
pub mod dropout;
pub mod flatten;
pub mod input;
pub mod list;
pub mod model_layer;

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use ndarray::ArrayD;

use crate::engine::{self, Parameter, RawValue, WeightList};
use crate::tensor::{Shapes, Tensors};
use crate::{Error, Result, Tensor};

pub use base::{LayerCore, Upstream};
pub use concat::{Concat, ConcatConfig};
pub use dense::{Dense, DenseConfig};
pub use dropout::{Dropout, DropoutConfig};
pub use flatten::Flatten;
pub use input::{Input, InputConfig};
pub use list::LayerList;
pub use model_layer::ModelLayer;

/// How a layer accepts raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Converts raw values into tensors; the entry node of a graph.
    Input,
    /// Consumes the outputs of other layers.
    Hidden,
}

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub trait Layer: AsAny + fmt::Debug {
    fn core(&self) -> &LayerCore;

    fn core_mut(&mut self) -> &mut LayerCore;

    fn kind(&self) -> LayerKind {
        LayerKind::Hidden
    }

    /// Creates every trainable parameter, sized from `input_shape`, through
    /// [`LayerCore::acquire_weight`]. Runs at most once per layer.
    fn build(&mut self, _input_shape: &Shapes) -> Result<()> {
        Err(Error::NotImplemented {
            layer: self.core().name().to_string(),
            method: "build",
        })
    }

    /// Pure transformation of `inputs`; assumes `build` has run.
    fn forward(&self, _inputs: &Tensors) -> Result<Tensors> {
        Err(Error::NotImplemented {
            layer: self.core().name().to_string(),
            method: "forward",
        })
    }

    fn set_training_mode(&mut self, is_train: bool) {
        self.core_mut().set_train(is_train);
    }

    fn release_memory(&mut self) {
        self.core_mut().release_memory();
    }

    fn describe(&self) -> String {
        "Layer".to_string()
    }
}

/// What a layer is invoked on.
#[derive(Debug, Clone)]
pub enum LayerInput {
    Raw(RawValue),
    Single(LayerRef),
    Sequence(Vec<LayerRef>),
}

/// Shared handle to a layer in a graph.
#[derive(Clone)]
pub struct LayerRef(Rc<RefCell<dyn Layer>>);

impl LayerRef {
    pub fn new<L: Layer>(layer: L) -> Self {
        LayerRef(Rc::new(RefCell::new(layer)))
    }

    pub fn from_weak(weak: &Weak<RefCell<dyn Layer>>) -> Option<Self> {
        weak.upgrade().map(LayerRef)
    }

    /// Builds the layer if needed, runs its forward pass on `input` and stores the
    /// result as the layer's outputs. Returns the same handle for chaining.
    pub fn call(&self, input: impl Into<LayerInput>) -> Result<LayerRef> {
        let input = input.into();
        let mut layer = self
            .0
            .try_borrow_mut()
            .map_err(|_| Error::Layer("layer is already in use; it cannot feed itself".to_string()))?;
        invoke(&mut *layer, input)?;
        Ok(self.clone())
    }

    /// Like [`LayerRef::call`], switching the layer to the given mode first.
    pub fn call_with_mode(&self, input: impl Into<LayerInput>, is_train: bool) -> Result<LayerRef> {
        self.set_training_mode(is_train);
        self.call(input)
    }

    /// Runs the forward pass without touching stored inputs or outputs.
    pub fn forward(&self, inputs: &Tensors) -> Result<Tensors> {
        self.try_borrow()?.forward(inputs)
    }

    pub fn borrow(&self) -> Ref<'_, dyn Layer> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn Layer> {
        self.0.borrow_mut()
    }

    pub(crate) fn try_borrow(&self) -> Result<Ref<'_, dyn Layer>> {
        self.0
            .try_borrow()
            .map_err(|_| Error::Layer("layer is being mutated; it cannot feed itself".to_string()))
    }

    pub fn downcast<L: Layer>(&self) -> Option<Ref<'_, L>> {
        Ref::filter_map(self.0.borrow(), |l| l.as_any().downcast_ref::<L>()).ok()
    }

    pub fn downcast_mut<L: Layer>(&self) -> Option<RefMut<'_, L>> {
        RefMut::filter_map(self.0.borrow_mut(), |l| l.as_any_mut().downcast_mut::<L>()).ok()
    }

    pub fn downgrade(&self) -> Weak<RefCell<dyn Layer>> {
        Rc::downgrade(&self.0)
    }

    pub fn ptr_eq(&self, other: &LayerRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.borrow().core().name().to_string()
    }

    pub fn kind(&self) -> LayerKind {
        self.borrow().kind()
    }

    pub fn is_built(&self) -> bool {
        self.borrow().core().is_built()
    }

    pub fn is_train(&self) -> bool {
        self.borrow().core().is_train()
    }

    pub fn weights(&self) -> Option<Vec<Parameter>> {
        self.borrow().core().weights().map(WeightList::to_vec)
    }

    /// The weight list itself; pushes through it are seen by every alias.
    pub fn weight_list(&self) -> Option<WeightList> {
        self.borrow().core().weights().cloned()
    }

    pub fn inputs(&self) -> Option<Tensors> {
        self.borrow().core().inputs().cloned()
    }

    pub fn outputs(&self) -> Option<Tensors> {
        self.borrow().core().outputs().cloned()
    }

    pub fn inputs_shape(&self) -> Option<Shapes> {
        self.borrow().core().inputs_shape().cloned()
    }

    pub fn outputs_shape(&self) -> Option<Shapes> {
        self.borrow().core().outputs_shape().cloned()
    }

    /// The layers whose outputs fed the last invocation, if they are still alive.
    pub fn input_layers(&self) -> Vec<LayerRef> {
        match self.borrow().core().input_layer() {
            None => Vec::new(),
            Some(Upstream::Single(weak)) => LayerRef::from_weak(weak).into_iter().collect(),
            Some(Upstream::Many(weaks)) => weaks.iter().filter_map(LayerRef::from_weak).collect(),
        }
    }

    pub fn set_training_mode(&self, is_train: bool) {
        self.borrow_mut().set_training_mode(is_train);
    }

    pub fn release_memory(&self) {
        self.borrow_mut().release_memory();
    }

    /// Layers are not containers; item assignment always fails.
    pub fn set_item(&self, _index: usize, _item: LayerRef) -> Result<()> {
        Err(Error::ForbiddenOperation("set_item"))
    }

    /// Layers are not containers; item deletion always fails.
    pub fn del_item(&self, _index: usize) -> Result<()> {
        Err(Error::ForbiddenOperation("del_item"))
    }
}

impl fmt::Debug for LayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(layer) => fmt::Debug::fmt(&*layer, f),
            Err(_) => f.write_str("LayerRef(<borrowed>)"),
        }
    }
}

impl fmt::Display for LayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.borrow().describe())
    }
}

/// Runs `build` with weight acquisition enabled. A failed build drops the
/// parameters it acquired, so the retry starts from the same weight list.
pub(crate) fn run_build(layer: &mut dyn Layer, input_shape: &Shapes) -> Result<()> {
    log::debug!("build {} with {:?}", layer.core().name(), input_shape);
    let acquired_before = layer.core().weights().map_or(0, WeightList::len);
    layer.core_mut().set_building(true);
    let result = layer.build(input_shape);
    layer.core_mut().set_building(false);
    if let Err(ref e) = result {
        log::debug!("build {} failed: {}", layer.core().name(), e);
        if let Some(weights) = layer.core().weights() {
            weights.truncate(acquired_before);
        }
    }
    result
}

fn invoke(layer: &mut dyn Layer, input: LayerInput) -> Result<()> {
    match (layer.kind(), input) {
        (LayerKind::Input, LayerInput::Raw(value)) => {
            let inputs = Tensors::Single(engine::to_tensor(value)?);
            let shape = inputs.shapes();
            let core = layer.core_mut();
            core.set_inputs(Some(inputs));
            core.set_input_layer(None);
            core.mark_built();
            run_build(layer, &shape)?;
        }
        (LayerKind::Hidden, LayerInput::Single(upstream)) => {
            let inputs = upstream_outputs(&upstream)?;
            let shape = inputs.shapes();
            let core = layer.core_mut();
            let saved = core.save_inputs();
            core.set_inputs(Some(inputs));
            core.set_input_layer(Some(Upstream::single(&upstream)));
            if !core.is_built() {
                if let Err(e) = run_build(layer, &shape) {
                    layer.core_mut().restore_inputs(saved);
                    return Err(e);
                }
                layer.core_mut().mark_built();
            }
        }
        (LayerKind::Hidden, LayerInput::Sequence(upstreams)) => {
            let mut tensors = Vec::with_capacity(upstreams.len());
            for upstream in &upstreams {
                tensors.extend(upstream_outputs(upstream)?.as_slice().iter().cloned());
            }
            // Multi-input layers carry no shape-dependent parameters.
            let core = layer.core_mut();
            core.set_inputs(Some(Tensors::Many(tensors)));
            core.set_input_layer(Some(Upstream::many(&upstreams)));
            core.mark_built();
        }
        (LayerKind::Input, other) => {
            return Err(Error::InvalidInput {
                layer: layer.core().name().to_string(),
                reason: format!("input layers take raw values, got {}", describe_input(&other)),
            });
        }
        (LayerKind::Hidden, LayerInput::Raw(_)) => {
            return Err(Error::InvalidInput {
                layer: layer.core().name().to_string(),
                reason: "expected a layer or a sequence of layers, got a raw value".to_string(),
            });
        }
    }

    let outputs = {
        let inputs = layer
            .core()
            .inputs()
            .ok_or_else(|| Error::MissingOutputs(layer.core().name().to_string()))?;
        layer.forward(inputs)?
    };
    layer.core_mut().set_outputs(Some(outputs));
    Ok(())
}

fn upstream_outputs(upstream: &LayerRef) -> Result<Tensors> {
    let layer = upstream.try_borrow()?;
    layer
        .core()
        .outputs()
        .cloned()
        .ok_or_else(|| Error::MissingOutputs(layer.core().name().to_string()))
}

fn describe_input(input: &LayerInput) -> &'static str {
    match input {
        LayerInput::Raw(_) => "a raw value",
        LayerInput::Single(_) => "a layer",
        LayerInput::Sequence(_) => "a sequence of layers",
    }
}

impl Upstream {
    /// Re-targets a recorded upstream as the input of another invocation.
    pub(crate) fn to_input(&self) -> Result<LayerInput> {
        let gone = || Error::Layer("upstream layer has been dropped".to_string());
        match self {
            Upstream::Single(weak) => LayerRef::from_weak(weak).map(LayerInput::Single).ok_or_else(gone),
            Upstream::Many(weaks) => weaks
                .iter()
                .map(|w| LayerRef::from_weak(w).ok_or_else(gone))
                .collect::<Result<Vec<_>>>()
                .map(LayerInput::Sequence),
        }
    }
}

/// Indents every line after the first by `spaces`.
pub(crate) fn add_indent(s: &str, spaces: usize) -> String {
    let mut lines = s.split('\n');
    let first = lines.next().unwrap_or_default();
    let pad = " ".repeat(spaces);
    let rest: Vec<String> = lines.map(|line| format!("{}{}", pad, line)).collect();
    if rest.is_empty() {
        return s.to_string();
    }
    format!("{}\n{}", first, rest.join("\n"))
}

impl From<&LayerRef> for LayerInput {
    fn from(layer: &LayerRef) -> Self {
        LayerInput::Single(layer.clone())
    }
}

impl From<LayerRef> for LayerInput {
    fn from(layer: LayerRef) -> Self {
        LayerInput::Single(layer)
    }
}

impl From<Vec<LayerRef>> for LayerInput {
    fn from(layers: Vec<LayerRef>) -> Self {
        LayerInput::Sequence(layers)
    }
}

impl From<&[LayerRef]> for LayerInput {
    fn from(layers: &[LayerRef]) -> Self {
        LayerInput::Sequence(layers.to_vec())
    }
}

impl From<RawValue> for LayerInput {
    fn from(value: RawValue) -> Self {
        LayerInput::Raw(value)
    }
}

impl From<Tensor> for LayerInput {
    fn from(tensor: Tensor) -> Self {
        LayerInput::Raw(RawValue::Tensor(tensor))
    }
}

impl From<ArrayD<f32>> for LayerInput {
    fn from(array: ArrayD<f32>) -> Self {
        LayerInput::Raw(RawValue::Array(array))
    }
}

impl From<Vec<f32>> for LayerInput {
    fn from(values: Vec<f32>) -> Self {
        LayerInput::Raw(RawValue::Vector(values))
    }
}

impl From<f32> for LayerInput {
    fn from(value: f32) -> Self {
        LayerInput::Raw(RawValue::Scalar(value))
    }
}
