use std::ops::Index;
use std::slice::SliceIndex;

use crate::engine::Parameter;
use crate::tensor::{Shapes, Tensors};
use crate::{Error, Result};

use super::{add_indent, Layer, LayerCore, LayerInput, LayerRef};

/// An ordered chain of layers that is itself a layer, so chains nest.
///
/// Building a list threads its upstream through every member with a real
/// invocation: members size their parameters from actual activations, so a
/// list's build also performs a forward pass.
#[derive(Debug)]
pub struct LayerList {
    core: LayerCore,
    layers: Vec<LayerRef>,
}

impl LayerList {
    pub fn new(layers: Vec<LayerRef>) -> Self {
        Self::assemble(None, layers)
    }

    pub fn with_name(name: impl Into<String>, layers: Vec<LayerRef>) -> Self {
        Self::assemble(Some(name.into()), layers)
    }

    fn assemble(name: Option<String>, layers: Vec<LayerRef>) -> Self {
        let mut core = LayerCore::new::<Self>(name);

        let mut all_built = true;
        for layer in &layers {
            let member = layer.borrow();
            if !member.core().is_built() {
                all_built = false;
            } else if let Some(weights) = member.core().weights() {
                core.weights_or_init().extend(weights.to_vec());
            }
        }
        if all_built {
            core.mark_built();
        }

        let names: Vec<String> = layers.iter().map(LayerRef::name).collect();
        log::info!(
            "LayerList {} including layers [{}]",
            core.name(),
            names.join(", ")
        );

        Self { core, layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&LayerRef> {
        self.layers.get(idx)
    }

    /// A new list over the selected members, or `None` when out of bounds.
    pub fn slice<R>(&self, range: R) -> Option<LayerList>
    where
        R: SliceIndex<[LayerRef], Output = [LayerRef]>,
    {
        self.layers
            .get(range)
            .map(|members| LayerList::new(members.to_vec()))
    }

    pub fn layers(&self) -> &[LayerRef] {
        &self.layers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayerRef> {
        self.layers.iter()
    }

    fn member_weights(&self) -> Vec<Parameter> {
        self.layers
            .iter()
            .flat_map(|layer| layer.weights().unwrap_or_default())
            .collect()
    }
}

impl Index<usize> for LayerList {
    type Output = LayerRef;

    fn index(&self, idx: usize) -> &LayerRef {
        &self.layers[idx]
    }
}

impl<'a> IntoIterator for &'a LayerList {
    type Item = &'a LayerRef;
    type IntoIter = std::slice::Iter<'a, LayerRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

impl Layer for LayerList {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn build(&mut self, _input_shape: &Shapes) -> Result<()> {
        let upstream = self.core.input_layer().ok_or_else(|| {
            Error::Layer(format!("LayerList {} has no upstream to build from", self.core.name()))
        })?;
        let mut current = upstream.to_input()?;

        for layer in &self.layers {
            layer.call(current)?;
            layer.borrow_mut().core_mut().mark_built();
            current = LayerInput::Single(layer.clone());
        }

        let params = self.member_weights();
        if !params.is_empty() {
            self.core.weights_or_init().sync_to(params);
        }
        Ok(())
    }

    fn forward(&self, inputs: &Tensors) -> Result<Tensors> {
        let mut z = inputs.clone();
        for layer in &self.layers {
            z = layer.forward(&z)?;
        }
        Ok(z)
    }

    fn set_training_mode(&mut self, is_train: bool) {
        self.core.set_train(is_train);
        for layer in &self.layers {
            layer.set_training_mode(is_train);
        }
    }

    fn release_memory(&mut self) {
        self.core.release_memory();
        for layer in &self.layers {
            layer.release_memory();
        }
    }

    fn describe(&self) -> String {
        let mut s = String::from("LayerList(\n");
        for (idx, layer) in self.layers.iter().enumerate() {
            let member = add_indent(&layer.borrow().describe(), 2);
            s.push_str(&format!("  ({}): {}\n", idx, member));
        }
        s.push(')');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Dense, DenseConfig, Flatten, Input};

    fn dense(units: usize) -> LayerRef {
        LayerRef::new(Dense::new(DenseConfig::new(units)).unwrap())
    }

    #[test]
    fn test_index_len_and_slice() {
        let members = vec![dense(2), dense(3), dense(4), dense(5)];
        let list = LayerList::new(members.clone());

        assert_eq!(list.len(), 4);
        assert!(list[2].ptr_eq(&members[2]));
        assert!(list.get(4).is_none());

        let sub = list.slice(1..3).unwrap();
        assert_eq!(sub.len(), 2);
        assert!(sub[0].ptr_eq(&members[1]));
        assert!(sub[1].ptr_eq(&members[2]));
        assert_ne!(sub.core().name(), list.core().name());

        assert!(list.slice(3..9).is_none());
    }

    #[test]
    fn test_describe_nests_members() {
        let list = LayerList::new(vec![
            LayerRef::new(Flatten::new(Some("f".to_string()))),
            LayerRef::new(LayerList::new(vec![LayerRef::new(Flatten::new(Some("g".to_string())))])),
        ]);

        let expected = "LayerList(\n  (0): Flatten(name='f')\n  (1): LayerList(\n    (0): Flatten(name='g')\n  )\n)";
        assert_eq!(list.describe(), expected);
    }

    #[test]
    fn test_build_without_upstream_fails() {
        let mut list = LayerList::new(vec![dense(2)]);
        assert!(list.build(&Shapes::Single(vec![1, 2])).is_err());
    }

    #[test]
    fn test_forward_does_not_rebuild() {
        let input = LayerRef::new(Input::new(&[1, 3]));
        let inner = dense(2);
        let list = LayerRef::new(LayerList::new(vec![inner.clone()]));
        list.call(&input).unwrap();

        let before = inner.weights().unwrap();
        let out = list
            .forward(&crate::Tensor::zeros(&[5, 3]).into())
            .unwrap()
            .into_single()
            .unwrap();

        assert_eq!(out.shape(), &[5, 2]);
        assert_eq!(inner.weights().unwrap().len(), before.len());
    }
}
