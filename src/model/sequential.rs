use crate::engine::{self, RawValue, WeightList};
use crate::layers::{add_indent, Layer, LayerRef};
use crate::tensor::{Shapes, Tensors};
use crate::{naming, Error, Result, Tensor};

/// A chain of layers fed by one input node.
///
/// Construction calls every layer on its predecessor, so all lazily-built
/// layers own their parameters once the model exists. The model's weight list
/// collects them in layer order, each parameter once.
#[derive(Debug)]
pub struct Sequential {
    name: String,
    input: LayerRef,
    layers: Vec<LayerRef>,
    weights: WeightList,
    is_train: bool,
}

impl Sequential {
    pub fn new(input: LayerRef, layers: Vec<LayerRef>) -> Result<Self> {
        Self::assemble(None, input, layers)
    }

    pub fn with_name(name: impl Into<String>, input: LayerRef, layers: Vec<LayerRef>) -> Result<Self> {
        Self::assemble(Some(name.into()), input, layers)
    }

    fn assemble(name: Option<String>, input: LayerRef, layers: Vec<LayerRef>) -> Result<Self> {
        let name = name.unwrap_or_else(|| naming::next_name(&naming::default_prefix::<Self>()));

        let mut prev = input.clone();
        for layer in &layers {
            prev = layer.call(&prev)?;
        }

        let weights = WeightList::new();
        for layer in &layers {
            if let Some(w) = layer.weights() {
                weights.extend_unique(w);
            }
        }

        log::info!(
            "Sequential {} with {} layers, {} weights",
            name,
            layers.len(),
            weights.len()
        );

        Ok(Self {
            name,
            input,
            layers,
            weights,
            is_train: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &LayerRef {
        &self.input
    }

    pub fn layers(&self) -> &[LayerRef] {
        &self.layers
    }

    pub fn weights(&self) -> &WeightList {
        &self.weights
    }

    /// Outputs of the last layer from the most recent invocation.
    pub fn outputs(&self) -> Option<Tensors> {
        self.layers.last().unwrap_or(&self.input).outputs()
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(LayerRef::name).collect()
    }

    pub fn is_train(&self) -> bool {
        self.is_train
    }

    pub fn forward(&self, inputs: &Tensors) -> Result<Tensors> {
        let mut current = inputs.clone();
        for layer in &self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }

    pub fn predict(&self, input: impl Into<RawValue>) -> Result<Tensor> {
        if self.layers.is_empty() {
            return Err(Error::Layer("Cannot predict with empty model".to_string()));
        }

        let mut current = Tensors::Single(engine::to_tensor(input.into())?);
        for (idx, layer) in self.layers.iter().enumerate() {
            current = layer
                .forward(&current)
                .map_err(|e| Error::Layer(format!("Layer {} ({}): {}", idx, layer.name(), e)))?;
        }

        current.into_single()
    }

    pub fn set_training_mode(&mut self, is_train: bool) {
        self.is_train = is_train;
        self.input.set_training_mode(is_train);
        for layer in &self.layers {
            layer.set_training_mode(is_train);
        }
    }

    pub fn train(&mut self) {
        self.set_training_mode(true);
    }

    pub fn eval(&mut self) {
        self.set_training_mode(false);
    }

    pub fn release_memory(&mut self) {
        self.input.release_memory();
        for layer in &self.layers {
            layer.release_memory();
        }
    }

    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Model: {}\n", self.name));
        s.push_str("_________________________________________________________________\n");
        s.push_str("Layer (name)                 Output Shape              Params\n");
        s.push_str("=================================================================\n");

        for layer in std::iter::once(&self.input).chain(&self.layers) {
            let shape = match layer.outputs_shape() {
                Some(Shapes::Single(shape)) => format!("{:?}", shape),
                Some(Shapes::Many(shapes)) => format!("{:?}", shapes),
                None => "?".to_string(),
            };
            let params: usize = layer
                .weights()
                .unwrap_or_default()
                .iter()
                .map(|w| w.shape().iter().product::<usize>())
                .sum();
            s.push_str(&format!("{:28} {:25} {}\n", layer.name(), shape, params));
        }

        let total: usize = self
            .weights
            .to_vec()
            .iter()
            .map(|w| w.shape().iter().product::<usize>())
            .sum();
        s.push_str("=================================================================\n");
        s.push_str(&format!("Total layers: {}\n", self.layers.len()));
        s.push_str(&format!("Total params: {}\n", total));

        s
    }

    pub fn describe(&self) -> String {
        let mut s = format!("Sequential({}\n", self.name);
        s.push_str(&format!("  (input): {}\n", add_indent(&self.input.borrow().describe(), 2)));
        for (idx, layer) in self.layers.iter().enumerate() {
            s.push_str(&format!("  ({}): {}\n", idx, add_indent(&layer.borrow().describe(), 2)));
        }
        s.push(')');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::Activation;
    use crate::initializers::Initializer;
    use crate::layers::{Dense, DenseConfig, Dropout, DropoutConfig, Input};

    fn build_model() -> Sequential {
        let input = LayerRef::new(Input::new(&[1, 2]));
        let hidden = Dense::new(
            DenseConfig::new(2)
                .act(Activation::Relu)
                .w_init(Initializer::Ones)
                .name("dense1"),
        )
        .unwrap();
        let drop = Dropout::new(DropoutConfig::new(0.5).name("drop")).unwrap();
        let out = Dense::new(DenseConfig::new(1).w_init(Initializer::Ones).name("dense2")).unwrap();

        Sequential::with_name(
            "test_model",
            input,
            vec![LayerRef::new(hidden), LayerRef::new(drop), LayerRef::new(out)],
        )
        .unwrap()
    }

    #[test]
    fn test_sequential_predict() {
        let mut model = build_model();
        model.eval();

        let output = model.predict(Tensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap()).unwrap();

        assert_eq!(output.shape(), &[1, 1]);
        assert_eq!(output.to_vec(), vec![6.0]);
    }

    #[test]
    fn test_weights_in_layer_order() {
        let model = build_model();
        assert_eq!(
            model.weights().names(),
            vec!["dense1/weights", "dense1/biases", "dense2/weights", "dense2/biases"]
        );
        assert_eq!(model.layer_names(), vec!["dense1", "drop", "dense2"]);
        assert_eq!(model.num_layers(), 3);
    }

    #[test]
    fn test_mode_reaches_layers() {
        let mut model = build_model();
        model.eval();
        assert!(!model.is_train());
        assert!(model.layers().iter().all(|l| !l.is_train()));

        model.train();
        assert!(model.layers()[1].is_train());
    }

    #[test]
    fn test_predict_reports_failing_layer() {
        let model = build_model();
        let err = model.predict(Tensor::zeros(&[1, 5])).unwrap_err();
        assert!(err.to_string().contains("Layer 0 (dense1)"));
    }

    #[test]
    fn test_summary_lists_layers() {
        let model = build_model();
        let summary = model.summary();
        assert!(summary.contains("Model: test_model"));
        assert!(summary.contains("dense2"));
        assert!(summary.contains("Total params: 9"));
    }
}
