use ndarray::{Ix1, Ix2};
use serde::Deserialize;
use serde_json::Value;

use crate::engine::Parameter;
use crate::initializers::Initializer;
use crate::tensor::{Shapes, Tensors};
use crate::{activations::Activation, config, Error, Result, Tensor};

use super::{run_build, Layer, LayerCore};

#[derive(Debug, Clone, Deserialize)]
pub struct DenseConfig {
    pub n_units: usize,
    #[serde(default)]
    pub act: Activation,
    #[serde(default = "default_w_init")]
    pub w_init: Initializer,
    /// `None` disables the bias.
    #[serde(default = "default_b_init")]
    pub b_init: Option<Initializer>,
    /// When set the parameters are created at construction instead of on first call.
    #[serde(default)]
    pub in_channels: Option<usize>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_w_init() -> Initializer {
    Initializer::truncated_normal(0.0, 0.1)
}

fn default_b_init() -> Option<Initializer> {
    Some(Initializer::constant(0.0))
}

impl DenseConfig {
    pub fn new(n_units: usize) -> Self {
        Self {
            n_units,
            act: Activation::Identity,
            w_init: default_w_init(),
            b_init: default_b_init(),
            in_channels: None,
            name: None,
        }
    }

    pub fn act(mut self, act: Activation) -> Self {
        self.act = act;
        self
    }

    pub fn w_init(mut self, init: Initializer) -> Self {
        self.w_init = init;
        self
    }

    pub fn b_init(mut self, init: Option<Initializer>) -> Self {
        self.b_init = init;
        self
    }

    pub fn in_channels(mut self, in_channels: usize) -> Self {
        self.in_channels = Some(in_channels);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Fully connected layer: `act(x · W + b)` over `[batch, in_channels]` input.
#[derive(Debug)]
pub struct Dense {
    core: LayerCore,
    n_units: usize,
    act: Activation,
    w_init: Initializer,
    b_init: Option<Initializer>,
    in_channels: Option<usize>,
    w: Option<Parameter>,
    b: Option<Parameter>,
}

impl Dense {
    pub fn new(config: DenseConfig) -> Result<Self> {
        if config.n_units == 0 {
            return Err(Error::InvalidConfig("Dense needs at least one unit".to_string()));
        }

        let mut dense = Self {
            core: LayerCore::new::<Self>(config.name),
            n_units: config.n_units,
            act: config.act,
            w_init: config.w_init,
            b_init: config.b_init,
            in_channels: config.in_channels,
            w: None,
            b: None,
        };

        if let Some(in_channels) = dense.in_channels {
            run_build(&mut dense, &Shapes::Single(vec![in_channels]))?;
            dense.core.mark_built();
        }

        log::info!(
            "Dense  {}: {} {}",
            dense.core.name(),
            dense.n_units,
            dense.act.name()
        );
        Ok(dense)
    }

    pub fn from_json(args: &Value) -> Result<Self> {
        Self::new(config::parse("dense", args)?)
    }

    pub fn n_units(&self) -> usize {
        self.n_units
    }

    pub fn in_channels(&self) -> Option<usize> {
        self.in_channels
    }

    pub fn kernel(&self) -> Option<&Parameter> {
        self.w.as_ref()
    }

    pub fn bias(&self) -> Option<&Parameter> {
        self.b.as_ref()
    }
}

impl Layer for Dense {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn build(&mut self, input_shape: &Shapes) -> Result<()> {
        let in_channels = match self.in_channels {
            Some(c) => c,
            None => input_shape.last_dim()?,
        };

        let w = self
            .core
            .acquire_weight("weights", &[in_channels, self.n_units], &self.w_init)?;
        let b = match self.b_init {
            Some(ref b_init) => Some(self.core.acquire_weight("biases", &[self.n_units], b_init)?),
            None => None,
        };

        self.in_channels = Some(in_channels);
        self.w = Some(w);
        self.b = b;
        Ok(())
    }

    fn forward(&self, inputs: &Tensors) -> Result<Tensors> {
        let input = inputs.single()?;
        let w = self
            .w
            .as_ref()
            .ok_or_else(|| Error::Layer(format!("Dense {} used before build", self.core.name())))?;

        if input.rank() != 2 {
            return Err(Error::Layer(format!(
                "Dense layer expects 2D input, got {:?}",
                input.shape()
            )));
        }
        let w_value = w.value();
        let features = input.shape()[1];
        if features != w_value.shape()[0] {
            return Err(Error::ShapeMismatch {
                expected: vec![w_value.shape()[0]],
                actual: vec![features],
            });
        }

        let x = input
            .data()
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::Layer(format!("Dense input: {}", e)))?;
        let kernel = w_value
            .data()
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::Layer(format!("Dense weights: {}", e)))?;
        let mut output = x.dot(&kernel);

        if let Some(ref b) = self.b {
            let b_value = b.value();
            let bias = b_value
                .data()
                .view()
                .into_dimensionality::<Ix1>()
                .map_err(|e| Error::Layer(format!("Dense biases: {}", e)))?;
            output += &bias;
        }

        let tensor = Tensor::new(output.into_dyn());
        Ok(Tensors::Single(self.act.apply(tensor)))
    }

    fn describe(&self) -> String {
        let in_channels = self
            .in_channels
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "None".to_string());
        format!(
            "Dense(n_units={}, {}, in_channels={}, name='{}')",
            self.n_units,
            self.act.name(),
            in_channels,
            self.core.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Input, LayerRef};
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    #[test]
    fn test_dense_builds_lazily_from_input_shape() {
        let input = LayerRef::new(Input::new(&[2, 3]));
        let dense = LayerRef::new(Dense::new(DenseConfig::new(4)).unwrap());
        assert!(!dense.is_built());
        assert!(dense.weights().is_none());

        dense.call(&input).unwrap();

        assert!(dense.is_built());
        let shapes: Vec<_> = dense.weights().unwrap().iter().map(|w| w.shape()).collect();
        assert_eq!(shapes, vec![vec![3, 4], vec![4]]);
        assert_eq!(dense.outputs_shape(), Some(Shapes::Single(vec![2, 4])));
    }

    #[test]
    fn test_dense_with_in_channels_builds_eagerly() {
        let dense = Dense::new(DenseConfig::new(2).in_channels(5).b_init(None)).unwrap();
        assert!(dense.core().is_built());
        assert_eq!(dense.kernel().unwrap().shape(), vec![5, 2]);
        assert!(dense.bias().is_none());
    }

    #[test]
    fn test_dense_forward_values() {
        let dense = Dense::new(
            DenseConfig::new(2)
                .in_channels(2)
                .w_init(Initializer::Ones)
                .b_init(Some(Initializer::constant(0.5))),
        )
        .unwrap();

        let x = Tensor::from_vec(vec![1.0, 2.0, -3.0, 1.0], &[2, 2]).unwrap();
        let out = dense.forward(&x.into()).unwrap().into_single().unwrap();

        assert_eq!(out.shape(), &[2, 2]);
        let values = out.to_vec();
        assert_abs_diff_eq!(values[0], 3.5, epsilon = 1e-6);
        assert_abs_diff_eq!(values[2], -1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_dense_relu() {
        let dense = Dense::new(
            DenseConfig::new(1)
                .in_channels(2)
                .act(Activation::Relu)
                .w_init(Initializer::Ones)
                .b_init(None),
        )
        .unwrap();

        let x = Tensor::from_vec(vec![-1.0, -2.0, 1.0, 2.0], &[2, 2]).unwrap();
        let out = dense.forward(&x.into()).unwrap().into_single().unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 3.0]);
    }

    #[test]
    fn test_dense_wrong_input_shape() {
        let dense = Dense::new(DenseConfig::new(2).in_channels(3)).unwrap();
        let x = Tensor::zeros(&[1, 4]);
        assert!(matches!(dense.forward(&x.into()), Err(Error::ShapeMismatch { .. })));
        assert!(dense.forward(&Tensor::zeros(&[3]).into()).is_err());
    }

    #[test]
    fn test_dense_from_json() {
        let dense = Dense::from_json(&json!({
            "n_units": 8,
            "act": "relu",
            "in_channels": 4,
            "b_init": null,
            "name": "hidden"
        }))
        .unwrap();
        assert_eq!(dense.core().name(), "hidden");
        assert_eq!(dense.core().weights().unwrap().names(), vec!["hidden/weights"]);

        assert!(matches!(
            Dense::from_json(&json!([8])),
            Err(Error::ArgumentShape { .. })
        ));
        assert!(matches!(Dense::from_json(&Value::Null), Err(Error::Json(_))));
        assert!(matches!(
            Dense::new(DenseConfig::new(0)),
            Err(Error::InvalidConfig(_))
        ));
    }
}
