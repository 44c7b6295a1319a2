use ndarray::Axis;
use serde::Deserialize;

use crate::{Error, Result, Tensor};

/// Element-wise nonlinearity applied at the end of a layer's forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
    LeakyRelu { alpha: f32 },
}

impl Activation {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "identity" | "linear" | "none" => Ok(Activation::Identity),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            "leaky_relu" => Ok(Activation::LeakyRelu { alpha: 0.2 }),
            _ => Err(Error::UnsupportedActivation(s.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
            Activation::LeakyRelu { .. } => "leaky_relu",
        }
    }

    pub fn apply(&self, mut tensor: Tensor) -> Tensor {
        let data = tensor.data_mut();
        match *self {
            Activation::Identity => {}
            Activation::Relu => data.mapv_inplace(|x| x.max(0.0)),
            Activation::Sigmoid => data.mapv_inplace(|x| 1.0 / (1.0 + (-x).exp())),
            Activation::Tanh => data.mapv_inplace(f32::tanh),
            Activation::LeakyRelu { alpha } => {
                data.mapv_inplace(|x| if x < 0.0 { alpha * x } else { x })
            }
            Activation::Softmax => {
                if data.ndim() > 0 {
                    let last = Axis(data.ndim() - 1);
                    for mut lane in data.lanes_mut(last) {
                        let max = lane.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
                        lane.mapv_inplace(|x| (x - max).exp());
                        let sum = lane.sum();
                        lane.mapv_inplace(|x| x / sum);
                    }
                }
            }
        }
        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_relu() {
        let tensor = Tensor::from_vec(vec![-1.0, 0.0, 1.0, 2.0], &[4]).unwrap();
        let result = Activation::Relu.apply(tensor).to_vec();
        assert_eq!(result, vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_sigmoid() {
        let tensor = Tensor::from_vec(vec![0.0], &[1]).unwrap();
        let result = Activation::Sigmoid.apply(tensor).to_vec();
        assert_abs_diff_eq!(result[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let tensor = Tensor::from_vec(vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0], &[2, 3]).unwrap();
        let result = Activation::Softmax.apply(tensor).to_vec();

        assert_abs_diff_eq!(result[..3].iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result[3..].iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(result[2] > result[1] && result[1] > result[0]);
        assert_abs_diff_eq!(result[4], 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_parse_and_deserialize() {
        assert_eq!(Activation::parse("ReLU").unwrap(), Activation::Relu);
        assert_eq!(Activation::parse("linear").unwrap(), Activation::Identity);
        assert!(Activation::parse("swish").is_err());

        let act: Activation = serde_json::from_value(serde_json::json!("tanh")).unwrap();
        assert_eq!(act, Activation::Tanh);
        let act: Activation =
            serde_json::from_value(serde_json::json!({"leaky_relu": {"alpha": 0.1}})).unwrap();
        assert_eq!(act, Activation::LeakyRelu { alpha: 0.1 });
    }
}
