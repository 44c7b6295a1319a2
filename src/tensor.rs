use ndarray::{ArrayD, Axis, IxDyn};

use crate::{Error, Result};

pub type Shape = Vec<usize>;

#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    pub fn new(data: ArrayD<f32>) -> Self {
        Self { data }
    }

    pub fn from_vec(vec: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != vec.len() {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                actual: vec![vec.len()],
            });
        }
        let data = ArrayD::from_shape_vec(IxDyn(shape), vec)
            .map_err(|e| Error::Layer(format!("Tensor construction failed: {}", e)))?;
        Ok(Self { data })
    }

    pub fn scalar(value: f32) -> Self {
        Self {
            data: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::ones(IxDyn(shape)),
        }
    }

    pub fn full(shape: &[usize], value: f32) -> Self {
        Self {
            data: ArrayD::from_elem(IxDyn(shape), value),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self> {
        let total: usize = new_shape.iter().product();
        if total != self.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![total],
                actual: vec![self.len()],
            });
        }

        let reshaped = self
            .data
            .clone()
            .into_shape_with_order(IxDyn(new_shape))
            .map_err(|e| Error::Layer(format!("Reshape failed: {}", e)))?;
        Ok(Self { data: reshaped })
    }

    /// Joins tensors along `axis`. Every other dimension must agree.
    pub fn concatenate(tensors: &[Tensor], axis: usize) -> Result<Self> {
        let first = tensors
            .first()
            .ok_or_else(|| Error::Layer("Cannot concatenate an empty tensor list".to_string()))?;
        if axis >= first.rank() {
            return Err(Error::Layer(format!(
                "Concat axis {} out of range for rank {}",
                axis,
                first.rank()
            )));
        }

        let views: Vec<_> = tensors.iter().map(|t| t.data.view()).collect();
        let data = ndarray::concatenate(Axis(axis), &views)
            .map_err(|e| Error::Layer(format!("Concatenate failed: {}", e)))?;
        Ok(Self { data })
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self::new(data)
    }
}

impl AsRef<ArrayD<f32>> for Tensor {
    fn as_ref(&self) -> &ArrayD<f32> {
        &self.data
    }
}

/// The value flowing along a graph edge: one tensor, or an ordered group of
/// tensors feeding a multi-input layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Tensors {
    Single(Tensor),
    Many(Vec<Tensor>),
}

impl Tensors {
    pub fn shapes(&self) -> Shapes {
        match self {
            Tensors::Single(t) => Shapes::Single(t.shape().to_vec()),
            Tensors::Many(ts) => Shapes::Many(ts.iter().map(|t| t.shape().to_vec()).collect()),
        }
    }

    pub fn single(&self) -> Result<&Tensor> {
        match self {
            Tensors::Single(t) => Ok(t),
            Tensors::Many(ts) => Err(Error::Layer(format!(
                "Expected a single tensor, got a group of {}",
                ts.len()
            ))),
        }
    }

    pub fn into_single(self) -> Result<Tensor> {
        match self {
            Tensors::Single(t) => Ok(t),
            Tensors::Many(ts) => Err(Error::Layer(format!(
                "Expected a single tensor, got a group of {}",
                ts.len()
            ))),
        }
    }

    pub fn as_slice(&self) -> &[Tensor] {
        match self {
            Tensors::Single(t) => std::slice::from_ref(t),
            Tensors::Many(ts) => ts,
        }
    }
}

impl From<Tensor> for Tensors {
    fn from(tensor: Tensor) -> Self {
        Tensors::Single(tensor)
    }
}

impl From<Vec<Tensor>> for Tensors {
    fn from(tensors: Vec<Tensor>) -> Self {
        Tensors::Many(tensors)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shapes {
    Single(Shape),
    Many(Vec<Shape>),
}

impl Shapes {
    pub fn single(&self) -> Result<&[usize]> {
        match self {
            Shapes::Single(s) => Ok(s),
            Shapes::Many(ss) => Err(Error::Layer(format!(
                "Expected a single input shape, got {} shapes",
                ss.len()
            ))),
        }
    }

    /// Size of the trailing dimension of a single shape.
    pub fn last_dim(&self) -> Result<usize> {
        self.single()?
            .last()
            .copied()
            .ok_or_else(|| Error::Layer("Scalar input has no trailing dimension".to_string()))
    }
}

impl From<Vec<usize>> for Shapes {
    fn from(shape: Vec<usize>) -> Self {
        Shapes::Single(shape)
    }
}

impl From<&[usize]> for Shapes {
    fn from(shape: &[usize]) -> Self {
        Shapes::Single(shape.to_vec())
    }
}
