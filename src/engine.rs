//! Tensor-engine facilities the layer graph delegates to: turning raw data into
//! tensors and owning trainable variables.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use ndarray::ArrayD;

use crate::{initializers::Initializer, Error, Result, Tensor};

/// Data accepted by input layers before it becomes a [`Tensor`].
#[derive(Debug, Clone)]
pub enum RawValue {
    Scalar(f32),
    Vector(Vec<f32>),
    Array(ArrayD<f32>),
    Tensor(Tensor),
}

pub fn to_tensor(value: RawValue) -> Result<Tensor> {
    match value {
        RawValue::Scalar(x) => Ok(Tensor::scalar(x)),
        RawValue::Vector(v) => {
            let len = v.len();
            Tensor::from_vec(v, &[len])
        }
        RawValue::Array(a) => Ok(Tensor::new(a)),
        RawValue::Tensor(t) => Ok(t),
    }
}

/// A named trainable parameter.
pub struct Variable {
    name: String,
    value: RefCell<Tensor>,
}

pub type Parameter = Rc<Variable>;

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> Vec<usize> {
        self.value.borrow().shape().to_vec()
    }

    pub fn value(&self) -> Ref<'_, Tensor> {
        self.value.borrow()
    }

    /// Replaces the stored value; the shape is fixed at creation.
    pub fn assign(&self, value: Tensor) -> Result<()> {
        let current = self.shape();
        if value.shape() != current.as_slice() {
            return Err(Error::ShapeMismatch {
                expected: current,
                actual: value.shape().to_vec(),
            });
        }
        *self.value.borrow_mut() = value;
        Ok(())
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("shape", &self.shape())
            .finish()
    }
}

pub fn create_variable(
    scope: &str,
    name: &str,
    shape: &[usize],
    init: &Initializer,
) -> Result<Parameter> {
    let value = init.sample(shape)?;
    log::debug!("create variable {}/{} {:?}", scope, name, shape);
    Ok(Rc::new(Variable {
        name: format!("{}/{}", scope, name),
        value: RefCell::new(value),
    }))
}

/// Ordered collection of parameters. Layers only ever append to it; the one
/// exception is a `LayerList` whose unbuilt members precede built ones, which
/// reorders its aggregate into member order once it builds. Clones share
/// storage, so every holder of a clone observes changes made through any other.
#[derive(Clone, Default)]
pub struct WeightList(Rc<RefCell<Vec<Parameter>>>);

impl WeightList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, param: Parameter) {
        self.0.borrow_mut().push(param);
    }

    pub fn extend<I: IntoIterator<Item = Parameter>>(&self, params: I) {
        self.0.borrow_mut().extend(params);
    }

    /// Appends parameters not already present, compared by identity.
    pub fn extend_unique<I: IntoIterator<Item = Parameter>>(&self, params: I) {
        let mut list = self.0.borrow_mut();
        for param in params {
            if !list.iter().any(|p| Rc::ptr_eq(p, &param)) {
                list.push(param);
            }
        }
    }

    /// Makes the list equal to `params`. Appends the missing tail when the
    /// current contents are already a prefix of `params`, otherwise replaces them.
    pub(crate) fn sync_to(&self, params: Vec<Parameter>) {
        let mut list = self.0.borrow_mut();
        let is_prefix = list.len() <= params.len()
            && list.iter().zip(&params).all(|(a, b)| Rc::ptr_eq(a, b));
        if is_prefix {
            let tail = params[list.len()..].to_vec();
            list.extend(tail);
        } else {
            *list = params;
        }
    }

    pub(crate) fn truncate(&self, len: usize) {
        self.0.borrow_mut().truncate(len);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn to_vec(&self) -> Vec<Parameter> {
        self.0.borrow().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.borrow().iter().map(|p| p.name().to_string()).collect()
    }

    pub fn ptr_eq(&self, other: &WeightList) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for WeightList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl From<f32> for RawValue {
    fn from(x: f32) -> Self {
        RawValue::Scalar(x)
    }
}

impl From<Vec<f32>> for RawValue {
    fn from(v: Vec<f32>) -> Self {
        RawValue::Vector(v)
    }
}

impl From<ArrayD<f32>> for RawValue {
    fn from(a: ArrayD<f32>) -> Self {
        RawValue::Array(a)
    }
}

impl From<Tensor> for RawValue {
    fn from(t: Tensor) -> Self {
        RawValue::Tensor(t)
    }
}
