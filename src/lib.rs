//! # Pocket Layers
//!
//! Neural network layers that compose into computation graphs and build their
//! parameters lazily, sized from the first input they see.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pocket_layers::layers::{Dense, DenseConfig, Dropout, DropoutConfig, Input, LayerList, LayerRef};
//!
//! let x = LayerRef::new(Input::new(&[32, 784]));
//! let mlp = LayerRef::new(LayerList::new(vec![
//!     LayerRef::new(Dropout::new(DropoutConfig::new(0.8))?),
//!     LayerRef::new(Dense::new(DenseConfig::new(800))?),
//! ]));
//! mlp.call(&x)?;
//! ```

pub mod activations;
pub mod config;
pub mod engine;
pub mod error;
pub mod initializers;
pub mod layers;
pub mod model;
pub mod naming;
pub mod tensor;

pub use error::{Error, Result};
pub use layers::{Layer, LayerInput, LayerRef};
pub use model::Sequential;
pub use naming::NameRegistry;
pub use tensor::Tensor;
