//! Context models that drive the arithmetic coder.
//!
//! [`SuffixTreeModel`] is the PPM* model used by the codec. It falls back
//! to [`Order0Model`] when no context predicts the next byte; the order-0
//! model also works standalone as an [`ArithmeticModel`](crate::arith::ArithmeticModel).

mod arena;
pub mod exclusion;
pub mod order0;
pub mod predictor;
pub mod suffix_tree;

pub use exclusion::ExclusionSet;
pub use order0::Order0Model;
pub use predictor::BitPredictor;
pub use suffix_tree::SuffixTreeModel;
