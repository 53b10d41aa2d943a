//! Transform interfaces.
//!
//! Transform models are supplied by callers; only the translation reference
//! model lives here.

pub mod trait_;
pub mod translation;

pub use trait_::{AdvancedTransform, TransformJacobian};
pub use translation::TranslationTransform;
