//! Internal implementation details.

pub(crate) mod chain;
pub(crate) mod dispose_bag;
pub(crate) mod singleton_build;

pub use chain::ChainLink;
pub(crate) use dispose_bag::{BoxFutureUnit, DisposeBag};
pub(crate) use singleton_build::SingletonBuilds;
