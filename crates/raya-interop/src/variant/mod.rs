//! Native variant adapter
//!
//! Marshals values through the fixed-layout variant ABI and drives targets
//! exposing the extended dispatch interface.

mod adapter;
mod block;
mod marshal;

pub use adapter::{index_of, DispatchAdapter, MemberNames};
pub use block::{ByRefVariantBlock, VariantBlock};
pub use marshal::{from_variant, to_variant, MarshaledArray};
