//! Strain design by bilevel optimization: OptKnock, RobustKnock, OptSwap, and OptSwapYield
//!
//! Metabolic models are read with [`io::json`] or built through [`metabolic_model`], the design
//! problem is reformulated into a single mixed integer linear program by [`design`], and solved
//! by one of the backends in [`optimize::solvers`].
pub mod configuration;
pub mod design;
pub mod io;
pub mod metabolic_model;
pub mod optimize;
mod utils;

#[cfg(test)]
mod test_utils;
