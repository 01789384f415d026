// core.rs splits chain responsibilities into submodules: block model, merkle
// folding, chain state, UTXO index and validation.
pub mod block;
pub mod chain;
pub mod merkle;
pub mod params;
pub mod state;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use merkle::*;
pub use params::*;
pub use state::*;
pub use validation::*;
