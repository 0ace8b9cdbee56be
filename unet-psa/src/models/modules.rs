mod double_conv;
mod factorized;
mod psa;
mod se_weight;

pub use double_conv::*;
pub use factorized::*;
pub use psa::*;
pub use se_weight::*;
