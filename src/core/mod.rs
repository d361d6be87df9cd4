// Domain-layer modules and shared errors/models
pub mod aggregator {
    pub use crate::aggregator::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod registry {
    pub use crate::registry::*;
}

pub mod errors {
    pub use crate::errors::*;
}
