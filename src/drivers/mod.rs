// Radio control framework
pub mod registry;
pub mod traits;

// Drivers
pub mod icom;

pub use icom::CivRadio;
pub use registry::{get_model, list_models, register_model, RadioModel};
pub use traits::{RadioError, RadioResult};
