//! Infrastructure adapters for the application ports

pub mod devices;
pub mod gateway;
pub mod render;

pub use devices::{CpalMicrophone, NokhwaCamera};
pub use gateway::HttpApiGateway;
pub use render::render_annotated;
