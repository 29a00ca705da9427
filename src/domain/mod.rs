// Domain layer: acquisition model, image buffers and ports (interfaces).

pub mod image;
pub mod model;
pub mod ports;
