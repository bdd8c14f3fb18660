pub mod domain;
pub mod epias;
pub mod error;
pub mod weather;

pub use epias::{Credentials, EpiasClient};
pub use weather::{Location, OpenMeteoClient};
