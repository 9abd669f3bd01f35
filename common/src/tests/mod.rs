mod error_location;
mod wire;
