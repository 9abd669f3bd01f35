mod error;
mod workspace;
