mod paths;
mod server;
