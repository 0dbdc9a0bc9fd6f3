mod handler;

pub use handler::run_app;
