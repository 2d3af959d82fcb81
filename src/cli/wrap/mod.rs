pub mod output;
pub mod processor;
pub mod progress;
pub mod wrap_thread;
mod wrap_impl;

// Re-export the main wrap function
pub use wrap_impl::cmd_wrap;
