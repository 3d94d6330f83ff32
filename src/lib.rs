pub mod errors;
pub mod machine;
pub mod phases;
pub mod project;
pub mod prompts;
pub mod state;
pub mod usher_config;
