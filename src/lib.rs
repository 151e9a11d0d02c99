pub mod beacon;
pub mod config;
pub mod decoder;
pub mod device;
pub mod manager;
pub mod messages;
pub mod mqtt;
pub mod pipeline;
pub mod reporter;
pub mod scanner;
pub mod status;
pub mod window;
