pub mod client;

pub use client::LumoClient;
