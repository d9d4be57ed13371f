pub mod client;
pub mod simple_client;
