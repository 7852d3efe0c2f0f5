pub mod active_resolver;
pub mod command;
pub mod error;
pub mod frame;
pub mod link;
pub mod local_identity;
pub mod mac_address;
pub mod neighbor_table;
pub mod poisoner;
pub mod resolver;
