pub mod auth_handler;
pub mod rpc_handler;
