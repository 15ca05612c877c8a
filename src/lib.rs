pub mod account;
pub mod chain;
pub mod config;
pub mod depositdata;
pub mod errors;
pub mod helpers;
pub mod logger;
pub mod networks;
pub mod validator;
