pub mod atomic;
pub mod broker;
pub mod cache;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod duration;
pub mod error;
pub mod exec;
pub mod kubeconfig;

pub use error::{Error, Result};
