#[macro_use]
extern crate serde;

mod api;
mod authority;
mod config;
mod error;
mod flow;
mod hybrid;
mod keys;
mod memservice;
mod message;
mod openpgp;
mod package;
mod rest;
mod session;
mod token;

pub use api::*;
pub use authority::*;
pub use config::*;
pub use error::*;
pub use flow::*;
pub use hybrid::*;
pub use keys::*;
pub use memservice::*;
pub use message::*;
pub use openpgp::*;
pub use package::*;
pub use rest::*;
pub use session::*;
pub use token::*;
