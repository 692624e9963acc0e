extern crate config;
#[macro_use]
extern crate log;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate uuid;

pub mod basic_paxos;
pub mod configurations;
pub mod message;
pub mod messenger;
pub mod proposal;
