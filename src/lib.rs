#[macro_use]
extern crate diesel;

pub mod actions;
pub mod badges;
pub mod code;
pub mod db;
pub mod error;
pub mod friends;
pub mod models;
pub mod schema;
pub mod tournament;
