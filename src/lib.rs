//! The name tree of a Named Data Networking forwarder, and the FIB, PIT,
//! Measurements and StrategyChoice tables that hang off it.

pub mod config;

pub mod error;

pub mod hash;

pub mod tlv;

pub mod name;

pub mod timestamp;

pub mod tables;

pub use crate::{
    config::{NameTreeOptions, TablesConfig},
    name::{Name, NameComponent},
    tables::{
        arena::Handle,
        entry::{Entry, EntryId},
        enumerate::Enumeration,
        name_tree::NameTree,
        FaceToken, Tables,
    },
    timestamp::Timestamp,
};
