#![no_std]

extern crate alloc;

mod block;
mod control;
mod data;
mod entry;
mod geometry;
mod path;
mod report;
mod tree;
pub mod volume;

pub use self::{
    block::{BlockId, BlockStore},
    control::FatFileSystem,
    entry::{EntryError, FatEntry},
    geometry::Geometry,
    path::split_parent,
    report::{BlockRecord, BlockState, CheckReport, Fault},
};
