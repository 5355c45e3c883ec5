mod common;
mod listeners;

pub(crate) use common::*;
pub(crate) use listeners::*;
