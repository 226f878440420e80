#![allow(clippy::too_many_arguments, clippy::type_complexity)]

pub mod shared;
pub mod system;
pub mod usecases;
