pub mod config;
pub mod consts;
pub mod context;
pub mod error;
pub mod io;
pub mod loss;
pub mod nn;
pub mod noise;
pub mod ops;
pub mod pyramid;
pub mod sample;
pub mod size;
pub mod stack;
pub mod train;
