//! Itho capture decoder
//!
//! Bit-level receive path for a low-power RF remote: captures are collected in
//! a [`BitBuffer`], the trusted transmission is picked out, line coding undone
//! and the payload handed on as bytes.

pub mod bitbuffer;
pub mod capture;
pub mod config;
pub mod decoder;

pub use bitbuffer::{BitBuffer, BitRow};
