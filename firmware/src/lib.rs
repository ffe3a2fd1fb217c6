//! Board support shared by the antenna and shack binaries.
#![no_std]

pub mod board;
pub mod slew;
pub mod tasks;
pub mod usb;
