#![allow(dead_code)]

pub mod recording;
pub mod test_utils;
