// ABOUTME: Library exports for the image CLI modules for testing and external use
// ABOUTME: Makes config loading and output handling available to integration tests

pub mod config;
pub mod output;
