//! Serverless image-to-video worker.
//!
//! Receives generation jobs over HTTP, materializes the input image
//! into the engine's input directory, composes a workflow from the
//! embedded templates, drives the engine via `wanvid_comfyui`, and
//! returns the produced video as base64.

pub mod config;
pub mod error;
pub mod handler;
pub mod input;
pub mod router;
pub mod routes;
pub mod state;
