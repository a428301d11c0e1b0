//! Buffers and textures shared between a rendering API and a compute API.
//!
//! A [`SharedBuffer`] / [`SharedImage`] owns a rendering-side allocation that is also
//! registered with the compute driver, so kernels can write the memory the renderer
//! displays without a host round-trip. Compute access is leased through
//! [`SharedBuffer::map`] / [`SharedImage::map`]; the lease borrows its owner and unmaps
//! on drop. [`copy_buffer_to_texture`] and [`copy_device_to_image`] move data between
//! the two worlds on the device.
//!
//! Drivers plug in through [`driver::RenderApi`] and [`driver::ComputeInterop`].
//! [`driver::SoftDriver`] is a deterministic in-process implementation of both.
//!
//! Everything here is single-threaded: resources hold an `Rc` to their
//! [`InteropContext`] and are neither `Send` nor `Sync`.

#![deny(unsafe_code)]

mod buffer;
mod config;
mod context;
mod error;
mod image;
mod render;
mod transfer;

pub mod driver;
pub mod types;

pub use buffer::{MappedBuffer, SharedBuffer};
pub use config::{InteropConfig, RegistrationPolicy};
pub use context::InteropContext;
pub use error::{CheckStatus, InteropError, Result};
pub use image::{MappedImage, SharedImage};
pub use render::{RenderBuffer, RenderTexture};
pub use transfer::{copy_buffer_to_texture, copy_device_to_image};
