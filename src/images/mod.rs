//! Generated image handling
//!
//! Provides:
//! - `ImageRef`, the displayable reference attached to conversation entries
//! - Format sniffing for endpoint payloads that arrive without a usable content type

mod image_ref;

pub use image_ref::{sniff_mime_type, ImageRef, ImageRefError, OCTET_STREAM};
