//! Windows platform implementation
//!
//! Backs the node facade with the Windows UI Automation API through the
//! uiautomation crate, and screen text recognition with `Windows.Media.Ocr`.

pub mod element;
pub mod engine;
pub mod ocr;
pub(crate) mod types;
pub(crate) mod utils;

pub use element::WindowsNode;
pub use engine::WindowsEngine;
pub use ocr::WindowsOcr;
