//! Output generation for research reports.
//!
//! # Submodules
//!
//! - [`json`]: Writes a [`crate::models::ResearchReport`] to a dated JSON file
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! ├── 2026-01-14/
//! │   ├── ai-chips.json
//! │   └── robotics.json
//! └── 2026-01-15/
//!     └── ai-chips.json
//! ```

pub mod json;
