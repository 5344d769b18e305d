//! Pipeline stages for archive synchronization.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap an
//! implementation (e.g. a different conversion backend) without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! query ──▶ exists ──▶ fetch ──▶ convert          (per record, archive side)
//! (names)   (skip?)    (bytes)   (tiff2pdf/lopdf)
//!
//! query ──▶ transform ──▶ snapshot                (metadata side)
//! (full)    (6 rules)     (surveys.geojson)
//! ```
//!
//! 1. [`normalize`]  — the canonical-filename rule shared by every stage
//! 2. [`exists`]     — probe the archive for the converted document
//! 3. [`fetch`]      — download the source image and write it atomically
//! 4. [`convert`]    — produce the PDF; external tool for tiff, in-process
//!    embed for jpeg
//! 5. [`transform`]  — reshape raw attributes into the public schema and
//!    write the GeoJSON snapshot

pub mod convert;
pub mod exists;
pub mod fetch;
pub mod normalize;
pub mod transform;
