// Licensed under the Apache-2.0 license

use crate::load_map::Section;
use crate::memory::MemoryKind;
use crate::region::RegionKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a hardware description into a linker layout.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("{0} is not defined by the hardware description")]
    MissingChosen(&'static str),
    #[error("chosen property {0} does not reference a node")]
    MissingReference(&'static str),
    #[error("reference {reference} in {property} does not resolve to a node")]
    UnresolvedReference {
        property: &'static str,
        reference: String,
    },
    #[error("node {0} has no reg ranges")]
    NoRegisters(String),
    #[error("node {path} has {count} reg ranges; range {index} was requested")]
    RangeIndexOutOfBounds {
        path: String,
        index: usize,
        count: usize,
    },
    #[error("offset 0x{offset:x} exceeds the 0x{length:x} byte range {index} of node {path}")]
    OffsetBeyondRange {
        path: String,
        index: usize,
        offset: u64,
        length: u64,
    },
    #[error("{later} region (base 0x{later_base:x}) starts below {earlier} region (base 0x{earlier_base:x}) on node {path}")]
    PartitionOrder {
        path: String,
        earlier: RegionKind,
        earlier_base: u64,
        later: RegionKind,
        later_base: u64,
    },
    #[error("memory {0} overlaps memory {1}")]
    MemoryOverlap(MemoryKind, MemoryKind),
    #[error("no memories were found for the linker script")]
    NoMemories,
    #[error("no {0} memory was synthesized")]
    MissingMemory(MemoryKind),
    #[error("no memory holds the {0} role needed by the {1} section")]
    UnplacedRole(RegionKind, Section),
    #[error("{0} was not found in the hardware description")]
    MissingHarts(&'static str),
    #[error("{property} of {path} must have 2 cells, found {cells}")]
    MalformedVector {
        path: String,
        property: &'static str,
        cells: usize,
    },
    #[error("failed to load hardware description {path:?}: {message}")]
    Description { path: PathBuf, message: String },
    #[error("failed to render linker script: {0}")]
    Render(#[from] subst::Error),
}

pub type LayoutResult<T> = Result<T, LayoutError>;
