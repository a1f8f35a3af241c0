// Licensed under the Apache-2.0 license

//! Synthesis of the linker script MEMORY entries from the requested regions.
//!
//! The number of memories follows the number of distinct physical windows, not the number of
//! roles: `entry`, `ram` and `itim` are labels that may share one window. Each memory records the
//! roles it holds in `contents`, and its linker attributes are derived from those roles.

use crate::error::{LayoutError, LayoutResult};
use crate::hardware::HardwareNode;
use crate::region::{Region, RegionKind, RequestedRegions};
use bitflags::bitflags;
use ldscript_config::ATTRIBUTE_ALPHABET;
use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

bitflags! {
    /// Linker script memory attributes.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
        const ALLOCATE = 1 << 3;
        const INITIALIZE = 1 << 4;
    }
}

impl Permissions {
    /// Flags in the same order as the letters of [`ATTRIBUTE_ALPHABET`].
    const CANONICAL: [Permissions; 5] = [
        Permissions::READ,
        Permissions::WRITE,
        Permissions::EXECUTE,
        Permissions::ALLOCATE,
        Permissions::INITIALIZE,
    ];

    pub fn granted_by(role: RegionKind) -> Self {
        match role {
            RegionKind::Entry => Permissions::READ | Permissions::EXECUTE | Permissions::INITIALIZE,
            RegionKind::Ram => Permissions::READ | Permissions::WRITE | Permissions::ALLOCATE,
            RegionKind::Itim | RegionKind::Lim => Permissions::all(),
        }
    }

    pub fn from_contents<'a>(contents: impl IntoIterator<Item = &'a RegionKind>) -> Self {
        contents
            .into_iter()
            .fold(Permissions::empty(), |acc, role| {
                acc | Permissions::granted_by(*role)
            })
    }

    fn letters(self) -> String {
        ATTRIBUTE_ALPHABET
            .chars()
            .zip(Self::CANONICAL)
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(letter, _)| letter)
            .collect()
    }
}

/// Renders as the granted letters, then `!` and the letters that are not granted, e.g. `rwa!xi`.
impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())?;
        let denied = self.complement();
        if !denied.is_empty() {
            write!(f, "!{}", denied.letters())?;
        }
        Ok(())
    }
}

/// Named memories of the linker script. Declared in name order so maps iterate sorted by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryKind {
    /// Fast core-local instruction memory.
    Itim,
    /// Loosely integrated scratch memory.
    Lim,
    /// General read-write memory.
    Ram,
    /// Memory the boot code is entered from.
    Rom,
    /// Single memory serving as both entry and RAM.
    TestRam,
}

impl MemoryKind {
    pub fn name(&self) -> &'static str {
        match self {
            MemoryKind::Itim => "itim",
            MemoryKind::Lim => "lim",
            MemoryKind::Ram => "ram",
            MemoryKind::Rom => "rom",
            MemoryKind::TestRam => "testram",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memory {
    pub kind: MemoryKind,
    pub base: u64,
    pub length: u64,
    pub contents: BTreeSet<RegionKind>,
    pub path: String,
}

impl Memory {
    fn from_region<N: HardwareNode>(
        kind: MemoryKind,
        region: &Region<'_, N>,
        contents: &[RegionKind],
    ) -> Self {
        Memory {
            kind,
            base: region.base,
            length: region.length,
            contents: contents.iter().copied().collect(),
            path: region.path().to_string(),
        }
    }

    pub fn end(&self) -> u64 {
        self.base + self.length
    }

    pub fn holds(&self, role: RegionKind) -> bool {
        self.contents.contains(&role)
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_contents(&self.contents)
    }

    pub fn attributes(&self) -> String {
        self.permissions().to_string()
    }

    pub fn base_hex(&self) -> String {
        format!("0x{:x}", self.base)
    }

    pub fn length_hex(&self) -> String {
        format!("0x{:x}", self.length)
    }

    pub fn overlaps(&self, other: &Memory) -> bool {
        self.length > 0 && other.length > 0 && self.base < other.end() && other.base < self.end()
    }

    fn coincides<N: HardwareNode>(&self, region: &Region<'_, N>) -> bool {
        self.base == region.base && self.length == region.length
    }
}

/// The synthesized memories, keyed and iterated by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryMap {
    memories: BTreeMap<MemoryKind, Memory>,
}

impl MemoryMap {
    pub fn get(&self, kind: MemoryKind) -> Option<&Memory> {
        self.memories.get(&kind)
    }

    pub fn contains(&self, kind: MemoryKind) -> bool {
        self.memories.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Memory> {
        self.memories.values()
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// The memory whose contents include `role`.
    pub fn holder(&self, role: RegionKind) -> Option<&Memory> {
        self.iter().find(|memory| memory.holds(role))
    }

    /// Memories holding the `ram` role, in name order.
    pub fn ram_memories(&self) -> impl Iterator<Item = &Memory> {
        self.iter().filter(|memory| memory.holds(RegionKind::Ram))
    }

    pub fn insert(&mut self, memory: Memory) {
        self.memories.insert(memory.kind, memory);
    }

    fn add_role(&mut self, kind: MemoryKind, role: RegionKind) {
        if let Some(memory) = self.memories.get_mut(&kind) {
            memory.contents.insert(role);
        }
    }

    fn check_overlaps(&self) -> LayoutResult<()> {
        let memories: Vec<&Memory> = self.iter().collect();
        for (i, a) in memories.iter().enumerate() {
            if let Some(b) = memories[i + 1..].iter().find(|b| a.overlaps(b)) {
                return Err(LayoutError::MemoryOverlap(a.kind, b.kind));
            }
        }
        Ok(())
    }
}

impl FromIterator<Memory> for MemoryMap {
    fn from_iter<T: IntoIterator<Item = Memory>>(iter: T) -> Self {
        let mut map = MemoryMap::default();
        for memory in iter {
            map.insert(memory);
        }
        map
    }
}

/// Turn the partitioned regions into the memories of the linker script.
pub fn synthesize<N: HardwareNode>(regions: &RequestedRegions<'_, N>) -> LayoutResult<MemoryMap> {
    let mut memories = MemoryMap::default();
    let entry = &regions.entry;
    let ram = &regions.ram;

    if ram.coincides(entry) {
        let mut testram = Memory::from_region(
            MemoryKind::TestRam,
            ram,
            &[RegionKind::Entry, RegionKind::Ram],
        );
        match &regions.itim {
            Some(itim) if !itim.coincides(entry) => memories.insert(Memory::from_region(
                MemoryKind::Itim,
                itim,
                &[RegionKind::Itim],
            )),
            // an unrequested itim lives wherever RAM is
            _ => {
                testram.contents.insert(RegionKind::Itim);
            }
        }
        memories.insert(testram);
    } else {
        let mut rom = Memory::from_region(MemoryKind::Rom, entry, &[RegionKind::Entry]);
        let mut general = Memory::from_region(MemoryKind::Ram, ram, &[RegionKind::Ram]);
        match &regions.itim {
            Some(itim) if itim.coincides(entry) => {
                rom.contents.insert(RegionKind::Itim);
            }
            Some(itim) if itim.coincides(ram) => {
                general.contents.insert(RegionKind::Itim);
            }
            None => {
                general.contents.insert(RegionKind::Itim);
            }
            Some(itim) => memories.insert(Memory::from_region(
                MemoryKind::Itim,
                itim,
                &[RegionKind::Itim],
            )),
        }
        memories.insert(rom);
        memories.insert(general);
    }

    if let Some(lim) = &regions.lim {
        let shared = memories
            .iter()
            .find(|memory| memory.coincides(lim))
            .map(|memory| memory.kind);
        match shared {
            Some(kind) => memories.add_role(kind, RegionKind::Lim),
            None => memories.insert(Memory::from_region(
                MemoryKind::Lim,
                lim,
                &[RegionKind::Lim],
            )),
        }
    }

    memories.check_overlaps()?;

    for memory in memories.iter() {
        let roles: Vec<&str> = memory.contents.iter().map(RegionKind::name).collect();
        info!(
            "{} memory 0x{:08x}-0x{:08x} ({}) holds {}",
            memory.kind,
            memory.base,
            memory.end(),
            memory.path,
            roles.join(", ")
        );
    }

    Ok(memories)
}
