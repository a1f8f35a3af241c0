// Licensed under the Apache-2.0 license

//! Load (LMA) and run (VMA) memories for each output section group.

use crate::error::{LayoutError, LayoutResult};
use crate::memory::{MemoryKind, MemoryMap};
use crate::region::RegionKind;
use ldscript_config::LayoutPolicy;
use serde::Serialize;
use std::fmt;

/// Section groups of the linker script that need an LMA/VMA pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Rom,
    Ram,
    Itim,
    Lim,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Rom => "rom",
            Section::Ram => "ram",
            Section::Itim => "itim",
            Section::Lim => "lim",
        })
    }
}

/// Where a section is loaded and where it runs. Equal values mean no copy is needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub lma: MemoryKind,
    pub vma: MemoryKind,
}

impl Placement {
    pub fn new(lma: MemoryKind, vma: MemoryKind) -> Self {
        Placement { lma, vma }
    }

    pub fn in_place(memory: MemoryKind) -> Self {
        Placement::new(memory, memory)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlacementNames {
    pub lma: &'static str,
    pub vma: &'static str,
}

impl From<Placement> for PlacementNames {
    fn from(placement: Placement) -> Self {
        PlacementNames {
            lma: placement.lma.name(),
            vma: placement.vma.name(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadMap {
    pub rom: Placement,
    pub ram: Placement,
    pub itim: Placement,
    pub lim: Placement,
}

impl LoadMap {
    pub fn get(&self, section: Section) -> Placement {
        match section {
            Section::Rom => self.rom,
            Section::Ram => self.ram,
            Section::Itim => self.itim,
            Section::Lim => self.lim,
        }
    }
}

fn holder(
    memories: &MemoryMap,
    role: RegionKind,
    section: Section,
) -> LayoutResult<MemoryKind> {
    memories
        .holder(role)
        .map(|memory| memory.kind)
        .ok_or(LayoutError::UnplacedRole(role, section))
}

/// Pick the LMA/VMA memories of every section for `policy`.
pub fn resolve(memories: &MemoryMap, policy: LayoutPolicy) -> LayoutResult<LoadMap> {
    if memories.is_empty() {
        return Err(LayoutError::NoMemories);
    }

    if memories.contains(MemoryKind::TestRam) {
        let testram = MemoryKind::TestRam;
        let lim = match memories.holder(RegionKind::Lim) {
            Some(memory) => memory.kind,
            None => testram,
        };
        return Ok(LoadMap {
            rom: Placement::in_place(testram),
            ram: Placement::in_place(testram),
            itim: Placement::new(testram, holder(memories, RegionKind::Itim, Section::Itim)?),
            lim: Placement::new(testram, lim),
        });
    }

    for required in [MemoryKind::Rom, MemoryKind::Ram] {
        if !memories.contains(required) {
            return Err(LayoutError::MissingMemory(required));
        }
    }

    let load = match policy {
        LayoutPolicy::Scratchpad => MemoryKind::Ram,
        _ => MemoryKind::Rom,
    };
    // Anything living in the ROM runs from wherever the image is loaded.
    let run_from = |kind: MemoryKind| if kind == MemoryKind::Rom { load } else { kind };

    let itim = holder(memories, RegionKind::Itim, Section::Itim)?;
    let lim = match memories.holder(RegionKind::Lim) {
        Some(memory) => memory.kind,
        None => MemoryKind::Ram,
    };
    let mut map = LoadMap {
        rom: Placement::in_place(MemoryKind::Rom),
        ram: Placement::new(load, MemoryKind::Ram),
        itim: Placement::new(load, run_from(itim)),
        lim: Placement::new(load, run_from(lim)),
    };

    if policy == LayoutPolicy::Scratchpad {
        map.rom = Placement::in_place(load);
    }

    Ok(map)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory::Memory;
    use std::collections::BTreeSet;

    fn memory(kind: MemoryKind, base: u64, length: u64, contents: &[RegionKind]) -> Memory {
        Memory {
            kind,
            base,
            length,
            contents: contents.iter().copied().collect::<BTreeSet<_>>(),
            path: format!("/soc/{}", kind),
        }
    }

    fn rom_and_ram() -> MemoryMap {
        [
            memory(MemoryKind::Rom, 0x20000000, 0x10000, &[RegionKind::Entry]),
            memory(
                MemoryKind::Ram,
                0x80000000,
                0x4000,
                &[RegionKind::Ram, RegionKind::Itim],
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_rom_and_ram_default() {
        let map = resolve(&rom_and_ram(), LayoutPolicy::Default).unwrap();
        assert_eq!(map.rom, Placement::in_place(MemoryKind::Rom));
        assert_eq!(map.ram, Placement::new(MemoryKind::Rom, MemoryKind::Ram));
        assert_eq!(map.itim, Placement::new(MemoryKind::Rom, MemoryKind::Ram));
        assert_eq!(map.lim, Placement::new(MemoryKind::Rom, MemoryKind::Ram));
    }

    #[test]
    fn test_ramrodata_and_freertos_keep_default_map() {
        let default = resolve(&rom_and_ram(), LayoutPolicy::Default).unwrap();
        for policy in [LayoutPolicy::Ramrodata, LayoutPolicy::Freertos] {
            assert_eq!(resolve(&rom_and_ram(), policy).unwrap(), default);
        }
    }

    #[test]
    fn test_scratchpad_loads_everything_into_ram() {
        let map = resolve(&rom_and_ram(), LayoutPolicy::Scratchpad).unwrap();
        for section in [Section::Rom, Section::Ram, Section::Itim, Section::Lim] {
            assert_eq!(
                map.get(section),
                Placement::in_place(MemoryKind::Ram),
                "{}",
                section
            );
        }
    }

    #[test]
    fn test_testram_aliases_everything() {
        let memories: MemoryMap = [memory(
            MemoryKind::TestRam,
            0x80000000,
            0x4000,
            &[RegionKind::Entry, RegionKind::Ram, RegionKind::Itim],
        )]
        .into_iter()
        .collect();
        for policy in LayoutPolicy::ALL {
            let map = resolve(&memories, policy).unwrap();
            for section in [Section::Rom, Section::Ram, Section::Itim, Section::Lim] {
                assert_eq!(map.get(section), Placement::in_place(MemoryKind::TestRam));
            }
        }
    }

    #[test]
    fn test_testram_with_separate_itim() {
        let memories: MemoryMap = [
            memory(
                MemoryKind::TestRam,
                0x80000000,
                0x4000,
                &[RegionKind::Entry, RegionKind::Ram],
            ),
            memory(MemoryKind::Itim, 0x08000000, 0x2000, &[RegionKind::Itim]),
        ]
        .into_iter()
        .collect();
        let map = resolve(&memories, LayoutPolicy::Default).unwrap();
        assert_eq!(map.itim, Placement::new(MemoryKind::TestRam, MemoryKind::Itim));
        assert_eq!(map.rom, Placement::in_place(MemoryKind::TestRam));
    }

    #[test]
    fn test_itim_in_rom_runs_from_load_medium() {
        let memories: MemoryMap = [
            memory(
                MemoryKind::Rom,
                0x08000000,
                0x10000,
                &[RegionKind::Entry, RegionKind::Itim],
            ),
            memory(MemoryKind::Ram, 0x80000000, 0x4000, &[RegionKind::Ram]),
        ]
        .into_iter()
        .collect();
        let map = resolve(&memories, LayoutPolicy::Default).unwrap();
        assert_eq!(map.itim, Placement::in_place(MemoryKind::Rom));
        let map = resolve(&memories, LayoutPolicy::Scratchpad).unwrap();
        assert_eq!(map.itim, Placement::in_place(MemoryKind::Ram));
    }

    #[test]
    fn test_three_memories_with_lim() {
        let memories: MemoryMap = [
            memory(MemoryKind::Rom, 0x20000000, 0x10000, &[RegionKind::Entry]),
            memory(MemoryKind::Ram, 0x80000000, 0x4000, &[RegionKind::Ram]),
            memory(MemoryKind::Itim, 0x08000000, 0x8000, &[RegionKind::Itim]),
            memory(MemoryKind::Lim, 0x08100000, 0x10000, &[RegionKind::Lim]),
        ]
        .into_iter()
        .collect();
        let map = resolve(&memories, LayoutPolicy::Default).unwrap();
        assert_eq!(map.itim, Placement::new(MemoryKind::Rom, MemoryKind::Itim));
        assert_eq!(map.lim, Placement::new(MemoryKind::Rom, MemoryKind::Lim));
    }

    #[test]
    fn test_resolution_failures() {
        assert!(matches!(
            resolve(&MemoryMap::default(), LayoutPolicy::Default),
            Err(LayoutError::NoMemories)
        ));

        let no_ram: MemoryMap = [memory(MemoryKind::Rom, 0x20000000, 0x10000, &[RegionKind::Entry])]
            .into_iter()
            .collect();
        assert!(matches!(
            resolve(&no_ram, LayoutPolicy::Default),
            Err(LayoutError::MissingMemory(MemoryKind::Ram))
        ));

        let unplaced: MemoryMap = [
            memory(MemoryKind::Rom, 0x20000000, 0x10000, &[RegionKind::Entry]),
            memory(MemoryKind::Ram, 0x80000000, 0x4000, &[RegionKind::Ram]),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            resolve(&unplaced, LayoutPolicy::Ramrodata),
            Err(LayoutError::UnplacedRole(RegionKind::Itim, Section::Itim))
        ));
    }

    #[test]
    fn test_placement_names() {
        let names = PlacementNames::from(Placement::new(MemoryKind::Rom, MemoryKind::TestRam));
        assert_eq!(names.lma, "rom");
        assert_eq!(names.vma, "testram");
    }
}
