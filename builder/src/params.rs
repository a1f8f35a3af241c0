// Licensed under the Apache-2.0 license

//! The flat parameter set handed to the linker script template.

use crate::harts::{HartTopology, NmiHandler};
use crate::load_map::{LoadMap, PlacementNames};
use crate::memory::{Memory, MemoryKind, MemoryMap};
use ldscript_config::{LayoutConfig, LayoutPolicy, RAMRODATA_TEXT_THRESHOLD};
use log::{info, warn};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryParameters {
    pub name: &'static str,
    pub permissions: String,
    pub base_hex: String,
    pub length_hex: String,
}

impl From<&Memory> for MemoryParameters {
    fn from(memory: &Memory) -> Self {
        MemoryParameters {
            name: memory.kind.name(),
            permissions: memory.attributes(),
            base_hex: memory.base_hex(),
            length_hex: memory.length_hex(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RnmiParameters {
    pub id: usize,
    pub irq_base_hex: String,
    pub irq_length_hex: String,
    pub exception_base_hex: String,
    pub exception_length_hex: String,
}

impl From<&NmiHandler> for RnmiParameters {
    fn from(handler: &NmiHandler) -> Self {
        RnmiParameters {
            id: handler.id,
            irq_base_hex: format!("0x{:x}", handler.irq_address),
            irq_length_hex: format!("0x{:x}", handler.irq_length),
            exception_base_hex: format!("0x{:x}", handler.exception_address),
            exception_length_hex: format!("0x{:x}", handler.exception_length),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LinkerParameters {
    pub layout: LayoutPolicy,
    pub memories: Vec<MemoryParameters>,
    pub ram_memories: Vec<MemoryParameters>,
    pub rom: PlacementNames,
    pub ram: PlacementNames,
    pub itim: PlacementNames,
    pub lim: PlacementNames,
    pub num_harts: usize,
    pub boot_hart: u64,
    pub text_in_itim: bool,
    pub ecc_scrub: u8,
    pub rnmis: Vec<RnmiParameters>,
    pub default_stack_size: String,
    pub default_heap_size: String,
}

impl LinkerParameters {
    pub fn assemble(
        memories: &MemoryMap,
        load_map: &LoadMap,
        topology: &HartTopology,
        config: &LayoutConfig,
        ecc_scrub_requested: bool,
    ) -> Self {
        // MemoryMap iterates in name order, which keeps the output reproducible.
        let mut rnmis: Vec<RnmiParameters> = topology.rnmis.iter().map(Into::into).collect();
        rnmis.sort_by_key(|rnmi| rnmi.id);
        LinkerParameters {
            layout: config.policy,
            memories: memories.iter().map(Into::into).collect(),
            ram_memories: memories.ram_memories().map(Into::into).collect(),
            rom: load_map.rom.into(),
            ram: load_map.ram.into(),
            itim: load_map.itim.into(),
            lim: load_map.lim.into(),
            num_harts: topology.num_harts,
            boot_hart: topology.boot_hart,
            text_in_itim: text_in_itim(memories, config.policy),
            ecc_scrub: ecc_scrub(memories, ecc_scrub_requested),
            rnmis,
            default_stack_size: format!("0x{:x}", config.stack_size),
            default_heap_size: format!("0x{:x}", config.heap_size),
        }
    }

    /// The parameter set as pretty-printed JSON, for rendering with an external template engine.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Under ramrodata, `.text` moves into the ITIM once the ITIM can hold it.
pub fn text_in_itim(memories: &MemoryMap, policy: LayoutPolicy) -> bool {
    if policy != LayoutPolicy::Ramrodata {
        return false;
    }
    match memories.get(MemoryKind::Itim) {
        Some(itim) if itim.length >= RAMRODATA_TEXT_THRESHOLD => {
            info!(
                "ITIM is 0x{:x} bytes; placing .text in the ITIM",
                itim.length
            );
            true
        }
        Some(itim) => {
            info!(
                "ITIM is 0x{:x} bytes, below 0x{:x}; .text stays with the entry code",
                itim.length, RAMRODATA_TEXT_THRESHOLD
            );
            false
        }
        None => {
            info!("no separate ITIM; .text stays in place");
            false
        }
    }
}

pub fn ecc_scrub(memories: &MemoryMap, requested: bool) -> u8 {
    if !requested {
        return 0;
    }
    if memories.ram_memories().next().is_none() {
        warn!("ECC scrubbing was requested but there is no RAM to scrub; disabling it");
        return 0;
    }
    1
}
