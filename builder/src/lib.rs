// Licensed under the Apache-2.0 license

//! Linker script layout generation for RISC-V targets.
//!
//! A hardware description names the memory windows to use for the entry code, RAM and optional
//! ITIM/LIM through `/chosen`. [`resolve_layout`] turns those requests into a set of
//! non-overlapping MEMORY entries, a load map and a hart topology, and flattens them into
//! [`LinkerParameters`]. [`generate_ld_script`] renders the parameters with a template.

mod error;
mod hardware;
mod harts;
mod load_map;
mod memory;
mod params;
mod region;
mod render;

pub use error::{LayoutError, LayoutResult};
pub use hardware::{
    ChosenProperty, DeviceDescription, DeviceNode, HardwareDescription, HardwareNode,
    RegisterRange,
};
pub use harts::{HartTopology, NmiHandler};
pub use load_map::{LoadMap, Placement, PlacementNames, Section};
pub use memory::{synthesize, Memory, MemoryKind, MemoryMap, Permissions};
pub use params::{ecc_scrub, text_in_itim, LinkerParameters, MemoryParameters, RnmiParameters};
pub use region::{Region, RegionKind, RequestedRegions};
pub use render::{builtin_template, render, render_template, template_variables};

use ldscript_config::{LayoutConfig, CHOSEN_ECC_SCRUB};
use log::{debug, info};

/// Everything resolved from one hardware description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkerLayout {
    pub config: LayoutConfig,
    pub memories: MemoryMap,
    pub load_map: LoadMap,
    pub topology: HartTopology,
    pub parameters: LinkerParameters,
}

impl LinkerLayout {
    pub fn render(&self) -> LayoutResult<String> {
        render::render(&self.parameters, &self.config)
    }

    pub fn render_template(&self, template: &str) -> LayoutResult<String> {
        render::render_template(template, &self.parameters, &self.config)
    }
}

pub fn resolve_layout<H: HardwareDescription>(
    hw: &H,
    config: &LayoutConfig,
) -> LayoutResult<LinkerLayout> {
    let mut regions = RequestedRegions::extract(hw)?;
    regions.partition()?;
    for region in regions.iter() {
        debug!(
            "{} region: {} [0x{:x}, 0x{:x})",
            region.kind,
            region.path(),
            region.base,
            region.end()
        );
    }

    let memories = synthesize(&regions)?;
    let load_map = load_map::resolve(&memories, config.policy)?;
    let topology = HartTopology::resolve(hw)?;
    let ecc_scrub_requested = hw
        .chosen(CHOSEN_ECC_SCRUB)
        .is_some_and(|chosen| chosen.cell_or(0, 0) != 0);

    let parameters = LinkerParameters::assemble(
        &memories,
        &load_map,
        &topology,
        config,
        ecc_scrub_requested,
    );
    info!(
        "resolved {} layout with {} memories",
        config.policy,
        memories.len()
    );

    Ok(LinkerLayout {
        config: config.clone(),
        memories,
        load_map,
        topology,
        parameters,
    })
}

/// Resolve and render in one step. `template` replaces the built-in template of the policy.
pub fn generate_ld_script<H: HardwareDescription>(
    hw: &H,
    config: &LayoutConfig,
    template: Option<&str>,
) -> LayoutResult<String> {
    let layout = resolve_layout(hw, config)?;
    match template {
        Some(template) => layout.render_template(template),
        None => layout.render(),
    }
}
