// Licensed under the Apache-2.0 license

//! Requested address regions and the partitioning that keeps regions of one node disjoint.

use crate::error::{LayoutError, LayoutResult};
use crate::hardware::{HardwareDescription, HardwareNode};
use ldscript_config::{CHOSEN_ENTRY, CHOSEN_ITIM, CHOSEN_LIM, CHOSEN_RAM};
use serde::Serialize;
use std::fmt;

/// Logical role a region is requested for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// Where the boot code is entered.
    Entry,
    Ram,
    Itim,
    /// Loosely integrated scratch memory.
    Lim,
}

impl RegionKind {
    pub const ALL: [RegionKind; 4] = [
        RegionKind::Entry,
        RegionKind::Ram,
        RegionKind::Itim,
        RegionKind::Lim,
    ];

    pub fn chosen_property(&self) -> &'static str {
        match self {
            RegionKind::Entry => CHOSEN_ENTRY,
            RegionKind::Ram => CHOSEN_RAM,
            RegionKind::Itim => CHOSEN_ITIM,
            RegionKind::Lim => CHOSEN_LIM,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegionKind::Entry => "entry",
            RegionKind::Ram => "ram",
            RegionKind::Itim => "itim",
            RegionKind::Lim => "lim",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct Region<'a, N> {
    pub kind: RegionKind,
    pub node: &'a N,
    pub range_index: usize,
    pub offset: u64,
    pub base: u64,
    pub length: u64,
}

// Manual impls so `N` itself does not need to be `Clone`.
impl<N> Clone for Region<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for Region<'_, N> {}

impl<N: HardwareNode> Region<'_, N> {
    pub fn path(&self) -> &str {
        self.node.path()
    }

    pub fn end(&self) -> u64 {
        self.base + self.length
    }

    /// Both regions cover exactly the same addresses.
    pub fn coincides(&self, other: &Region<'_, N>) -> bool {
        self.base == other.base && self.length == other.length
    }
}

/// Look up the chosen property for `kind` and compute the region it describes.
///
/// Returns `Ok(None)` when the property is absent; whether that is acceptable is up to the caller.
pub fn extract<H: HardwareDescription>(
    hw: &H,
    kind: RegionKind,
) -> LayoutResult<Option<Region<'_, H::Node>>> {
    let property = kind.chosen_property();
    let Some(chosen) = hw.chosen(property) else {
        return Ok(None);
    };
    let reference = chosen
        .reference
        .as_deref()
        .ok_or(LayoutError::MissingReference(property))?;
    let node = hw
        .resolve(reference)
        .ok_or_else(|| LayoutError::UnresolvedReference {
            property,
            reference: reference.to_string(),
        })?;

    let registers = node.registers();
    if registers.is_empty() {
        return Err(LayoutError::NoRegisters(node.path().to_string()));
    }
    let range_index = chosen.cell_or(0, 0) as usize;
    let offset = chosen.cell_or(1, 0);
    let range = registers
        .get(range_index)
        .ok_or_else(|| LayoutError::RangeIndexOutOfBounds {
            path: node.path().to_string(),
            index: range_index,
            count: registers.len(),
        })?;
    let length = range
        .length
        .checked_sub(offset)
        .ok_or_else(|| LayoutError::OffsetBeyondRange {
            path: node.path().to_string(),
            index: range_index,
            offset,
            length: range.length,
        })?;

    Ok(Some(Region {
        kind,
        node,
        range_index,
        offset,
        base: range.base + offset,
        length,
    }))
}

/// The regions requested through `/chosen`. `entry` and `ram` are always present.
#[derive(Debug)]
pub struct RequestedRegions<'a, N> {
    pub entry: Region<'a, N>,
    pub ram: Region<'a, N>,
    pub itim: Option<Region<'a, N>>,
    pub lim: Option<Region<'a, N>>,
}

impl<N> Clone for RequestedRegions<'_, N> {
    fn clone(&self) -> Self {
        RequestedRegions { ..*self }
    }
}

impl<'a, N: HardwareNode> RequestedRegions<'a, N> {
    /// Extract every requested region. A missing `entry` or `ram` is fatal.
    pub fn extract<H>(hw: &'a H) -> LayoutResult<Self>
    where
        H: HardwareDescription<Node = N>,
    {
        let mandatory = |kind: RegionKind| -> LayoutResult<Region<'a, N>> {
            extract(hw, kind)?.ok_or(LayoutError::MissingChosen(kind.chosen_property()))
        };
        Ok(RequestedRegions {
            entry: mandatory(RegionKind::Entry)?,
            ram: mandatory(RegionKind::Ram)?,
            itim: extract(hw, RegionKind::Itim)?,
            lim: extract(hw, RegionKind::Lim)?,
        })
    }

    pub fn get(&self, kind: RegionKind) -> Option<&Region<'a, N>> {
        match kind {
            RegionKind::Entry => Some(&self.entry),
            RegionKind::Ram => Some(&self.ram),
            RegionKind::Itim => self.itim.as_ref(),
            RegionKind::Lim => self.lim.as_ref(),
        }
    }

    /// Present regions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Region<'a, N>> {
        RegionKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Region<'a, N>> {
        [
            Some(&mut self.entry),
            Some(&mut self.ram),
            self.itim.as_mut(),
            self.lim.as_mut(),
        ]
        .into_iter()
        .flatten()
    }

    /// Shorten regions that share a node so that they no longer overlap.
    ///
    /// Regions of one node are ordered by offset and each one is cut off where the next begins.
    /// Regions with identical bases are aliases and are left alone.
    pub fn partition(&mut self) -> LayoutResult<()> {
        let mut nodes: Vec<&str> = Vec::new();
        for region in self.iter() {
            if !nodes.contains(&region.path()) {
                nodes.push(region.path());
            }
        }
        let nodes: Vec<String> = nodes.into_iter().map(str::to_string).collect();

        for node in nodes {
            let mut partition: Vec<&mut Region<'a, N>> = self
                .iter_mut()
                .filter(|region| region.path() == node)
                .collect();
            if partition.len() < 2 {
                continue;
            }
            // stable, so equal offsets keep declaration order
            partition.sort_by_key(|region| region.offset);

            for i in 1..partition.len() {
                let later_base = partition[i].base;
                let later_kind = partition[i].kind;
                let earlier = &mut partition[i - 1];
                if later_base < earlier.base {
                    return Err(LayoutError::PartitionOrder {
                        path: node.clone(),
                        earlier: earlier.kind,
                        earlier_base: earlier.base,
                        later: later_kind,
                        later_base,
                    });
                }
                if later_base != earlier.base {
                    earlier.length = earlier.length.min(later_base - earlier.base);
                }
            }
        }
        Ok(())
    }
}
