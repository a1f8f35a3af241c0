// Licensed under the Apache-2.0 license

//! Hart topology: hart count, boot hart and the shared RNMI handler windows.

use crate::error::{LayoutError, LayoutResult};
use crate::hardware::{HardwareDescription, HardwareNode};
use ldscript_config::{
    CHOSEN_BOOT_HART, CPUS_PATH, RNMI_EXCEPTION_VECTOR, RNMI_HANDLER_SIZE, RNMI_INTERRUPT_VECTOR,
};
use log::debug;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NmiHandler {
    pub id: usize,
    pub irq_address: u64,
    pub irq_length: u64,
    pub exception_address: u64,
    pub exception_length: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HartTopology {
    pub num_harts: usize,
    pub boot_hart: u64,
    pub rnmis: Vec<NmiHandler>,
}

impl HartTopology {
    pub fn resolve<H: HardwareDescription>(hw: &H) -> LayoutResult<Self> {
        let harts = hw
            .children(CPUS_PATH)
            .ok_or(LayoutError::MissingHarts(CPUS_PATH))?;
        let boot_hart = boot_hart(hw, harts.len())?;
        let rnmis = rnmi_handlers(&harts)?;
        debug!(
            "{} harts, booting hart {}, {} RNMI handlers",
            harts.len(),
            boot_hart,
            rnmis.len()
        );
        Ok(HartTopology {
            num_harts: harts.len(),
            boot_hart,
            rnmis,
        })
    }
}

/// `metal,boothart` wins; otherwise hart 1 boots on multi-hart parts, since hart 0 is usually a
/// monitor core there.
fn boot_hart<H: HardwareDescription>(hw: &H, num_harts: usize) -> LayoutResult<u64> {
    if let Some(chosen) = hw.chosen(CHOSEN_BOOT_HART) {
        let reference = chosen
            .reference
            .as_deref()
            .ok_or(LayoutError::MissingReference(CHOSEN_BOOT_HART))?;
        let hart = hw
            .resolve(reference)
            .ok_or_else(|| LayoutError::UnresolvedReference {
                property: CHOSEN_BOOT_HART,
                reference: reference.to_string(),
            })?;
        let reg = hart
            .registers()
            .first()
            .ok_or_else(|| LayoutError::NoRegisters(hart.path().to_string()))?;
        return Ok(reg.base);
    }
    Ok(if num_harts > 1 { 1 } else { 0 })
}

/// Read a 64-bit vector address stored as `<high low>`.
fn vector<N: HardwareNode>(hart: &N, property: &'static str) -> LayoutResult<Option<u64>> {
    match hart.property(property) {
        None => Ok(None),
        Some(&[high, low]) => Ok(Some((high << 32) | (low & 0xffff_ffff))),
        Some(cells) => Err(LayoutError::MalformedVector {
            path: hart.path().to_string(),
            property,
            cells: cells.len(),
        }),
    }
}

/// One handler entry per distinct (interrupt, exception) vector pair, in hart order.
fn rnmi_handlers<N: HardwareNode>(harts: &[&N]) -> LayoutResult<Vec<NmiHandler>> {
    let mut seen = HashSet::new();
    let mut handlers = Vec::new();
    for hart in harts {
        let irq = vector(*hart, RNMI_INTERRUPT_VECTOR)?;
        let exception = vector(*hart, RNMI_EXCEPTION_VECTOR)?;
        let (Some(irq), Some(exception)) = (irq, exception) else {
            continue;
        };
        if !seen.insert((irq, exception)) {
            continue;
        }
        handlers.push(NmiHandler {
            id: handlers.len(),
            irq_address: irq,
            irq_length: RNMI_HANDLER_SIZE,
            exception_address: exception,
            exception_length: RNMI_HANDLER_SIZE,
        });
    }
    Ok(handlers)
}
