// Licensed under the Apache-2.0 license

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// ITIM size at or above which the ramrodata layout places `.text` in the ITIM.
pub const RAMRODATA_TEXT_THRESHOLD: u64 = 0x8000;

pub const DEFAULT_STACK_SIZE: u64 = 0x400;
pub const DEFAULT_HEAP_SIZE: u64 = 0x400;

/// Size of each RNMI interrupt and exception handler window.
pub const RNMI_HANDLER_SIZE: u64 = 0x1000;

/// Permission alphabet used by linker script MEMORY declarations, in canonical order.
pub const ATTRIBUTE_ALPHABET: &str = "rwxai";

/// Path of the node whose children are the harts.
pub const CPUS_PATH: &str = "/cpus";

pub const CHOSEN_ENTRY: &str = "metal,entry";
pub const CHOSEN_RAM: &str = "metal,ram";
pub const CHOSEN_ITIM: &str = "metal,itim";
pub const CHOSEN_LIM: &str = "metal,lim";
pub const CHOSEN_BOOT_HART: &str = "metal,boothart";
pub const CHOSEN_ECC_SCRUB: &str = "metal,eccscrub";

pub const RNMI_INTERRUPT_VECTOR: &str = "sifive,rnmi-interrupt-vector";
pub const RNMI_EXCEPTION_VECTOR: &str = "sifive,rnmi-exception-vector";

/// Linker layout selected on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPolicy {
    #[default]
    Default,
    /// Code and data are loaded straight into RAM; nothing is copied out of ROM.
    Scratchpad,
    /// Read-only data lives in RAM; `.text` moves to a large enough ITIM.
    Ramrodata,
    /// Default placement plus the privileged sections the FreeRTOS MPU port expects.
    Freertos,
}

impl LayoutPolicy {
    pub const ALL: [LayoutPolicy; 4] = [
        LayoutPolicy::Default,
        LayoutPolicy::Scratchpad,
        LayoutPolicy::Ramrodata,
        LayoutPolicy::Freertos,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayoutPolicy::Default => "default",
            LayoutPolicy::Scratchpad => "scratchpad",
            LayoutPolicy::Ramrodata => "ramrodata",
            LayoutPolicy::Freertos => "freertos",
        }
    }
}

impl fmt::Display for LayoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutPolicy::ALL
            .into_iter()
            .find(|policy| policy.name() == s)
            .ok_or_else(|| format!("unknown layout policy: {}", s))
    }
}

/// Configures the generated layout.
/// These are the defaults that can be overridden on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutConfig {
    pub policy: LayoutPolicy,
    pub stack_size: u64,
    pub heap_size: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            policy: LayoutPolicy::Default,
            stack_size: DEFAULT_STACK_SIZE,
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }
}

impl LayoutConfig {
    pub fn with_policy(policy: LayoutPolicy) -> Self {
        LayoutConfig {
            policy,
            ..Default::default()
        }
    }

    pub fn hash_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("LAYOUT".to_string(), self.policy.to_string());
        map.insert(
            "DEFAULT_STACK_SIZE".to_string(),
            format!("0x{:x}", self.stack_size),
        );
        map.insert(
            "DEFAULT_HEAP_SIZE".to_string(),
            format!("0x{:x}", self.heap_size),
        );
        map
    }
}
