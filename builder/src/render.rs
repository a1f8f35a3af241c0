// Licensed under the Apache-2.0 license

//! Turns a [`LinkerParameters`] set into linker script text.

use crate::error::LayoutResult;
use crate::params::LinkerParameters;
use ldscript_config::{LayoutConfig, LayoutPolicy};
use std::collections::HashMap;

const DEFAULT_LD_TEMPLATE: &str = include_str!("../templates/default.lds");
const SCRATCHPAD_LD_TEMPLATE: &str = include_str!("../templates/scratchpad.lds");
const RAMRODATA_LD_TEMPLATE: &str = include_str!("../templates/ramrodata.lds");
const FREERTOS_LD_TEMPLATE: &str = include_str!("../templates/freertos.lds");

pub fn builtin_template(policy: LayoutPolicy) -> &'static str {
    match policy {
        LayoutPolicy::Default => DEFAULT_LD_TEMPLATE,
        LayoutPolicy::Scratchpad => SCRATCHPAD_LD_TEMPLATE,
        LayoutPolicy::Ramrodata => RAMRODATA_LD_TEMPLATE,
        LayoutPolicy::Freertos => FREERTOS_LD_TEMPLATE,
    }
}

/// Flatten the parameter set into the `$VARIABLES` a template can reference.
pub fn template_variables(
    params: &LinkerParameters,
    config: &LayoutConfig,
) -> HashMap<String, String> {
    let mut map = config.hash_map();

    let memory = params
        .memories
        .iter()
        .map(|m| {
            format!(
                "    {} ({}) : ORIGIN = {}, LENGTH = {}",
                m.name, m.permissions, m.base_hex, m.length_hex
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    map.insert("MEMORY".to_string(), memory);

    let rnmi_memory = params
        .rnmis
        .iter()
        .map(|rnmi| {
            format!(
                "    rnmi_irq{id} (rx) : ORIGIN = {}, LENGTH = {}\n    rnmi_exc{id} (rx) : ORIGIN = {}, LENGTH = {}",
                rnmi.irq_base_hex,
                rnmi.irq_length_hex,
                rnmi.exception_base_hex,
                rnmi.exception_length_hex,
                id = rnmi.id,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    map.insert("RNMI_MEMORY".to_string(), rnmi_memory);

    let rnmi_sections = params
        .rnmis
        .iter()
        .map(|rnmi| {
            format!(
                "    .rnmi_irq{id} : {{\n        KEEP (*(.text.rnmi_irq{id} .text.rnmi_irq{id}.*))\n    }} >rnmi_irq{id}\n\n    .rnmi_exc{id} : {{\n        KEEP (*(.text.rnmi_exc{id} .text.rnmi_exc{id}.*))\n    }} >rnmi_exc{id}",
                id = rnmi.id,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    map.insert("RNMI_SECTIONS".to_string(), rnmi_sections);

    let ram_segments = params
        .ram_memories
        .iter()
        .map(|m| {
            format!(
                "    PROVIDE( metal_segment_{name}_ram_start = ORIGIN({name}) );\n    PROVIDE( metal_segment_{name}_ram_end = ORIGIN({name}) + LENGTH({name}) );",
                name = m.name,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    map.insert("RAM_SEGMENTS".to_string(), ram_segments);

    for (prefix, placement) in [
        ("ROM", &params.rom),
        ("RAM", &params.ram),
        ("ITIM", &params.itim),
        ("LIM", &params.lim),
    ] {
        map.insert(format!("{}_LMA", prefix), placement.lma.to_string());
        map.insert(format!("{}_VMA", prefix), placement.vma.to_string());
    }
    let text = if params.text_in_itim {
        &params.itim
    } else {
        &params.rom
    };
    map.insert("TEXT_LMA".to_string(), text.lma.to_string());
    map.insert("TEXT_VMA".to_string(), text.vma.to_string());

    map.insert("NUM_HARTS".to_string(), params.num_harts.to_string());
    map.insert("BOOT_HART".to_string(), params.boot_hart.to_string());
    map.insert(
        "TEXT_IN_ITIM".to_string(),
        u8::from(params.text_in_itim).to_string(),
    );
    map.insert("ECC_SCRUB".to_string(), params.ecc_scrub.to_string());
    map
}

pub fn render_template(
    template: &str,
    params: &LinkerParameters,
    config: &LayoutConfig,
) -> LayoutResult<String> {
    let map = template_variables(params, config);
    Ok(subst::substitute(template, &map)?)
}

/// Render with the built-in template of the configured policy.
pub fn render(params: &LinkerParameters, config: &LayoutConfig) -> LayoutResult<String> {
    render_template(builtin_template(config.policy), params, config)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::LayoutError;
    use crate::load_map::PlacementNames;
    use crate::params::{MemoryParameters, RnmiParameters};

    fn memory(name: &'static str, permissions: &str, base: &str, length: &str) -> MemoryParameters {
        MemoryParameters {
            name,
            permissions: permissions.to_string(),
            base_hex: base.to_string(),
            length_hex: length.to_string(),
        }
    }

    fn params(text_in_itim: bool) -> LinkerParameters {
        let ram = memory("ram", "rwa!xi", "0x80000000", "0x4000");
        LinkerParameters {
            layout: LayoutPolicy::Ramrodata,
            memories: vec![
                memory("itim", "rwxai", "0x8000000", "0x8000"),
                ram.clone(),
                memory("rom", "rxi!wa", "0x20000000", "0x10000"),
            ],
            ram_memories: vec![ram],
            rom: PlacementNames { lma: "rom", vma: "rom" },
            ram: PlacementNames { lma: "rom", vma: "ram" },
            itim: PlacementNames { lma: "rom", vma: "itim" },
            lim: PlacementNames { lma: "rom", vma: "ram" },
            num_harts: 2,
            boot_hart: 1,
            text_in_itim,
            ecc_scrub: 0,
            rnmis: vec![RnmiParameters {
                id: 0,
                irq_base_hex: "0x1000".to_string(),
                irq_length_hex: "0x1000".to_string(),
                exception_base_hex: "0x2000".to_string(),
                exception_length_hex: "0x1000".to_string(),
            }],
            default_stack_size: "0x400".to_string(),
            default_heap_size: "0x400".to_string(),
        }
    }

    #[test]
    fn test_variables() {
        let config = LayoutConfig::with_policy(LayoutPolicy::Ramrodata);
        let map = template_variables(&params(true), &config);
        assert_eq!(map["LAYOUT"], "ramrodata");
        assert_eq!(map["TEXT_VMA"], "itim");
        assert_eq!(map["TEXT_LMA"], "rom");
        assert_eq!(map["TEXT_IN_ITIM"], "1");
        assert_eq!(map["BOOT_HART"], "1");
        assert!(map["MEMORY"].contains("    ram (rwa!xi) : ORIGIN = 0x80000000, LENGTH = 0x4000"));
        assert!(map["RNMI_MEMORY"].contains("rnmi_exc0 (rx) : ORIGIN = 0x2000, LENGTH = 0x1000"));
        assert!(map["RAM_SEGMENTS"].contains("metal_segment_ram_ram_start = ORIGIN(ram)"));

        let map = template_variables(&params(false), &config);
        assert_eq!(map["TEXT_VMA"], "rom");
        assert_eq!(map["TEXT_IN_ITIM"], "0");
    }

    #[test]
    fn test_builtin_templates_render() {
        for policy in LayoutPolicy::ALL {
            let config = LayoutConfig::with_policy(policy);
            let script = render(&params(true), &config).unwrap();
            assert!(script.contains("__global_pointer$ = . + 0x800"), "{}", policy);
            assert!(script.contains("PROVIDE(__metal_boot_hart = 1);"), "{}", policy);
            assert!(script.contains(&format!("Layout: {}", policy)));
        }
    }

    #[test]
    fn test_ramrodata_places_rodata_in_ram() {
        let config = LayoutConfig::with_policy(LayoutPolicy::Ramrodata);
        let script = render(&params(true), &config).unwrap();
        assert!(script.contains(
            "    } >ram AT>rom :ram_init\n\n    PROVIDE( metal_segment_rodata_source_start"
        ));
        assert!(script.contains("    } >itim AT>rom :text"));
    }

    #[test]
    fn test_freertos_privileged_sections() {
        let config = LayoutConfig::with_policy(LayoutPolicy::Freertos);
        let script = render(&params(false), &config).unwrap();
        assert!(script.contains("__privileged_functions_start__"));
        assert!(script.contains("__privileged_data_end__"));
        assert!(script.contains("__SRAM_segment_start__ = ORIGIN(ram)"));
    }

    #[test]
    fn test_unknown_variable_fails() {
        let err = render_template(
            "MEMORY { $MEMORY }\n$NOT_A_PARAMETER\n",
            &params(false),
            &LayoutConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::Render(_)), "{:?}", err);
    }
}
