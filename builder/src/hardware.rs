// Licensed under the Apache-2.0 license

//! Access to the hardware description the layout is derived from.
//!
//! The resolution engine only talks to the [`HardwareDescription`] and [`HardwareNode`] traits.
//! [`DeviceDescription`] implements them for a devicetree-shaped TOML document:
//!
//! ```toml
//! [chosen]
//! "metal,entry" = { reference = "&flash", cells = [0, 0x400000] }
//! "metal,ram" = { reference = "/soc/dtim@80000000" }
//!
//! [[node]]
//! path = "/cpus/cpu@0"
//! reg = [[0]]
//!
//! [[node]]
//! path = "/soc/dtim@80000000"
//! reg = [[0x80000000, 0x4000]]
//! ```

use crate::error::{LayoutError, LayoutResult};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One `reg` entry of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<u64>")]
pub struct RegisterRange {
    pub base: u64,
    pub length: u64,
}

impl RegisterRange {
    pub fn new(base: u64, length: u64) -> Self {
        RegisterRange { base, length }
    }
}

impl TryFrom<Vec<u64>> for RegisterRange {
    type Error = String;

    fn try_from(cells: Vec<u64>) -> Result<Self, Self::Error> {
        match cells.as_slice() {
            [base] => Ok(RegisterRange::new(*base, 0)),
            [base, length] => Ok(RegisterRange::new(*base, *length)),
            _ => Err(format!(
                "reg entries must be [base] or [base, length], found {} cells",
                cells.len()
            )),
        }
    }
}

/// Value of a property under `/chosen`: an optional phandle followed by cells.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChosenProperty {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub cells: Vec<u64>,
}

impl ChosenProperty {
    pub fn reference(reference: &str, cells: &[u64]) -> Self {
        ChosenProperty {
            reference: Some(reference.to_string()),
            cells: cells.to_vec(),
        }
    }

    /// Cell `index`, or `default` when the property is shorter.
    pub fn cell_or(&self, index: usize, default: u64) -> u64 {
        self.cells.get(index).copied().unwrap_or(default)
    }
}

pub trait HardwareNode {
    /// Full path of the node; also its identity.
    fn path(&self) -> &str;

    fn registers(&self) -> &[RegisterRange];

    fn property(&self, name: &str) -> Option<&[u64]>;
}

pub trait HardwareDescription {
    type Node: HardwareNode;

    fn chosen(&self, name: &str) -> Option<&ChosenProperty>;

    /// Resolve a `&label` or a full node path.
    fn resolve(&self, reference: &str) -> Option<&Self::Node>;

    /// Direct children of `path` in description order, or `None` when `path` does not exist.
    fn children(&self, path: &str) -> Option<Vec<&Self::Node>>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceNode {
    pub path: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub reg: Vec<RegisterRange>,
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<u64>>,
}

impl DeviceNode {
    pub fn new(path: &str, reg: &[RegisterRange]) -> Self {
        DeviceNode {
            path: path.to_string(),
            reg: reg.to_vec(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_property(mut self, name: &str, cells: &[u64]) -> Self {
        self.properties.insert(name.to_string(), cells.to_vec());
        self
    }

    fn parent(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some(("", _)) | None => "/",
            Some((parent, _)) => parent,
        }
    }
}

impl HardwareNode for DeviceNode {
    fn path(&self) -> &str {
        &self.path
    }

    fn registers(&self) -> &[RegisterRange] {
        &self.reg
    }

    fn property(&self, name: &str) -> Option<&[u64]> {
        self.properties.get(name).map(Vec::as_slice)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescription {
    #[serde(default)]
    chosen: BTreeMap<String, ChosenProperty>,
    #[serde(default, rename = "node")]
    nodes: Vec<DeviceNode>,
}

/// A hardware description loaded from TOML.
#[derive(Clone, Debug, Default)]
pub struct DeviceDescription {
    chosen: BTreeMap<String, ChosenProperty>,
    nodes: Vec<DeviceNode>,
    by_path: HashMap<String, usize>,
    by_label: HashMap<String, usize>,
}

impl DeviceDescription {
    pub fn new(
        chosen: impl IntoIterator<Item = (String, ChosenProperty)>,
        nodes: Vec<DeviceNode>,
    ) -> Result<Self, String> {
        let mut by_path = HashMap::new();
        let mut by_label = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            if !node.path.starts_with('/') {
                return Err(format!("node path {} is not absolute", node.path));
            }
            if by_path.insert(node.path.clone(), index).is_some() {
                return Err(format!("duplicate node path {}", node.path));
            }
            if let Some(label) = &node.label {
                if by_label.insert(label.clone(), index).is_some() {
                    return Err(format!("duplicate node label {}", label));
                }
            }
        }
        Ok(DeviceDescription {
            chosen: chosen.into_iter().collect(),
            nodes,
            by_path,
            by_label,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> LayoutResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| LayoutError::Description {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::parse(&source).map_err(|message| LayoutError::Description {
            path: path.to_path_buf(),
            message,
        })
    }

    fn parse(source: &str) -> Result<Self, String> {
        let raw: RawDescription = toml::from_str(source).map_err(|err| err.to_string())?;
        Self::new(raw.chosen, raw.nodes)
    }

    pub fn nodes(&self) -> &[DeviceNode] {
        &self.nodes
    }

    fn exists(&self, path: &str) -> bool {
        path == "/"
            || self.by_path.contains_key(path)
            || self.nodes.iter().any(|node| {
                node.path
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('/'))
            })
    }
}

impl FromStr for DeviceDescription {
    type Err = LayoutError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source).map_err(|message| LayoutError::Description {
            path: PathBuf::from("<string>"),
            message,
        })
    }
}

impl HardwareDescription for DeviceDescription {
    type Node = DeviceNode;

    fn chosen(&self, name: &str) -> Option<&ChosenProperty> {
        self.chosen.get(name)
    }

    fn resolve(&self, reference: &str) -> Option<&DeviceNode> {
        let index = match reference.strip_prefix('&') {
            Some(label) => self.by_label.get(label),
            None => self.by_path.get(reference),
        }?;
        self.nodes.get(*index)
    }

    fn children(&self, path: &str) -> Option<Vec<&DeviceNode>> {
        if !self.exists(path) {
            return None;
        }
        Some(
            self.nodes
                .iter()
                .filter(|node| node.path != "/" && node.parent() == path)
                .collect(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DESCRIPTION: &str = r#"
        [chosen]
        "metal,entry" = { reference = "&spi0", cells = [1, 0x400000] }
        "metal,eccscrub" = { cells = [1] }

        [[node]]
        path = "/cpus/cpu@0"
        reg = [[0]]

        [[node]]
        path = "/cpus/cpu@1"
        reg = [[1]]
        properties = { "sifive,rnmi-interrupt-vector" = [0x0, 0x1000] }

        [[node]]
        path = "/soc/spi@10014000"
        label = "spi0"
        reg = [[0x10014000, 0x1000], [0x20000000, 0x20000000]]
    "#;

    #[test]
    fn test_parse_description() {
        let dts: DeviceDescription = DESCRIPTION.parse().unwrap();
        let entry = dts.chosen("metal,entry").unwrap();
        assert_eq!(entry.reference.as_deref(), Some("&spi0"));
        assert_eq!(entry.cell_or(1, 0), 0x400000);
        assert_eq!(entry.cell_or(2, 7), 7);

        let spi = dts.resolve("&spi0").unwrap();
        assert_eq!(spi.path(), "/soc/spi@10014000");
        assert_eq!(
            spi.registers(),
            &[
                RegisterRange::new(0x10014000, 0x1000),
                RegisterRange::new(0x20000000, 0x20000000)
            ]
        );
        assert_eq!(
            dts.resolve("/soc/spi@10014000").map(|n| n.path()),
            Some("/soc/spi@10014000")
        );
        assert!(dts.resolve("&spi1").is_none());
    }

    #[test]
    fn test_children_in_description_order() {
        let dts: DeviceDescription = DESCRIPTION.parse().unwrap();
        let harts = dts.children("/cpus").unwrap();
        let paths: Vec<_> = harts.iter().map(|n| n.path()).collect();
        assert_eq!(paths, ["/cpus/cpu@0", "/cpus/cpu@1"]);
        assert_eq!(
            harts[1].property("sifive,rnmi-interrupt-vector"),
            Some(&[0x0, 0x1000][..])
        );
        // "/soc" is implied by its child even though it is never declared.
        assert_eq!(dts.children("/soc").unwrap().len(), 1);
        assert!(dts.children("/memory").is_none());
        assert!(dts.children("/cpu").is_none());
    }

    #[test]
    fn test_rejects_malformed_descriptions() {
        let bad_reg = r#"
            [[node]]
            path = "/soc/ram"
            reg = [[1, 2, 3]]
        "#;
        let err = bad_reg.parse::<DeviceDescription>().unwrap_err();
        assert!(err.to_string().contains("reg entries"), "{}", err);

        let duplicate = r#"
            [[node]]
            path = "/soc/ram"

            [[node]]
            path = "/soc/ram"
        "#;
        let err = duplicate.parse::<DeviceDescription>().unwrap_err();
        assert!(err.to_string().contains("duplicate node path"), "{}", err);
    }

    #[test]
    fn test_from_file_reports_path() {
        let err = DeviceDescription::from_file("/nonexistent/board.toml").unwrap_err();
        match err {
            LayoutError::Description { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/board.toml"))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
