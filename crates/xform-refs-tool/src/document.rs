//! JSON description of a form document.
//!
//! ```json
//! {
//!   "root": "data",
//!   "itext": "<itext>...</itext>",
//!   "nodes": [
//!     { "name": "age", "kind": "question", "itext": { "label": "age-label" } },
//!     { "name": "eligible", "kind": "data-node",
//!       "properties": { "calculateAttr": "/data/age > 5" } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use xform_refs::{EngineConfig, Form, FormSession, FormTree, ItextSlot, NodeKind, Ufid};

fn default_root() -> String {
    "data".to_string()
}

fn default_kind() -> String {
    NodeKind::Question.as_str().to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSpec {
    #[serde(default = "default_root")]
    pub root: String,
    /// An `<itext>` block, or a whole document containing one.
    #[serde(default)]
    pub itext: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Slot name (`label`, `hint`, `help`, `constraintMsg`) to item id.
    #[serde(default)]
    pub itext: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

fn parse_kind(name: &str) -> Result<NodeKind> {
    const KINDS: [NodeKind; 6] = [
        NodeKind::Question,
        NodeKind::Group,
        NodeKind::Repeat,
        NodeKind::Choice,
        NodeKind::DataNode,
        NodeKind::Itemset,
    ];
    match KINDS.into_iter().find(|k| k.as_str() == name) {
        Some(kind) => Ok(kind),
        None => bail!("unknown node kind {name:?}"),
    }
}

fn parse_slot(name: &str) -> Result<ItextSlot> {
    match ItextSlot::ALL.into_iter().find(|s| s.name() == name) {
        Some(slot) => Ok(slot),
        None => bail!("unknown itext slot {name:?}"),
    }
}

impl DocumentSpec {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid document JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Builds the tree, loads the translations, then binds and fills in
    /// every node's translation slots.
    pub fn open(&self, config: EngineConfig) -> Result<FormSession> {
        let mut form = Form::new(self.root.as_str());
        let mut bindings = Vec::new();
        for node in &self.nodes {
            add_node(&mut form, None, node, &mut bindings)?;
        }

        let mut session = FormSession::new(form, config);
        if let Some(xml) = &self.itext {
            session.load_itext_xml(xml).context("invalid itext block")?;
        }
        for (node, slots) in bindings {
            for (slot, id) in slots {
                session.bind_itext(node, slot, &id)?;
            }
            session.ensure_itext_slots(node)?;
        }
        Ok(session)
    }
}

fn add_node(
    form: &mut Form,
    parent: Option<Ufid>,
    spec: &NodeSpec,
    bindings: &mut Vec<(Ufid, Vec<(ItextSlot, String)>)>,
) -> Result<()> {
    let kind = parse_kind(&spec.kind)?;
    let id = form.add_node(parent, &spec.name, kind)?;
    for (property, value) in &spec.properties {
        form.set_property(id, property, value)?;
    }
    let slots = spec
        .itext
        .iter()
        .map(|(slot, item)| Ok((parse_slot(slot)?, item.clone())))
        .collect::<Result<Vec<_>>>()?;
    bindings.push((id, slots));
    for child in &spec.children {
        add_node(form, Some(id), child, bindings)?;
    }
    Ok(())
}
