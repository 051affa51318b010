//! Node kinds, translation slots and itemset data.

use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::itext::ItemKey;
use crate::model::id::Ufid;

/// Kind of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A control bound to a data node.
    Question,
    Group,
    Repeat,
    /// An option of a select question.
    Choice,
    /// A data node with no control.
    DataNode,
    /// Dynamic data source of a select question. Has a control but no data node.
    Itemset,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Question => "question",
            NodeKind::Group => "group",
            NodeKind::Repeat => "repeat",
            NodeKind::Choice => "choice",
            NodeKind::DataNode => "data-node",
            NodeKind::Itemset => "itemset",
        }
    }

    /// Group kinds move their whole subtree along with them.
    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::Group | NodeKind::Repeat)
    }

    pub fn is_data_only(&self) -> bool {
        matches!(self, NodeKind::DataNode)
    }

    pub fn is_control_only(&self) -> bool {
        matches!(self, NodeKind::Itemset)
    }
}

/// The translatable text slots of a node, in collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItextSlot {
    Label,
    Hint,
    Help,
    ConstraintMsg,
}

impl ItextSlot {
    pub const ALL: [ItextSlot; 4] = [
        ItextSlot::Label,
        ItextSlot::Hint,
        ItextSlot::Help,
        ItextSlot::ConstraintMsg,
    ];

    /// Suffix used when deriving an item id, e.g. `data-age-label`.
    pub fn name(&self) -> &'static str {
        match self {
            ItextSlot::Label => "label",
            ItextSlot::Hint => "hint",
            ItextSlot::Help => "help",
            ItextSlot::ConstraintMsg => "constraintMsg",
        }
    }

    /// Property name of the slot in the node schema.
    pub fn property(&self) -> &'static str {
        match self {
            ItextSlot::Label => "labelItext",
            ItextSlot::Hint => "hintItext",
            ItextSlot::Help => "helpItext",
            ItextSlot::ConstraintMsg => "constraintMsgItext",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A node of the in-memory [`Form`](crate::model::Form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: Ufid,
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<Ufid>,
    pub children: Vec<Ufid>,
    pub properties: FxHashMap<String, String>,
    pub itext: [Option<ItemKey>; 4],
}

impl Node {
    pub fn new(id: Ufid, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            parent: None,
            children: Vec::new(),
            properties: FxHashMap::default(),
            itext: [None; 4],
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn itext_slot(&self, slot: ItextSlot) -> Option<ItemKey> {
        self.itext[slot.index()]
    }
}

lazy_static! {
    /// A trailing `[...]` filter with no nested opening bracket.
    static ref END_FILTER: Regex = Regex::new(r"\[[^\[]*\]$").unwrap();
}

/// The data source of an [`NodeKind::Itemset`] node.
///
/// Stored on the node as four flat properties (see [`ItemsetData::NODESET`]
/// and friends) so the reference graph can track each one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemsetData {
    pub nodeset: String,
    pub filter_ref: String,
    pub label_ref: String,
    pub value_ref: String,
}

impl ItemsetData {
    pub const NODESET: &'static str = "itemsetData/nodeset";
    pub const FILTER_REF: &'static str = "itemsetData/filterRef";
    pub const LABEL_REF: &'static str = "itemsetData/labelRef";
    pub const VALUE_REF: &'static str = "itemsetData/valueRef";

    /// Splits the trailing filter off a full `nodeset` attribute.
    pub fn from_nodeset(
        nodeset: &str,
        label_ref: impl Into<String>,
        value_ref: impl Into<String>,
    ) -> Self {
        let (nodeset, filter_ref) = match END_FILTER.find(nodeset) {
            Some(m) => (&nodeset[..m.start()], m.as_str()),
            None => (nodeset, ""),
        };
        Self {
            nodeset: nodeset.to_string(),
            filter_ref: filter_ref.to_string(),
            label_ref: label_ref.into(),
            value_ref: value_ref.into(),
        }
    }

    /// The full `nodeset` attribute, filter included.
    pub fn to_nodeset(&self) -> String {
        format!("{}{}", self.nodeset, self.filter_ref)
    }

    /// Reads the data back from a node's properties.
    pub fn from_node(node: &Node) -> Self {
        let get = |name: &str| node.property(name).unwrap_or_default().to_string();
        Self {
            nodeset: get(Self::NODESET),
            filter_ref: get(Self::FILTER_REF),
            label_ref: get(Self::LABEL_REF),
            value_ref: get(Self::VALUE_REF),
        }
    }

    /// The data as `(property, value)` pairs.
    pub fn properties(&self) -> [(&'static str, &str); 4] {
        [
            (Self::NODESET, &self.nodeset),
            (Self::FILTER_REF, &self.filter_ref),
            (Self::LABEL_REF, &self.label_ref),
            (Self::VALUE_REF, &self.value_ref),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_itemset_nodeset_split() {
        let data = ItemsetData::from_nodeset(
            "instance('fruit')/fruit_list/fruit[@type = /data/kind]",
            "name",
            "@id",
        );
        assert_eq!(data.nodeset, "instance('fruit')/fruit_list/fruit");
        assert_eq!(data.filter_ref, "[@type = /data/kind]");
        assert_eq!(
            data.to_nodeset(),
            "instance('fruit')/fruit_list/fruit[@type = /data/kind]"
        );

        let plain = ItemsetData::from_nodeset("instance('x')/items/item", "", "");
        assert_eq!(plain.filter_ref, "");
        assert_eq!(plain.to_nodeset(), "instance('x')/items/item");
    }

    #[test]
    fn test_itemset_roundtrips_through_node() {
        let data = ItemsetData::from_nodeset("/data/src[. != '']", "label", "value");
        let mut node = Node::new(Ufid::from_u128(1), "itemset", NodeKind::Itemset);
        for (name, value) in data.properties() {
            node.properties.insert(name.to_string(), value.to_string());
        }
        assert_eq!(ItemsetData::from_node(&node), data);
    }

    #[test]
    fn test_slot_order_and_names() {
        let names: Vec<_> = ItextSlot::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["label", "hint", "help", "constraintMsg"]);
        assert!(NodeKind::Repeat.is_group());
        assert!(!NodeKind::Choice.is_group());
    }
}
