//! Static per-kind property registry.
//!
//! Each [`NodeKind`] gets a [`NodeSchema`] built once: which properties a
//! node of that kind may carry, which of them hold expressions to track, and
//! the validation function for each.

use lazy_static::lazy_static;

use crate::itext::{default_itext_id, ItextModel};
use crate::model::form::FormTree;
use crate::model::id::Ufid;
use crate::model::node::{ItemsetData, ItextSlot, NodeKind};

/// Whether a property may appear on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    Optional,
    Required,
    NotAllowed,
}

/// Checks one property of a node. Returns a message when it fails.
pub type Validator = fn(&dyn FormTree, Ufid, &ItextModel) -> Option<String>;

/// Definition of one property.
#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub presence: Presence,
    /// The value is an expression whose paths are tracked.
    pub reference_bearing: bool,
    pub validate: Option<Validator>,
}

impl PropertySpec {
    const fn new(name: &'static str, display_name: &'static str) -> Self {
        Self {
            name,
            display_name,
            presence: Presence::Optional,
            reference_bearing: false,
            validate: None,
        }
    }

    const fn expression(mut self) -> Self {
        self.reference_bearing = true;
        self
    }

    const fn not_allowed(mut self) -> Self {
        self.presence = Presence::NotAllowed;
        self
    }

    const fn validated(mut self, validate: Validator) -> Self {
        self.validate = Some(validate);
        self
    }
}

/// Every property definition for one node kind.
#[derive(Debug, Clone)]
pub struct NodeSchema {
    kind: NodeKind,
    properties: Vec<PropertySpec>,
}

impl NodeSchema {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn presence(&self, name: &str) -> Presence {
        self.property(name)
            .map_or(Presence::NotAllowed, |p| p.presence)
    }

    pub fn allows(&self, name: &str) -> bool {
        self.presence(name) != Presence::NotAllowed
    }

    pub fn allows_slot(&self, slot: ItextSlot) -> bool {
        self.allows(slot.property())
    }

    pub fn is_reference_bearing(&self, name: &str) -> bool {
        self.property(name)
            .is_some_and(|p| p.reference_bearing && p.presence != Presence::NotAllowed)
    }

    /// Human readable property name used in messages.
    pub fn display_name<'a>(&self, name: &'a str) -> &'a str {
        match self.property(name) {
            Some(spec) => spec.display_name,
            None => name,
        }
    }

    /// Runs every validator that applies to this kind.
    pub fn validate(&self, form: &dyn FormTree, node: Ufid, model: &ItextModel) -> Vec<String> {
        self.properties
            .iter()
            .filter(|p| p.presence != Presence::NotAllowed)
            .filter_map(|p| p.validate.and_then(|f| f(form, node, model)))
            .collect()
    }
}

// =============================================================================
// Validators
// =============================================================================

fn slot_item<'a>(
    form: &dyn FormTree,
    node: Ufid,
    model: &'a ItextModel,
    slot: ItextSlot,
) -> Option<&'a crate::itext::ItextItem> {
    form.itext_slot(node, slot).and_then(|key| model.item(key))
}

/// Ids are written into an XML attribute.
fn is_valid_attribute_value(id: &str) -> bool {
    !id.contains(['<', '&', '"'])
}

fn check_itext(
    form: &dyn FormTree,
    node: Ufid,
    model: &ItextModel,
    slot: ItextSlot,
    name: &str,
) -> Option<String> {
    let item = slot_item(form, node, model, slot)?;
    // automatic ids are only assigned when the document is written
    let id = if item.auto_id && item.id.is_empty() {
        default_itext_id(form, node, slot)
    } else {
        item.id.clone()
    };
    if !is_valid_attribute_value(&id) {
        return Some(format!("{name} ID {id:?} is not a valid ID."));
    }
    let value = item.default_value(model.languages()).unwrap_or_default();
    if !id.is_empty() && value.is_empty() {
        return Some(format!("Question has {name} ID but no {name} label!"));
    }
    if !value.is_empty() && id.is_empty() {
        return Some(format!("Question has {name} label but no {name} ID!"));
    }
    None
}

fn validate_label(form: &dyn FormTree, node: Ufid, model: &ItextModel) -> Option<String> {
    check_itext(form, node, model, ItextSlot::Label, "label")
}

fn validate_hint(form: &dyn FormTree, node: Ufid, model: &ItextModel) -> Option<String> {
    // An empty hint is normal; only a broken id is reported.
    let item = slot_item(form, node, model, ItextSlot::Hint)?;
    if item.is_empty() {
        return (!is_valid_attribute_value(&item.id))
            .then(|| format!("hint ID {:?} is not a valid ID.", item.id));
    }
    check_itext(form, node, model, ItextSlot::Hint, "hint")
}

fn validate_help(form: &dyn FormTree, node: Ufid, model: &ItextModel) -> Option<String> {
    let item = slot_item(form, node, model, ItextSlot::Help)?;
    if item.is_empty() {
        return (!is_valid_attribute_value(&item.id))
            .then(|| format!("help ID {:?} is not a valid ID.", item.id));
    }
    check_itext(form, node, model, ItextSlot::Help, "help")
}

fn validate_constraint_msg(
    form: &dyn FormTree,
    node: Ufid,
    model: &ItextModel,
) -> Option<String> {
    let has_message = slot_item(form, node, model, ItextSlot::ConstraintMsg)
        .is_some_and(|item| !item.is_empty())
        || form
            .property(node, "constraintMsgAttr")
            .is_some_and(|v| !v.is_empty());
    let has_condition = form
        .property(node, "constraintAttr")
        .is_some_and(|v| !v.is_empty());
    (has_message && !has_condition)
        .then(|| "Can't have a Validation Message without a Validation Condition".to_string())
}

fn validate_itemset(form: &dyn FormTree, node: Ufid, _model: &ItextModel) -> Option<String> {
    let get = |name| form.property(node, name).unwrap_or_default();
    if get(ItemsetData::NODESET).is_empty() {
        return Some("A data source must be selected.".into());
    }
    if get(ItemsetData::VALUE_REF).is_empty() {
        return Some("Choice Value must be specified.".into());
    }
    if get(ItemsetData::LABEL_REF).is_empty() {
        return Some("Choice Label must be specified.".into());
    }
    None
}

// =============================================================================
// Registry
// =============================================================================

const LABEL: PropertySpec = PropertySpec::new("label", "Default Label").expression();
const HINT_LABEL: PropertySpec = PropertySpec::new("hintLabel", "Hint").expression();
const LABEL_ITEXT: PropertySpec =
    PropertySpec::new("labelItext", "Label Itext").validated(validate_label);
const HINT_ITEXT: PropertySpec =
    PropertySpec::new("hintItext", "Hint Itext").validated(validate_hint);
const HELP_ITEXT: PropertySpec =
    PropertySpec::new("helpItext", "Help Itext").validated(validate_help);
const CONSTRAINT_MSG_ITEXT: PropertySpec =
    PropertySpec::new("constraintMsgItext", "Validation Message Itext")
        .validated(validate_constraint_msg);
const CONSTRAINT_MSG: PropertySpec =
    PropertySpec::new("constraintMsgAttr", "Validation Message").expression();
const RELEVANT: PropertySpec = PropertySpec::new("relevantAttr", "Display Condition").expression();
const CONSTRAINT: PropertySpec =
    PropertySpec::new("constraintAttr", "Validation Condition").expression();
const CALCULATE: PropertySpec =
    PropertySpec::new("calculateAttr", "Calculate Condition").expression();
const REQUIRED: PropertySpec = PropertySpec::new("requiredAttr", "Is Required").expression();
const REPEAT_COUNT: PropertySpec = PropertySpec::new("repeat_count", "Repeat Count").expression();
const NODESET: PropertySpec =
    PropertySpec::new(ItemsetData::NODESET, "Data Source").expression().validated(validate_itemset);
const FILTER_REF: PropertySpec =
    PropertySpec::new(ItemsetData::FILTER_REF, "Choice Filter").expression();
const LABEL_REF: PropertySpec = PropertySpec::new(ItemsetData::LABEL_REF, "Choice Label");
const VALUE_REF: PropertySpec = PropertySpec::new(ItemsetData::VALUE_REF, "Choice Value");

fn build(kind: NodeKind) -> NodeSchema {
    let control = [LABEL, HINT_LABEL, LABEL_ITEXT, HINT_ITEXT, HELP_ITEXT];
    let bind = [CONSTRAINT_MSG_ITEXT, CONSTRAINT_MSG, RELEVANT, CONSTRAINT, CALCULATE, REQUIRED];
    let itemset = [NODESET, FILTER_REF, LABEL_REF, VALUE_REF];

    let mut properties: Vec<PropertySpec> = Vec::new();
    match kind {
        NodeKind::Question => {
            properties.extend(control);
            properties.extend(bind);
        }
        NodeKind::Group | NodeKind::Repeat => {
            properties.extend([LABEL, LABEL_ITEXT, RELEVANT]);
            properties.extend(
                [HINT_LABEL, HINT_ITEXT, HELP_ITEXT, CONSTRAINT_MSG_ITEXT, CONSTRAINT_MSG]
                    .map(PropertySpec::not_allowed),
            );
            if kind == NodeKind::Repeat {
                properties.push(REPEAT_COUNT);
            }
        }
        NodeKind::Choice => {
            properties.extend([LABEL, LABEL_ITEXT]);
            properties.extend(
                [HINT_LABEL, HINT_ITEXT, HELP_ITEXT, CONSTRAINT_MSG_ITEXT]
                    .map(PropertySpec::not_allowed),
            );
        }
        NodeKind::DataNode => {
            properties.extend(control.map(PropertySpec::not_allowed));
            properties.extend(bind);
        }
        NodeKind::Itemset => {
            properties.extend(control.map(PropertySpec::not_allowed));
            properties.push(CONSTRAINT_MSG_ITEXT.not_allowed());
            properties.extend(itemset);
        }
    }
    NodeSchema { kind, properties }
}

struct Registry {
    question: NodeSchema,
    group: NodeSchema,
    repeat: NodeSchema,
    choice: NodeSchema,
    data_node: NodeSchema,
    itemset: NodeSchema,
}

lazy_static! {
    static ref REGISTRY: Registry = Registry {
        question: build(NodeKind::Question),
        group: build(NodeKind::Group),
        repeat: build(NodeKind::Repeat),
        choice: build(NodeKind::Choice),
        data_node: build(NodeKind::DataNode),
        itemset: build(NodeKind::Itemset),
    };
}

/// The schema of a node kind.
pub fn schema_for(kind: NodeKind) -> &'static NodeSchema {
    let registry: &'static Registry = &REGISTRY;
    match kind {
        NodeKind::Question => &registry.question,
        NodeKind::Group => &registry.group,
        NodeKind::Repeat => &registry.repeat,
        NodeKind::Choice => &registry.choice,
        NodeKind::DataNode => &registry.data_node,
        NodeKind::Itemset => &registry.itemset,
    }
}
