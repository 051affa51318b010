//! The document tree the engine works against.
//!
//! The engine never owns nodes. It reaches them through [`FormTree`] by
//! stable [`Ufid`] and absolute path; [`Form`] is the in-memory tree used by
//! the session, the tool and the tests.

pub mod form;
pub mod id;
pub mod node;
pub mod schema;

pub use form::{is_valid_node_name, Form, FormTree, PathChange};
pub use id::Ufid;
pub use node::{ItemsetData, ItextSlot, Node, NodeKind};
pub use schema::{schema_for, NodeSchema, Presence, PropertySpec, Validator};
