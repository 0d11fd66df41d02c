//! Identifier casing collaborator.

use heck::{ToLowerCamelCase, ToUpperCamelCase};

/// What kind of graph identifier a source name is being turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    VertexClass,
    EdgeClass,
    Property,
}

/// Maps source identifiers (table and column names) to graph identifiers.
pub trait NameResolver {
    fn resolve(&self, source: &str, kind: IdentifierKind) -> String;
}

/// Default convention: `PARENT_AUTHOR` becomes the vertex class
/// `ParentAuthor`, `AUTHOR_NAME` becomes the property `authorName`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNameResolver;

impl NameResolver for DefaultNameResolver {
    fn resolve(&self, source: &str, kind: IdentifierKind) -> String {
        match kind {
            IdentifierKind::VertexClass | IdentifierKind::EdgeClass => {
                source.to_upper_camel_case()
            }
            IdentifierKind::Property => source.to_lower_camel_case(),
        }
    }
}
