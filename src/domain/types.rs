//! Identifier newtypes shared across the content model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;

/// Identifies a content node (item) in the repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

/// Identifies a template (schema) that content nodes are instances of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(Uuid);

macro_rules! guid_newtype {
    ($ty:ident, $entity:literal) => {
        impl $ty {
            pub const fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse plain, hyphenated or braced (`{...}`) GUID text.
            pub fn parse(raw: &str) -> Result<Self, DomainError> {
                Uuid::try_parse(raw.trim()).map(Self).map_err(|err| {
                    DomainError::validation(format!(
                        concat!("invalid ", $entity, " id `{}`: {}"),
                        raw, err
                    ))
                })
            }
        }

        impl FromStr for $ty {
            type Err = DomainError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Self::parse(raw)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.braced())
            }
        }
    };
}

guid_newtype!(NodeId, "node");
guid_newtype!(TemplateId, "template");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_braced_and_plain_forms() {
        let braced = NodeId::parse("{3C16B828-9F51-422B-9A02-B87F49C05C6A}").expect("braced id");
        let plain = NodeId::parse("3c16b828-9f51-422b-9a02-b87f49c05c6a").expect("plain id");
        assert_eq!(braced, plain);
        assert_eq!(
            braced.to_string(),
            "{3c16b828-9f51-422b-9a02-b87f49c05c6a}"
        );
    }

    #[test]
    fn rejects_garbage() {
        let err = TemplateId::parse("not-a-guid").expect_err("garbage must fail");
        assert!(matches!(err, DomainError::Validation { .. }));
    }
}
