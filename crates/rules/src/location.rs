//! Mapping between rule location names and the numeric location codes the backend expects.
//!
//! The numbering is part of the backend protocol and must not be reordered.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    Unknown = 0,
    Inheritance = 1,
    MethodCall = 2,
    ConstructorCall = 3,
    Annotation = 4,
    ImplementsType = 5,
    Enum = 6,
    ReturnType = 7,
    Import = 8,
    VariableDeclaration = 9,
    Type = 10,
    Package = 11,
    Field = 12,
    Method = 13,
    Class = 14,
}

const TABLE: [(LocationKind, &str); 15] = [
    (LocationKind::Unknown, "UNKNOWN"),
    (LocationKind::Inheritance, "INHERITANCE"),
    (LocationKind::MethodCall, "METHOD_CALL"),
    (LocationKind::ConstructorCall, "CONSTRUCTOR_CALL"),
    (LocationKind::Annotation, "ANNOTATION"),
    (LocationKind::ImplementsType, "IMPLEMENTS_TYPE"),
    (LocationKind::Enum, "ENUM"),
    (LocationKind::ReturnType, "RETURN_TYPE"),
    (LocationKind::Import, "IMPORT"),
    (LocationKind::VariableDeclaration, "VARIABLE_DECLARATION"),
    (LocationKind::Type, "TYPE"),
    (LocationKind::Package, "PACKAGE"),
    (LocationKind::Field, "FIELD"),
    (LocationKind::Method, "METHOD"),
    (LocationKind::Class, "CLASS"),
];

impl LocationKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        TABLE[self as usize].1
    }

    /// Case-insensitive lookup. The empty string is the explicit "unknown" location.
    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Some(LocationKind::Unknown);
        }
        TABLE
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(trimmed))
            .map(|(kind, _)| *kind)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let idx = code.trim().parse::<usize>().ok()?;
        TABLE.get(idx).map(|(kind, _)| *kind)
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Location name to backend code, `"0"` for anything unrecognized.
pub fn location_code(name: &str) -> String {
    match LocationKind::from_name(name) {
        Some(kind) => kind.code().to_string(),
        None => {
            log::warn!("Unknown location type '{name}', defaulting to 0");
            "0".to_string()
        }
    }
}

/// Backend code to location name, `"UNKNOWN"` for anything unrecognized.
pub fn location_name(code: &str) -> &'static str {
    match LocationKind::from_code(code) {
        Some(kind) => kind.name(),
        None => {
            log::warn!("Unknown location code '{code}', defaulting to UNKNOWN");
            LocationKind::Unknown.name()
        }
    }
}
