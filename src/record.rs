use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;
use thiserror::Error;

use crate::classfile::ClassHeader;
use crate::location::Location;

/// Qualified name of the universal root type.
pub const ROOT_TYPE: &str = "java.lang.Object";

/// Structural flags of a class, using the JVM access-flag bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlagSet(u16);

impl FlagSet {
    pub const PUBLIC: FlagSet = FlagSet(0x0001);
    pub const PRIVATE: FlagSet = FlagSet(0x0002);
    pub const PROTECTED: FlagSet = FlagSet(0x0004);
    pub const STATIC: FlagSet = FlagSet(0x0008);
    pub const FINAL: FlagSet = FlagSet(0x0010);
    pub const SYNCHRONIZED: FlagSet = FlagSet(0x0020);
    pub const VOLATILE: FlagSet = FlagSet(0x0040);
    pub const TRANSIENT: FlagSet = FlagSet(0x0080);
    pub const NATIVE: FlagSet = FlagSet(0x0100);
    pub const INTERFACE: FlagSet = FlagSet(0x0200);
    pub const ABSTRACT: FlagSet = FlagSet(0x0400);
    pub const STRICT: FlagSet = FlagSet(0x0800);

    const ALL_BITS: u16 = 0x0FFF;

    const NAMES: [(FlagSet, &'static str); 12] = [
        (Self::PUBLIC, "public"),
        (Self::PRIVATE, "private"),
        (Self::PROTECTED, "protected"),
        (Self::STATIC, "static"),
        (Self::FINAL, "final"),
        (Self::SYNCHRONIZED, "synchronized"),
        (Self::VOLATILE, "volatile"),
        (Self::TRANSIENT, "transient"),
        (Self::NATIVE, "native"),
        (Self::INTERFACE, "interface"),
        (Self::ABSTRACT, "abstract"),
        (Self::STRICT, "strict"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    /// Flags from a class header. Bit 0x0020 is `ACC_SUPER` there, not
    /// `synchronized`, so it is dropped.
    pub const fn from_class_access(raw: u16) -> Self {
        Self(raw & Self::ALL_BITS & !Self::SYNCHRONIZED.0)
    }

    /// Flags from an `InnerClasses` entry or a member, where every bit in
    /// range means what its name says.
    pub const fn from_member_access(raw: u16) -> Self {
        Self::from_bits_truncate(raw)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every flag in `other` is set.
    pub const fn contains(self, other: FlagSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag in `other` is set.
    pub const fn intersects(self, other: FlagSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: FlagSet) {
        self.0 |= other.0;
    }

    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.intersects(*flag))
            .map(|(_, name)| name)
    }
}

impl BitOr for FlagSet {
    type Output = FlagSet;

    fn bitor(self, rhs: FlagSet) -> FlagSet {
        FlagSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for FlagSet {
    fn bitor_assign(&mut self, rhs: FlagSet) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for FlagSet {
    type Output = FlagSet;

    fn bitand(self, rhs: FlagSet) -> FlagSet {
        FlagSet(self.0 & rhs.0)
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        f.write_str(&names.join(","))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown flag `{0}`")]
pub struct UnknownFlag(pub String);

impl FromStr for FlagSet {
    type Err = UnknownFlag;

    /// Accepts a comma or whitespace separated list such as `public,abstract`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = FlagSet::empty();
        for token in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let wanted = token.to_ascii_lowercase();
            let wanted = if wanted == "strictfp" { "strict".to_string() } else { wanted };
            let flag = Self::NAMES
                .iter()
                .find(|(_, name)| *name == wanted)
                .map(|(flag, _)| *flag)
                .ok_or_else(|| UnknownFlag(token.to_string()))?;
            flags |= flag;
        }
        Ok(flags)
    }
}

impl Serialize for FlagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names: Vec<&str> = self.names().collect();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

/// What indexing knows about one class: its header, unresolved, plus where it
/// was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassRecord {
    pub name: String,
    pub superclass_name: Option<String>,
    pub interface_names: Vec<String>,
    pub flags: FlagSet,
    pub origin: Location,
}

impl ClassRecord {
    pub fn from_header(header: ClassHeader, origin: Location) -> Self {
        Self {
            flags: FlagSet::from_class_access(header.access_flags),
            name: header.name,
            superclass_name: header.superclass_name,
            interface_names: header.interface_names,
            origin,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.flags.intersects(FlagSet::INTERFACE)
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_TYPE
    }

    pub fn package(&self) -> &str {
        self.name.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit_once('.').map(|(_, s)| s).unwrap_or(&self.name)
    }

    /// Nested classes compile to `Outer$Inner`; their declared modifiers live
    /// in the `InnerClasses` attribute rather than the header.
    pub fn is_nested(&self) -> bool {
        self.simple_name().contains('$')
    }
}
