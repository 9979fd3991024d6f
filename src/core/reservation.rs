// This module defines Reservation, the compile-time descriptor of where a value currently
// lives. A reservation is either a register (named by its calling-convention role) or a
// frame-relative stack offset, tagged with the value's Type so loads and stores can pick a
// byte or doubleword width. An unassigned reservation is the sentinel for "no storage yet".
// A reservation does not own the slot it describes; the slot's lifetime is governed by the
// stack frame's push/pop discipline, so clones are just handles to the same storage.

//! Storage descriptors for values during code generation.

use std::fmt;

use super::register_file::Register;
use crate::ast::Type;

/// Where a value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Location {
    /// No storage has been assigned.
    #[default]
    Unassigned,
    Register(Register),
    /// Positive byte offset below the frame pointer: the value occupies
    /// `[fp - offset, fp - offset + size)`.
    Stack(i64),
}

/// A value's storage location plus the type that decides its access width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Reservation {
    pub location: Location,
    pub ty: Type,
}

impl Reservation {
    pub fn register(ty: Type, reg: Register) -> Self {
        Self { location: Location::Register(reg), ty }
    }

    pub fn stack(ty: Type, offset: i64) -> Self {
        Self { location: Location::Stack(offset), ty }
    }

    /// The "no storage assigned" sentinel.
    pub fn unassigned() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.location != Location::Unassigned
    }

    pub fn as_register(&self) -> Option<Register> {
        match self.location {
            Location::Register(reg) => Some(reg),
            _ => None,
        }
    }

    pub fn stack_offset(&self) -> Option<i64> {
        match self.location {
            Location::Stack(offset) => Some(offset),
            _ => None,
        }
    }

    /// Whether both reservations name the same physical storage, regardless of type.
    pub fn same_storage(&self, other: &Reservation) -> bool {
        self.location == other.location
    }

    /// Same storage, reinterpreted as a different type.
    pub fn with_type(&self, ty: Type) -> Self {
        Self { location: self.location, ty }
    }

    /// The same value staged in `reg`.
    pub fn in_register(&self, reg: Register) -> Self {
        Self::register(self.ty.clone(), reg)
    }

    /// Bytes moved by a load or store of this value.
    pub fn width(&self) -> u64 {
        if self.ty.size() == 1 {
            1
        } else {
            8
        }
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Location::Unassigned => write!(f, "<unassigned> ({})", self.ty),
            Location::Register(reg) => write!(f, "{reg} ({})", self.ty),
            Location::Stack(offset) => write!(f, "[fp, #-{offset}] ({})", self.ty),
        }
    }
}
