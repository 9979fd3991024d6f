// This module implements the minimal type system that gates legal operations in the code
// generator and determines operand widths. Type is a small tagged union: the builtin types
// void, int (8 bytes) and char (1 byte), pointers that own their pointee type, and opaque
// custom types that stand for forward-declared aggregates and have no size. The module also
// defines the binary and unary operator enumerations together with the policy deciding which
// operator/type combinations are legal and what type an operation produces. Pointer
// arithmetic is allowed only as pointer +/- integer; pointers compare only against pointers;
// void is never a valid operand.

//! Type model and operator legality.

use std::fmt;

/// Size of a machine word in bytes.
pub const WORD_SIZE: u64 = 8;

/// A resolved source-level type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Type {
    #[default]
    Void,
    Int,
    Char,
    Pointer(Box<Type>),
    /// Opaque aggregate reference; carries no size and supports no operators.
    Custom(String),
}

impl Type {
    pub fn pointer_to(pointee: Type) -> Self {
        Type::Pointer(Box::new(pointee))
    }

    /// Size of a value of this type in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Type::Void => 0,
            Type::Int => WORD_SIZE,
            Type::Char => 1,
            Type::Pointer(_) => WORD_SIZE,
            Type::Custom(_) => 0,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Type::Custom(_))
    }

    /// The pointee type if this is a pointer.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// Whether a value of this type can live in a register or a stack slot.
    pub fn is_storable(&self) -> bool {
        self.size() > 0
    }

    /// Whether `self <op> other` is a legal binary operation.
    pub fn valid_binary_op(&self, op: BinaryOp, other: &Type) -> bool {
        if self.is_void() || other.is_void() || self.is_custom() || other.is_custom() {
            return false;
        }

        match (self.pointee(), other.pointee()) {
            (Some(_), Some(_)) => op.is_comparison(),
            (Some(pointee), None) => {
                matches!(op, BinaryOp::Add | BinaryOp::Sub) && pointee.is_storable()
            }
            // integer - pointer has no meaning
            (None, Some(pointee)) => op == BinaryOp::Add && pointee.is_storable(),
            (None, None) => true,
        }
    }

    /// Whether `<op> self` is a legal unary operation.
    pub fn valid_unary_op(&self, op: UnaryOp) -> bool {
        if self.is_void() || self.is_custom() {
            return false;
        }

        match op {
            UnaryOp::Deref => self.pointee().is_some_and(Type::is_storable),
            UnaryOp::AddrOf | UnaryOp::Not => true,
            UnaryOp::Neg | UnaryOp::BitNot => !self.is_pointer(),
        }
    }

    /// Result type of `self <op> other`. Only meaningful for valid operations.
    pub fn binary_result(&self, op: BinaryOp, other: &Type) -> Type {
        if op.is_comparison() {
            return Type::Int;
        }
        if self.is_pointer() {
            return self.clone();
        }
        if other.is_pointer() {
            return other.clone();
        }
        if self == other {
            return self.clone();
        }
        Type::Int
    }

    /// Result type of `<op> self`. Only meaningful for valid operations.
    pub fn unary_result(&self, op: UnaryOp) -> Type {
        match op {
            UnaryOp::Deref => self.pointee().cloned().unwrap_or(Type::Void),
            UnaryOp::AddrOf => Type::pointer_to(self.clone()),
            UnaryOp::Not => Type::Int,
            UnaryOp::Neg | UnaryOp::BitNot => self.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Int => f.write_str("int"),
            Type::Char => f.write_str("char"),
            Type::Pointer(inner) => write!(f, "{inner}*"),
            Type::Custom(name) => f.write_str(name),
        }
    }
}

/// Builtin binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        self.condition_code().is_some()
    }

    /// Condition code used with `cset` for comparison operators. Always signed.
    pub fn condition_code(self) -> Option<&'static str> {
        match self {
            BinaryOp::Eq => Some("eq"),
            BinaryOp::Ne => Some("ne"),
            BinaryOp::Lt => Some("lt"),
            BinaryOp::Gt => Some("gt"),
            BinaryOp::Le => Some("le"),
            BinaryOp::Ge => Some("ge"),
            _ => None,
        }
    }

    /// Three-register data processing mnemonic for non-comparison operators.
    pub fn mnemonic(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("add"),
            BinaryOp::Sub => Some("sub"),
            BinaryOp::Mul => Some("mul"),
            BinaryOp::Div => Some("sdiv"),
            BinaryOp::BitAnd => Some("and"),
            BinaryOp::BitOr => Some("orr"),
            BinaryOp::BitXor => Some("eor"),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
        };
        f.write_str(symbol)
    }
}

/// Builtin unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical not.
    Not,
    /// Bitwise not.
    BitNot,
    /// Load through a pointer.
    Deref,
    /// Address of a named variable.
    AddrOf,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
        };
        f.write_str(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(Type::Void.size(), 0);
        assert_eq!(Type::Char.size(), 1);
        assert_eq!(Type::Int.size(), 8);
        assert_eq!(Type::pointer_to(Type::Char).size(), 8);
        assert_eq!(Type::Custom("node".into()).size(), 0);
    }

    #[test]
    fn test_void_is_never_an_operand() {
        for op in [BinaryOp::Add, BinaryOp::Eq, BinaryOp::BitXor] {
            assert!(!Type::Void.valid_binary_op(op, &Type::Int));
            assert!(!Type::Int.valid_binary_op(op, &Type::Void));
        }
        for op in [UnaryOp::Neg, UnaryOp::Not, UnaryOp::BitNot, UnaryOp::Deref, UnaryOp::AddrOf] {
            assert!(!Type::Void.valid_unary_op(op));
        }
    }

    #[test]
    fn test_pointer_binary_policy() {
        let ptr = Type::pointer_to(Type::Int);
        assert!(ptr.valid_binary_op(BinaryOp::Add, &Type::Int));
        assert!(ptr.valid_binary_op(BinaryOp::Sub, &Type::Char));
        assert!(Type::Int.valid_binary_op(BinaryOp::Add, &ptr));
        assert!(!Type::Int.valid_binary_op(BinaryOp::Sub, &ptr));
        assert!(!ptr.valid_binary_op(BinaryOp::Mul, &Type::Int));
        assert!(!ptr.valid_binary_op(BinaryOp::Add, &ptr));
        assert!(ptr.valid_binary_op(BinaryOp::Lt, &ptr));
        assert!(ptr.valid_binary_op(BinaryOp::Eq, &ptr));
        assert!(!ptr.valid_binary_op(BinaryOp::Eq, &Type::Int));

        let opaque = Type::pointer_to(Type::Custom("node".into()));
        assert!(!opaque.valid_binary_op(BinaryOp::Add, &Type::Int));
        assert!(opaque.valid_binary_op(BinaryOp::Ne, &opaque));
    }

    #[test]
    fn test_unary_policy() {
        let ptr = Type::pointer_to(Type::Char);
        assert!(ptr.valid_unary_op(UnaryOp::Deref));
        assert!(!Type::Int.valid_unary_op(UnaryOp::Deref));
        assert!(!Type::pointer_to(Type::Void).valid_unary_op(UnaryOp::Deref));
        assert!(!ptr.valid_unary_op(UnaryOp::Neg));
        assert!(!ptr.valid_unary_op(UnaryOp::BitNot));
        assert!(ptr.valid_unary_op(UnaryOp::Not));
        assert!(Type::Char.valid_unary_op(UnaryOp::BitNot));
        assert!(Type::Int.valid_unary_op(UnaryOp::AddrOf));
    }

    #[test]
    fn test_binary_result_types() {
        let ptr = Type::pointer_to(Type::Int);
        assert_eq!(ptr.binary_result(BinaryOp::Add, &Type::Int), ptr);
        assert_eq!(Type::Int.binary_result(BinaryOp::Add, &ptr), ptr);
        assert_eq!(Type::Char.binary_result(BinaryOp::Add, &Type::Char), Type::Char);
        assert_eq!(Type::Char.binary_result(BinaryOp::Add, &Type::Int), Type::Int);
        assert_eq!(ptr.binary_result(BinaryOp::Eq, &ptr), Type::Int);
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::pointer_to(Type::pointer_to(Type::Char)).to_string(), "char**");
        assert_eq!(BinaryOp::Le.to_string(), "<=");
    }
}
