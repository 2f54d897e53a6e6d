//! Abstract syntax for OData `$filter` expressions.
//!
//! Two layers live here:
//!
//! - **[tokens]** — the lexical alphabet ([`TokenKind`]) and the lexical unit
//!   ([`Token`]), which doubles as the AST's leaf node.
//! - **[operations]** — the finished tree: [`Operation`] nodes dispatching on
//!   an [`Operator`], with [`Operand`] children covering leaf tokens,
//!   sub-expressions, `in`-list/argument slices, and verbatim JSON object
//!   literals.
//!
//! The parser builds this tree through a sequence of in-place passes over a
//! transient group structure (see [`crate::parser`]); only the closed
//! [`Operand`] set ever escapes to callers. Backends consume the tree
//! read-only. Placeholder substitution ([`Operation::replace_operands`])
//! clones first, so a parsed tree can be shared and reused with different
//! constants.

pub mod operations;
pub mod tokens;

pub use operations::{ObjectOperand, Operand, Operation, Operator, SliceOperand};
pub use tokens::{Token, TokenKind};
