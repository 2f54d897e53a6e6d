//! The public compile-and-lower surface.

use std::str::FromStr;

use crate::ast::Operation;
use crate::backend::{self, Query};
use crate::error::Error;
use crate::parser::Parser;
use crate::value::Value;

/// A parsed `$filter` expression, ready to lower to any registered backend.
///
/// A filter owns its operation tree and never mutates it: lowering is a
/// read-only walk, and [`Filter::with_replacements`] clones before
/// substituting, so one parsed filter can be shared across threads and
/// reused with different placeholder values.
///
/// # Examples
///
/// ```
/// use odata_filter::Filter;
///
/// let filter = Filter::compile("Name eq 'Milk' and Price lt 2.55")?;
/// let sql = filter.compile_for("mysql")?.into_sql().unwrap();
/// assert_eq!(sql, "`Name`='Milk' AND `Price`<2.55");
/// # Ok::<(), odata_filter::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Filter {
    op: Operation,
}

impl Filter {
    /// Parses `input` into a reusable filter.
    pub fn compile(input: &str) -> Result<Self, Error> {
        tracing::debug!(input, "compiling filter");
        let op = Parser::new(input)?.into_operation()?;
        Ok(Filter { op })
    }

    /// The parsed expression tree.
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    /// Lowers the expression to the named backend's representation.
    pub fn compile_for(&self, backend_name: &str) -> Result<Query, Error> {
        backend::backend(backend_name)?.compile(&self.op)
    }

    /// Lowers with positional placeholder substitution applied first:
    /// `':0'`/`":0"` tokens bind to `args[0]`, and so on.
    pub fn compile_for_with_args(
        &self,
        backend_name: &str,
        args: &[Value],
    ) -> Result<Query, Error> {
        backend::backend(backend_name)?.compile_with_args(&self.op, args)
    }

    /// Returns a new filter with placeholders bound to `args`; this filter
    /// is left untouched and can be bound again with different values.
    pub fn with_replacements(&self, args: &[Value]) -> Result<Filter, Error> {
        Ok(Filter {
            op: self.op.replace_operands(args)?,
        })
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::compile(s)
    }
}
