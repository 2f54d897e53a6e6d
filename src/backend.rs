//! Lowering backends and the process-wide backend registry.
//!
//! A backend is a recursive visitor over an [`Operation`] tree that produces
//! its target representation: a MySQL `WHERE` fragment, a `?`-placeholder
//! clause with positional arguments, an ordered BSON document, or an
//! in-memory record evaluator. The registry maps backend names to handlers;
//! it is seeded with the four built-ins and may be extended with
//! [`register_backend`] during program start-up. Keep registration to
//! initialization time — the map is effectively read-only afterwards and a
//! parsed tree can then be compiled from any thread.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::ast::Operation;
use crate::error::Error;
use crate::value::Value;

pub mod gorm;
pub mod memory;
pub mod mongodb;
pub mod mysql;

pub use gorm::SqlClause;
pub use memory::Evaluator;

/// A backend-native compiled representation.
#[derive(Debug, Clone)]
pub enum Query {
    /// MySQL `WHERE` fragment
    Sql(String),
    /// Driver-agnostic `?`-placeholder clause plus positional arguments
    Clause(SqlClause),
    /// Ordered MongoDB query document
    Document(bson::Document),
    /// In-memory record filter
    Evaluator(Evaluator),
}

impl Query {
    pub fn into_sql(self) -> Option<String> {
        match self {
            Query::Sql(sql) => Some(sql),
            _ => None,
        }
    }

    pub fn into_clause(self) -> Option<SqlClause> {
        match self {
            Query::Clause(clause) => Some(clause),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<bson::Document> {
        match self {
            Query::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_evaluator(self) -> Option<Evaluator> {
        match self {
            Query::Evaluator(eval) => Some(eval),
            _ => None,
        }
    }
}

/// The lowering contract every backend implements.
pub trait Backend: Send + Sync {
    /// Lowers a finished operation tree to the backend's representation.
    fn compile(&self, op: &Operation) -> Result<Query, Error>;

    /// Clones the tree, substitutes positional placeholders, then compiles.
    /// The original tree is never mutated.
    fn compile_with_args(&self, op: &Operation, args: &[Value]) -> Result<Query, Error> {
        let replaced = op.replace_operands(args)?;
        self.compile(&replaced)
    }
}

static REGISTRY: LazyLock<RwLock<HashMap<String, Arc<dyn Backend>>>> = LazyLock::new(|| {
    let mut backends: HashMap<String, Arc<dyn Backend>> = HashMap::new();
    backends.insert("mysql".to_string(), Arc::new(mysql::MySqlBackend::new()));
    backends.insert("gorm".to_string(), Arc::new(gorm::GormBackend));
    backends.insert("mongodb".to_string(), Arc::new(mongodb::MongoBackend));
    backends.insert("memory".to_string(), Arc::new(memory::MemoryBackend));
    RwLock::new(backends)
});

/// Registers a backend under `name`, replacing any previous handler.
pub fn register_backend(name: &str, backend: Arc<dyn Backend>) {
    REGISTRY
        .write()
        .expect("backend registry poisoned")
        .insert(name.to_string(), backend);
}

/// Looks up a registered backend by name.
pub fn backend(name: &str) -> Result<Arc<dyn Backend>, Error> {
    REGISTRY
        .read()
        .expect("backend registry poisoned")
        .get(name)
        .cloned()
        .ok_or_else(|| Error::NoSuchBackend(name.to_string()))
}
