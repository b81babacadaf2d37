use thiserror::Error;

/// Structural invariants a candidate edge can break. Every variant belongs to the
/// non-DAG category and is reported by `SqliteDag::create_edge` instead of inserting.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
pub enum Violation {
    #[error("self loops are not allowed.")]
    SelfLoop,
    #[error("multi-edges are not allowed.")]
    MultiEdge,
    #[error("back loops are not allowed.")]
    BackLoop,
    #[error("cycles are not allowed.")]
    Cycle,
}

#[derive(Debug, Error)]
pub enum DagError {
    #[error("edge rejected: {0}")]
    NonDag(#[from] Violation),
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("vertex in use: {0}")]
    VertexInUse(String),
}

impl DagError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        DagError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        DagError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        DagError::QueryError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        DagError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        DagError::InvalidInput(msg.into())
    }

    pub fn vertex_in_use<T: Into<String>>(msg: T) -> Self {
        DagError::VertexInUse(msg.into())
    }

    /// Returns the rejected invariant when this error is a domain violation.
    pub fn violation(&self) -> Option<Violation> {
        match self {
            DagError::NonDag(violation) => Some(*violation),
            _ => None,
        }
    }

    pub fn is_non_dag(&self) -> bool {
        matches!(self, DagError::NonDag(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages() {
        assert_eq!(Violation::SelfLoop.to_string(), "self loops are not allowed.");
        assert_eq!(Violation::MultiEdge.to_string(), "multi-edges are not allowed.");
        assert_eq!(Violation::BackLoop.to_string(), "back loops are not allowed.");
        assert_eq!(Violation::Cycle.to_string(), "cycles are not allowed.");
    }

    #[test]
    fn test_violation_converts_into_non_dag_error() {
        let err: DagError = Violation::Cycle.into();
        assert!(err.is_non_dag());
        assert_eq!(err.violation(), Some(Violation::Cycle));
        assert_eq!(err.to_string(), "edge rejected: cycles are not allowed.");
    }

    #[test]
    fn test_storage_errors_carry_no_violation() {
        let err = DagError::query("disk I/O error");
        assert!(!err.is_non_dag());
        assert_eq!(err.violation(), None);
    }
}
