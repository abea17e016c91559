use crate::error::Result;
use crate::graph::Graph;

/// Bidirectional conversion between the optimizer's generic graph and a
/// caller's domain-specific pipeline representation. Both directions build
/// a new value in the target representation; the optimizer core only ever
/// operates on its own `Graph`.
pub trait GraphAdapter {
    type Domain;

    /// Domain pipeline into an optimizer graph.
    fn adapt(&self, domain: &Self::Domain) -> Result<Graph>;

    /// Optimizer graph back into the domain representation.
    fn restore(&self, graph: &Graph) -> Result<Self::Domain>;
}

/// Adapter for callers that already speak the core representation.
pub struct IdentityAdapter;

impl GraphAdapter for IdentityAdapter {
    type Domain = Graph;

    fn adapt(&self, domain: &Graph) -> Result<Graph> {
        Ok(domain.clone())
    }

    fn restore(&self, graph: &Graph) -> Result<Graph> {
        Ok(graph.clone())
    }
}
