use std::collections::HashSet;

use crate::model::{NodeCatalog, NodeCatalogEntry, RawEdge};

/// Returns the catalog entries referenced by `edges`, in catalog order.
///
/// Ids that appear in `edges` but not in the catalog are skipped here; the
/// layout reports them when it cannot resolve the edge.
pub fn reduce_nodes(catalog: &NodeCatalog, edges: &[RawEdge]) -> Vec<NodeCatalogEntry> {
    let referenced: HashSet<&str> = edges
        .iter()
        .flat_map(|edge| [edge.source.as_str(), edge.target.as_str()])
        .collect();

    catalog
        .iter()
        .filter(|(id, _)| referenced.contains(id.as_str()))
        .map(|(_, entry)| entry.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(ids: &[&str]) -> NodeCatalog {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    NodeCatalogEntry {
                        id: id.to_string(),
                        label: id.to_lowercase(),
                    },
                )
            })
            .collect()
    }

    fn ids(nodes: &[NodeCatalogEntry]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn keeps_catalog_order_not_edge_order() {
        let cat = catalog(&["D", "B", "A", "C"]);
        let edges = vec![RawEdge::new("A", "B", 1.0), RawEdge::new("C", "A", 2.0)];
        assert_eq!(ids(&reduce_nodes(&cat, &edges)), vec!["B", "A", "C"]);
    }

    #[test]
    fn no_duplicates_for_repeated_ids() {
        let cat = catalog(&["A", "B"]);
        let edges = vec![
            RawEdge::new("A", "B", 1.0),
            RawEdge::new("A", "B", 4.0),
            RawEdge::new("B", "A", 2.0),
        ];
        assert_eq!(ids(&reduce_nodes(&cat, &edges)), vec!["A", "B"]);
    }

    #[test]
    fn empty_edges_yield_empty_set() {
        let cat = catalog(&["A", "B"]);
        assert!(reduce_nodes(&cat, &[]).is_empty());
    }

    #[test]
    fn unknown_ids_are_not_invented() {
        let cat = catalog(&["A"]);
        let edges = vec![RawEdge::new("A", "ghost", 1.0)];
        assert_eq!(ids(&reduce_nodes(&cat, &edges)), vec!["A"]);
    }

    #[test]
    fn result_is_independent_of_catalog() {
        let cat = catalog(&["A", "B"]);
        let mut reduced = reduce_nodes(&cat, &[RawEdge::new("A", "B", 1.0)]);
        reduced[0].label.push_str("-changed");
        assert_eq!(cat["A"].label, "a");
    }
}
