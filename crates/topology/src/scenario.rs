//! Initial pathloss scenario derived from the graph
//!
//! Adjacent nodes start with a clear channel and every other pair starts
//! fully attenuated, so the emulated radio graph matches the topology before
//! any link event fires.

use crate::graph::TopologyGraph;

pub const ADJACENT_PATHLOSS_DB: u32 = 0;
pub const BLOCKED_PATHLOSS_DB: u32 = 200;

/// Render the event-list lines applied at time zero, one per node
pub fn initial_pathloss(graph: &TopologyGraph) -> String {
    let mut out = String::new();

    for node in graph.nodes_by_index() {
        out.push_str(&format!("0.0 nem:{} pathloss", node.nem_id()));
        for peer in graph.nodes_by_index() {
            if peer.index == node.index {
                continue;
            }
            let db = if graph.are_adjacent(&node.name, &peer.name) {
                ADJACENT_PATHLOSS_DB
            } else {
                BLOCKED_PATHLOSS_DB
            };
            out.push_str(&format!(" nem:{},{}", peer.nem_id(), db));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{NodeRecord, TopologyDescription};

    #[test]
    fn test_line_topology() {
        let mut description = TopologyDescription::new();
        description
            .add_node("core", NodeRecord::new("node-1").neighbor("node-2"))
            .add_node("core", NodeRecord::new("node-2"))
            .add_node("core", NodeRecord::new("node-3").neighbor("node-2"));
        let graph = TopologyGraph::build(&description).unwrap();

        let expected = "\
0.0 nem:1 pathloss nem:2,0 nem:3,200
0.0 nem:2 pathloss nem:1,0 nem:3,0
0.0 nem:3 pathloss nem:1,200 nem:2,0
";
        assert_eq!(initial_pathloss(&graph), expected);
    }
}
