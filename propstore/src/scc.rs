// Closed strongly-connected component detection (§4.7), used by the phase
// controller once fallback injection has produced no new work. A "closed"
// SCC is one with no outgoing edge leaving it — exactly the components
// Tarjan's algorithm finds when it is run over the *entire* restricted
// subgraph and a component is accepted only if none of its edges lead to a
// node outside it.

use std::collections::HashMap;
use std::hash::Hash;

/// Tarjan's strongly-connected-components algorithm, iterative to avoid
/// stack overflow on deep dependency chains. Returns every SCC of size > 1,
/// or of size 1 with a self-loop, restricted to components that are
/// *closed*: no member has an edge to a node outside the component.
pub fn closed_sccs<N: Clone + Eq + Hash>(nodes: &[N], edges: &HashMap<N, Vec<N>>) -> Vec<Vec<N>> {
    let mut index_of: HashMap<N, usize> = HashMap::new();
    let mut lowlink: HashMap<N, usize> = HashMap::new();
    let mut on_stack: HashMap<N, bool> = HashMap::new();
    let mut stack: Vec<N> = Vec::new();
    let mut next_index = 0usize;
    let mut sccs: Vec<Vec<N>> = Vec::new();

    enum Frame<N> {
        Enter(N),
        Finish(N),
        Visit(N, N), // (node, neighbor) pending comparison after recursing
    }

    for start in nodes {
        if index_of.contains_key(start) {
            continue;
        }
        let mut work: Vec<Frame<N>> = vec![Frame::Enter(start.clone())];
        while let Some(frame) = work.pop() {
            match frame {
                Frame::Enter(v) => {
                    if index_of.contains_key(&v) {
                        continue;
                    }
                    index_of.insert(v.clone(), next_index);
                    lowlink.insert(v.clone(), next_index);
                    next_index += 1;
                    on_stack.insert(v.clone(), true);
                    stack.push(v.clone());

                    work.push(Frame::Finish(v.clone()));
                    for w in edges.get(&v).map(|v| v.as_slice()).unwrap_or(&[]) {
                        if !index_of.contains_key(w) {
                            work.push(Frame::Visit(v.clone(), w.clone()));
                            work.push(Frame::Enter(w.clone()));
                        } else if *on_stack.get(w).unwrap_or(&false) {
                            let w_index = index_of[w];
                            let v_low = lowlink[&v];
                            lowlink.insert(v.clone(), v_low.min(w_index));
                        }
                    }
                }
                Frame::Visit(v, w) => {
                    let w_low = lowlink[&w];
                    let v_low = lowlink[&v];
                    lowlink.insert(v, v_low.min(w_low));
                }
                Frame::Finish(v) => {
                    if lowlink[&v] == index_of[&v] {
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().expect("scc stack exhausted before root");
                            on_stack.insert(w.clone(), false);
                            let is_root = w == v;
                            component.push(w);
                            if is_root {
                                break;
                            }
                        }
                        sccs.push(component);
                    }
                }
            }
        }
    }

    let member_of: HashMap<N, usize> =
        sccs.iter().enumerate().flat_map(|(i, c)| c.iter().map(move |n| (n.clone(), i))).collect();

    sccs.into_iter()
        .enumerate()
        .filter(|(i, component)| {
            let multi_member = component.len() > 1;
            let self_loop = component.len() == 1
                && edges.get(&component[0]).is_some_and(|ws| ws.contains(&component[0]));
            if !multi_member && !self_loop {
                return false;
            }
            component.iter().all(|n| {
                edges.get(n).map(|ws| ws.iter().all(|w| member_of.get(w) == Some(i))).unwrap_or(true)
            })
        })
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_simple_two_cycle() {
        let nodes = vec!["a", "b", "c"];
        let mut edges = HashMap::new();
        edges.insert("a", vec!["b"]);
        edges.insert("b", vec!["a"]);
        edges.insert("c", vec![]);
        let sccs = closed_sccs(&nodes, &edges);
        assert_eq!(sccs.len(), 1);
        let mut members = sccs[0].clone();
        members.sort();
        assert_eq!(members, vec!["a", "b"]);
    }

    #[test]
    fn open_cycle_with_outgoing_edge_is_not_closed() {
        let nodes = vec!["a", "b", "c"];
        let mut edges = HashMap::new();
        edges.insert("a", vec!["b"]);
        edges.insert("b", vec!["a", "c"]);
        edges.insert("c", vec![]);
        let sccs = closed_sccs(&nodes, &edges);
        assert!(sccs.is_empty(), "cycle {{a,b}} leaks an edge to c so it is not closed");
    }

    #[test]
    fn no_cycle_yields_no_sccs() {
        let nodes = vec!["a", "b"];
        let mut edges = HashMap::new();
        edges.insert("a", vec!["b"]);
        edges.insert("b", vec![]);
        assert!(closed_sccs(&nodes, &edges).is_empty());
    }
}
