//! # Grafo de Dependências entre Testes
//!
//! Cada teste (local ou conhecido pelo registro remoto) é um nó; cada embed
//! `A -> B` é uma aresta. O grafo é um arena: ids são mapeados para índices
//! densos e as arestas ficam em listas de índices.
//!
//! ## Detecção de ciclos
//!
//! Usamos o algoritmo de Tarjan para componentes fortemente conexas (SCC).
//! Uma SCC com mais de um nó é um ciclo. Uma SCC de um nó só é ciclo se o
//! nó tiver aresta para si mesmo (teste que embute a si próprio).
//!
//! ```text
//! A -> B -> C -> A     SCC {A, B, C}  -> ciclo
//! D -> D               SCC {D} + self-loop -> ciclo
//! E -> F               SCCs {E}, {F}  -> ok
//! ```
//!
//! A implementação é iterativa (pilha explícita), então suítes grandes não
//! estouram a pilha de chamadas.

use std::collections::HashMap;

const UNVISITED: usize = usize::MAX;

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    index: HashMap<String, usize>,
    names: Vec<String>,
    edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona o nó se ainda não existir e retorna seu índice.
    pub fn add_node(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.names.len();
        self.index.insert(id.to_string(), idx);
        self.names.push(id.to_string());
        self.edges.push(Vec::new());
        idx
    }

    pub fn node(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.edges[from].push(to);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn has_self_loop(&self, idx: usize) -> bool {
        self.edges[idx].contains(&idx)
    }

    /// Componentes fortemente conexas (Tarjan). A ordem segue a ordem em que
    /// o algoritmo as fecha; cada componente lista índices de nós.
    pub fn strongly_connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut order = vec![UNVISITED; n];
        let mut lowlink = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_order = 0;
        let mut components = Vec::new();

        for root in 0..n {
            if order[root] != UNVISITED {
                continue;
            }

            // (nó, próxima aresta a visitar)
            let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];
            order[root] = next_order;
            lowlink[root] = next_order;
            next_order += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(frame) = call_stack.last_mut() {
                let v = frame.0;

                if frame.1 < self.edges[v].len() {
                    let w = self.edges[v][frame.1];
                    frame.1 += 1;

                    if order[w] == UNVISITED {
                        order[w] = next_order;
                        lowlink[w] = next_order;
                        next_order += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        call_stack.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(order[w]);
                    }
                    continue;
                }

                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }

                if lowlink[v] == order[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }

        components
    }

    /// Ciclos do grafo como listas de ids ordenadas. A lista de ciclos também
    /// é ordenada, para que o resultado não dependa da ordem de inserção.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = self
            .strongly_connected_components()
            .into_iter()
            .filter(|component| {
                component.len() > 1 || component.first().is_some_and(|&idx| self.has_self_loop(idx))
            })
            .map(|component| {
                let mut members: Vec<String> = component
                    .into_iter()
                    .map(|idx| self.name(idx).to_string())
                    .collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }
}
