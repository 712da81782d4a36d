//! Dependency graph over step ids.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{GantryError, Result};

/// The `wait_for` relationships between steps.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Map of step id to its direct predecessors.
    predecessors: HashMap<String, HashSet<String>>,
    /// Map of step id to steps that wait on it.
    dependents: HashMap<String, HashSet<String>>,
    /// All step ids in the graph.
    steps: HashSet<String>,
}

impl DependencyGraph {
    /// Create a new graph builder.
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::new()
    }

    /// Direct predecessors of a step.
    pub fn predecessors_of(&self, step: &str) -> Option<&HashSet<String>> {
        self.predecessors.get(step)
    }

    /// Steps that wait on the given step.
    pub fn dependents_of(&self, step: &str) -> Option<&HashSet<String>> {
        self.dependents.get(step)
    }

    /// Check if a step exists in the graph.
    pub fn contains(&self, step: &str) -> bool {
        self.steps.contains(step)
    }

    /// Number of steps in the graph.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in topological order (predecessors before dependents).
    ///
    /// Returns an error if a cycle is detected.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<String, usize> = HashMap::new();
        for step in &self.steps {
            in_degree.insert(
                step.clone(),
                self.predecessors.get(step).map_or(0, |p| p.len()),
            );
        }

        let mut queue: VecDeque<String> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(step, _)| step.clone())
            .collect();

        let mut result = Vec::with_capacity(self.steps.len());

        while let Some(step) = queue.pop_front() {
            result.push(step.clone());

            if let Some(dependents) = self.dependents.get(&step) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent.clone());
                        }
                    }
                }
            }
        }

        if result.len() != self.steps.len() {
            let cycle = self
                .find_cycle()
                .map(|path| path.join(" -> "))
                .unwrap_or_else(|| "<unresolved>".to_string());

            return Err(GantryError::CircularDependency { cycle });
        }

        Ok(result)
    }

    /// Find a cycle in the graph, returning the path if one exists.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        let mut state: HashMap<&str, State> = self
            .steps
            .iter()
            .map(|s| (s.as_str(), State::Unvisited))
            .collect();

        let mut path: Vec<String> = Vec::new();

        fn dfs<'a>(
            node: &'a str,
            graph: &'a DependencyGraph,
            state: &mut HashMap<&'a str, State>,
            path: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            state.insert(node, State::Visiting);
            path.push(node.to_string());

            if let Some(preds) = graph.predecessors.get(node) {
                for pred in preds {
                    match state.get(pred.as_str()) {
                        Some(State::Visiting) => {
                            let cycle_start = path.iter().position(|s| s == pred)?;
                            let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                            cycle.push(pred.clone());
                            return Some(cycle);
                        }
                        Some(State::Unvisited) | None => {
                            if let Some(cycle) = dfs(pred, graph, state, path) {
                                return Some(cycle);
                            }
                        }
                        Some(State::Visited) => {}
                    }
                }
            }

            path.pop();
            state.insert(node, State::Visited);
            None
        }

        for step in &self.steps {
            if state.get(step.as_str()) == Some(&State::Unvisited) {
                if let Some(cycle) = dfs(step, self, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Groups of steps whose predecessors are satisfied by all previous
    /// groups — the execution waves the scheduler would dispatch together
    /// if every step took equally long.
    pub fn execution_waves(&self) -> Result<Vec<Vec<String>>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(GantryError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }

        let mut waves: Vec<Vec<String>> = Vec::new();
        let mut completed: HashSet<String> = HashSet::new();

        while completed.len() < self.steps.len() {
            let mut ready: Vec<String> = self
                .steps
                .iter()
                .filter(|s| !completed.contains(*s))
                .filter(|s| self.is_ready(s, &completed))
                .cloned()
                .collect();

            if ready.is_empty() {
                break;
            }

            // Sort for deterministic output
            ready.sort();

            completed.extend(ready.iter().cloned());
            waves.push(ready);
        }

        Ok(waves)
    }

    /// Check if a step is ready to dispatch given completed predecessors.
    pub fn is_ready(&self, step: &str, completed: &HashSet<String>) -> bool {
        match self.predecessors.get(step) {
            None => true,
            Some(preds) => preds.iter().all(|p| completed.contains(p)),
        }
    }

    /// All transitive dependents of a step.
    ///
    /// These are exactly the steps that must be skipped when `step` does
    /// not succeed.
    pub fn transitive_dependents(&self, step: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut to_visit = vec![step.to_string()];

        while let Some(current) = to_visit.pop() {
            if let Some(dependents) = self.dependents.get(&current) {
                for dep in dependents {
                    if result.insert(dep.clone()) {
                        to_visit.push(dep.clone());
                    }
                }
            }
        }

        result
    }
}

/// Builder for constructing a DependencyGraph.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    predecessors: HashMap<String, HashSet<String>>,
}

impl DependencyGraphBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step with the ids it waits for.
    pub fn add_step(mut self, id: impl Into<String>, wait_for: Vec<String>) -> Self {
        let id = id.into();
        self.predecessors.entry(id).or_default().extend(wait_for);
        self
    }

    /// Build the dependency graph.
    ///
    /// Returns an error if any `wait_for` id references a step the graph
    /// does not contain.
    pub fn build(self) -> Result<DependencyGraph> {
        let steps: HashSet<String> = self.predecessors.keys().cloned().collect();

        for (step, preds) in &self.predecessors {
            for pred in preds {
                if !steps.contains(pred) {
                    return Err(GantryError::UnknownDependency {
                        step: step.clone(),
                        dependency: pred.clone(),
                    });
                }
            }
        }

        let mut dependents: HashMap<String, HashSet<String>> = steps
            .iter()
            .map(|step| (step.clone(), HashSet::new()))
            .collect();

        for (step, preds) in &self.predecessors {
            for pred in preds {
                if let Some(entry) = dependents.get_mut(pred) {
                    entry.insert(step.clone());
                }
            }
        }

        Ok(DependencyGraph {
            predecessors: self.predecessors,
            dependents,
            steps,
        })
    }
}
