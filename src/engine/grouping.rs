//! Ingredient-overlap grouping of a routine step's candidate products, plus
//! the AM/PM merge used to present a routine by step type.
//!
//! Products are nodes of an undirected graph with an edge wherever two
//! products share at least one key ingredient (exact string match). Each
//! connected component becomes one group labelled with its sorted ingredient
//! union. Products without ingredients share a single fallback group.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use ts_rs::TS;

use super::catalog::CatalogProduct;
use super::types::{AlternativeProduct, Routine, RoutineStep};

/// Label of the group holding products that list no key ingredients.
pub const GENERAL_GROUP_LABEL: &str = "General Skincare";

/// Canonical presentation order of step types; unknown types follow alphabetically.
pub const STEP_ORDER: &[&str] = &["Cleanser", "Toner", "Treatment", "Serum", "Moisturizer", "Sunscreen"];

/// Anything that can be grouped by ingredients.
pub trait IngredientCandidate {
    fn product_id(&self) -> &str;
    fn key_ingredients(&self) -> &[String];
}

impl IngredientCandidate for AlternativeProduct {
    fn product_id(&self) -> &str {
        &self.product_id
    }
    fn key_ingredients(&self) -> &[String] {
        &self.key_ingredients
    }
}

impl IngredientCandidate for RoutineStep {
    fn product_id(&self) -> &str {
        &self.product_id
    }
    fn key_ingredients(&self) -> &[String] {
        &self.key_ingredients
    }
}

impl IngredientCandidate for CatalogProduct {
    fn product_id(&self) -> &str {
        &self.id
    }
    fn key_ingredients(&self) -> &[String] {
        &self.key_ingredients
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientGroup<P> {
    pub label: String,
    pub members: Vec<P>,
}

// ---------------------------------------------------------------------------
// Index-based undirected graph
// ---------------------------------------------------------------------------

struct OverlapGraph {
    adjacency: Vec<Vec<usize>>,
}

impl OverlapGraph {
    /// O(n²) pairwise ingredient intersection.
    fn build<P: IngredientCandidate>(nodes: &[&P]) -> Self {
        let sets: Vec<HashSet<&str>> = nodes
            .iter()
            .map(|p| p.key_ingredients().iter().map(String::as_str).collect())
            .collect();

        let mut adjacency = vec![Vec::new(); nodes.len()];
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                if !sets[i].is_disjoint(&sets[j]) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        Self { adjacency }
    }

    /// Connected components via an explicit stack. Each component's indices
    /// are returned ascending; components are ordered by their smallest index.
    fn components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.adjacency.len()];
        let mut components = Vec::new();

        for start in 0..self.adjacency.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                component.push(node);
                for &neighbor in &self.adjacency[node] {
                    if !visited[neighbor] {
                        visited[neighbor] = true;
                        stack.push(neighbor);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Partition `products` into ingredient-overlap groups.
///
/// Products repeating an earlier product id are ignored. The group holding
/// `primary_id` comes first; the rest sort by label ignoring case, then by
/// byte order, ties broken by the earliest input position. Within a group
/// the primary product comes first and the others keep input order.
pub fn group_by_ingredients<P>(products: &[P], primary_id: &str) -> Vec<IngredientGroup<P>>
where
    P: IngredientCandidate + Clone,
{
    let mut seen = HashSet::new();
    let unique: Vec<(usize, &P)> = products
        .iter()
        .enumerate()
        .filter(|&(_, p)| seen.insert(p.product_id()))
        .collect();

    let (with, without): (Vec<_>, Vec<_>) = unique
        .into_iter()
        .partition(|(_, p)| !p.key_ingredients().is_empty());

    let nodes: Vec<&P> = with.iter().map(|(_, p)| *p).collect();
    let graph = OverlapGraph::build(&nodes);

    // (label, first input position, members as (input position, product))
    let mut groups: Vec<(String, usize, Vec<(usize, &P)>)> = graph
        .components()
        .into_iter()
        .map(|component| {
            let members: Vec<(usize, &P)> = component.iter().map(|&i| with[i]).collect();
            let ingredients: BTreeSet<&str> = members
                .iter()
                .flat_map(|&(_, p)| p.key_ingredients().iter().map(String::as_str))
                .collect();
            let label = ingredients.into_iter().collect::<Vec<_>>().join(", ");
            (label, members[0].0, members)
        })
        .collect();

    if !without.is_empty() {
        groups.push((GENERAL_GROUP_LABEL.to_string(), without[0].0, without));
    }

    let holds_primary =
        |members: &[(usize, &P)]| members.iter().any(|(_, p)| p.product_id() == primary_id);
    groups.sort_by(|a, b| {
        holds_primary(&b.2)
            .cmp(&holds_primary(&a.2))
            .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
            .then_with(|| a.0.as_bytes().cmp(b.0.as_bytes()))
            .then_with(|| a.1.cmp(&b.1))
    });

    groups
        .into_iter()
        .map(|(label, _, mut members)| {
            // stable: non-primary members keep input order
            members.sort_by_key(|(pos, p)| (p.product_id() != primary_id, *pos));
            IngredientGroup {
                label,
                members: members.into_iter().map(|(_, p)| p.clone()).collect(),
            }
        })
        .collect()
}

/// Group a step's primary product together with its alternatives.
pub fn group_step(step: &RoutineStep) -> Vec<IngredientGroup<AlternativeProduct>> {
    group_by_ingredients(&step.candidates(), &step.product_id)
}

// ---------------------------------------------------------------------------
// AM/PM merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
pub enum StepUsage {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
    #[serde(rename = "AM & PM")]
    Both,
}

impl StepUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepUsage::Am => "AM",
            StepUsage::Pm => "PM",
            StepUsage::Both => "AM & PM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct UnifiedStep {
    pub step: RoutineStep,
    pub usage: StepUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedRoutine {
    pub steps: Vec<UnifiedStep>,
    pub step_types: Vec<String>,
}

impl UnifiedRoutine {
    pub fn steps_of_type<'a>(&'a self, step_type: &'a str) -> impl Iterator<Item = &'a UnifiedStep> {
        self.steps.iter().filter(move |s| s.step.step_type == step_type)
    }
}

/// Merge AM and PM steps by product id. A product used in both routines
/// keeps its AM entry and is marked [`StepUsage::Both`].
pub fn unify_routine(routine: &Routine) -> UnifiedRoutine {
    let mut steps: Vec<UnifiedStep> = Vec::new();
    let mut by_product: HashMap<&str, usize> = HashMap::new();

    for step in &routine.am {
        match by_product.get(step.product_id.as_str()) {
            Some(&i) => steps[i].step = step.clone(),
            None => {
                by_product.insert(&step.product_id, steps.len());
                steps.push(UnifiedStep { step: step.clone(), usage: StepUsage::Am });
            }
        }
    }
    for step in &routine.pm {
        match by_product.get(step.product_id.as_str()) {
            Some(&i) => steps[i].usage = StepUsage::Both,
            None => {
                by_product.insert(&step.product_id, steps.len());
                steps.push(UnifiedStep { step: step.clone(), usage: StepUsage::Pm });
            }
        }
    }

    let mut step_types: Vec<String> = Vec::new();
    for s in &steps {
        if !step_types.contains(&s.step.step_type) {
            step_types.push(s.step.step_type.clone());
        }
    }
    step_types.sort_by(|a, b| {
        let rank = |t: &str| STEP_ORDER.iter().position(|known| *known == t);
        match (rank(a), rank(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    });

    UnifiedRoutine { steps, step_types }
}
