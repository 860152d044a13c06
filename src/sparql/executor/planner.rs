//! Query planner: compiles an algebra tree into a tree of physical operators

use crate::sparql::algebra::Algebra;
use crate::sparql::executor::operator::{
    DistinctOperator, ExtendOperator, FilterOperator, GroupOperator, JoinOperator,
    LeftJoinOperator, MinusOperator, OperatorBox, PathOperator, ProjectOperator,
    ReducedOperator, SeedOperator, SliceOperator, SortOperator, TableOperator,
    TriplePatternOperator, UnionOperator,
};
use crate::sparql::executor::{ExecutionError, ExecutionResult, Solution};
use tracing::debug;

/// Query planner
///
/// BGPs and paths on the right of a join are planned as index nested loops
/// fed by the left side; any other join materializes its right side.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryPlanner;

impl QueryPlanner {
    /// Create a new query planner
    pub fn new() -> Self {
        Self
    }

    /// Plan an algebra tree for top-level execution
    pub fn plan<'a>(&self, algebra: &Algebra) -> ExecutionResult<OperatorBox<'a>> {
        let root = self.plan_node(algebra, &Solution::new())?;
        debug!("built operator tree");
        Ok(root)
    }

    /// Plan with the bindings of an outer solution substituted into every
    /// pattern leaf (EXISTS)
    pub fn plan_with_seed<'a>(
        &self,
        algebra: &Algebra,
        seed: Solution,
    ) -> ExecutionResult<OperatorBox<'a>> {
        self.plan_node(algebra, &seed)
    }

    fn plan_node<'a>(&self, algebra: &Algebra, seed: &Solution) -> ExecutionResult<OperatorBox<'a>> {
        Ok(match algebra {
            Algebra::Bgp(_) | Algebra::Path { .. } => {
                let input: OperatorBox<'a> = Box::new(SeedOperator::new(seed.clone()));
                self.chain(input, algebra)
            }
            Algebra::Join(left, right) => {
                let left = self.plan_node(left, seed)?;
                match right.as_ref() {
                    Algebra::Bgp(_) | Algebra::Path { .. } => self.chain(left, right),
                    other => Box::new(JoinOperator::new(left, self.plan_node(other, seed)?)),
                }
            }
            Algebra::LeftJoin { left, right, expr } => Box::new(LeftJoinOperator::new(
                self.plan_node(left, seed)?,
                self.plan_node(right, seed)?,
                expr.clone(),
            )),
            Algebra::Union(left, right) => Box::new(UnionOperator::new(
                self.plan_node(left, seed)?,
                self.plan_node(right, seed)?,
            )),
            // The right side of MINUS never sees outer bindings
            Algebra::Diff(left, right) => Box::new(MinusOperator::new(
                self.plan_node(left, seed)?,
                self.plan_node(right, &Solution::new())?,
            )),
            Algebra::Filter { expr, inner } => {
                Box::new(FilterOperator::new(self.plan_node(inner, seed)?, expr.clone()))
            }
            Algebra::Extend {
                inner,
                variable,
                expr,
            } => Box::new(ExtendOperator::new(
                self.plan_node(inner, seed)?,
                variable.clone(),
                expr.clone(),
            )),
            Algebra::Group {
                inner,
                keys,
                aggregates,
            } => Box::new(GroupOperator::new(
                self.plan_node(inner, seed)?,
                keys.clone(),
                aggregates.clone(),
            )),
            Algebra::OrderBy { inner, keys } => {
                Box::new(SortOperator::new(self.plan_node(inner, seed)?, keys.clone()))
            }
            Algebra::Project { inner, variables } => Box::new(ProjectOperator::new(
                self.plan_node(inner, seed)?,
                variables.clone(),
            )),
            Algebra::Distinct(inner) => Box::new(DistinctOperator::new(self.plan_node(inner, seed)?)),
            Algebra::Reduced(inner) => Box::new(ReducedOperator::new(self.plan_node(inner, seed)?)),
            Algebra::Slice {
                inner,
                offset,
                limit,
            } => Box::new(SliceOperator::new(
                self.plan_node(inner, seed)?,
                *offset,
                *limit,
            )),
            Algebra::Table { variables, rows } => {
                let mut solutions = Vec::with_capacity(rows.len());
                for row in rows {
                    if row.len() != variables.len() {
                        return Err(ExecutionError::PlanningError(format!(
                            "VALUES row has {} cells for {} variables",
                            row.len(),
                            variables.len()
                        )));
                    }
                    let solution: Solution = variables
                        .iter()
                        .zip(row)
                        .filter_map(|(var, cell)| cell.clone().map(|term| (var.clone(), term)))
                        .collect();
                    if let Some(merged) = seed.merge(&solution) {
                        solutions.push(merged);
                    }
                }
                Box::new(TableOperator::new(solutions))
            }
        })
    }

    /// Feed `input` through the triple patterns of a BGP or through a path
    fn chain<'a>(&self, input: OperatorBox<'a>, algebra: &Algebra) -> OperatorBox<'a> {
        match algebra {
            Algebra::Bgp(patterns) => patterns.iter().fold(input, |input, pattern| {
                Box::new(TriplePatternOperator::new(input, pattern.clone())) as OperatorBox<'a>
            }),
            Algebra::Path {
                subject,
                path,
                object,
            } => Box::new(PathOperator::new(
                input,
                subject.clone(),
                path.clone(),
                object.clone(),
            )),
            _ => input,
        }
    }
}
