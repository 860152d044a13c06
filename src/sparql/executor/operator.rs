//! Physical operators for SPARQL execution (Volcano iterator model)
//!
//! Each operator pulls solutions from its children on demand, so consumers
//! such as ASK and LIMIT can stop early. Operators that need their whole
//! input (ORDER BY, GROUP BY, the right side of joins) materialize it on the
//! first call to `next`.

use crate::rdf::{
    Literal, RdfObject, RdfPredicate, RdfStore, RdfSubject, RdfTerm, Triple, TripleIterator,
};
use crate::sparql::algebra::{AggregateCall, Expr, OrderKey, PatternTerm, PatternTriple};
use crate::sparql::ast::{AggregateFunction, PropertyPath};
use crate::sparql::eval::{self, compare_terms, Numeric};
use crate::sparql::executor::{ExecutionContext, ExecutionResult, Solution};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;

/// Physical operator trait (Volcano iterator model)
pub trait PhysicalOperator<'a>: Send {
    /// Get next solution
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>>;

    /// Reset operator state so the sequence can be replayed
    fn reset(&mut self);
}

pub type OperatorBox<'a> = Box<dyn PhysicalOperator<'a> + 'a>;

/// Resolve a pattern position against a solution: a constant, a bound
/// variable, or `None` when free
fn resolve<'t>(term: &'t PatternTerm, solution: &'t Solution) -> Option<&'t RdfTerm> {
    match term {
        PatternTerm::Term(t) => Some(t),
        PatternTerm::Variable(v) => solution.get(v),
    }
}

/// Bind a pattern position to a matched term. Fails if the variable is
/// already bound to something else (repeated variables, seeded bindings).
fn bind_position(solution: &mut Solution, position: &PatternTerm, term: RdfTerm) -> bool {
    match position {
        PatternTerm::Variable(v) => match solution.get(v) {
            Some(existing) => existing == &term,
            None => {
                solution.bind(v.clone(), term);
                true
            }
        },
        PatternTerm::Term(t) => t == &term,
    }
}

/// Emits a single seed solution (the empty solution at the top level)
pub struct SeedOperator {
    seed: Solution,
    done: bool,
}

impl SeedOperator {
    pub fn new(seed: Solution) -> Self {
        Self { seed, done: false }
    }
}

impl<'a> PhysicalOperator<'a> for SeedOperator {
    fn next(&mut self, _ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(Some(self.seed.clone()))
    }

    fn reset(&mut self) {
        self.done = false;
    }
}

/// Matches one triple pattern for every input solution (index nested loop)
pub struct TriplePatternOperator<'a> {
    input: OperatorBox<'a>,
    pattern: PatternTriple,
    current: Option<Solution>,
    matches: Option<TripleIterator<'a>>,
}

impl<'a> TriplePatternOperator<'a> {
    pub fn new(input: OperatorBox<'a>, pattern: PatternTriple) -> Self {
        Self {
            input,
            pattern,
            current: None,
            matches: None,
        }
    }

    /// Store lookup with the input's bindings substituted; `None` when a
    /// bound term cannot occupy its position
    fn lookup(
        pattern: &PatternTriple,
        store: &'a RdfStore,
        solution: &Solution,
    ) -> Option<TripleIterator<'a>> {
        let subject = match resolve(&pattern.subject, solution) {
            Some(t) => Some(RdfSubject::try_from(t.clone()).ok()?),
            None => None,
        };
        let predicate = match resolve(&pattern.predicate, solution) {
            Some(t) => Some(RdfPredicate::try_from(t.clone()).ok()?),
            None => None,
        };
        let object = resolve(&pattern.object, solution).map(|t| RdfObject::from(t.clone()));
        Some(store.match_triples(subject.as_ref(), predicate.as_ref(), object.as_ref()))
    }
}

fn bind_triple(pattern: &PatternTriple, triple: &Triple, input: &Solution) -> Option<Solution> {
    let mut solution = input.clone();
    let bound = bind_position(&mut solution, &pattern.subject, triple.subject.clone().into())
        && bind_position(&mut solution, &pattern.predicate, triple.predicate.clone().into())
        && bind_position(&mut solution, &pattern.object, triple.object.clone().into());
    bound.then_some(solution)
}

impl<'a> PhysicalOperator<'a> for TriplePatternOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        loop {
            if let (Some(input), Some(matches)) = (&self.current, &mut self.matches) {
                for triple in matches.by_ref() {
                    if let Some(solution) = bind_triple(&self.pattern, triple, input) {
                        return Ok(Some(solution));
                    }
                }
            }

            match self.input.next(ctx)? {
                Some(solution) => {
                    self.matches = Self::lookup(&self.pattern, ctx.store, &solution);
                    self.current = Some(solution);
                }
                None => {
                    self.current = None;
                    self.matches = None;
                    return Ok(None);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.current = None;
        self.matches = None;
    }
}

/// Evaluates a property path for every input solution
pub struct PathOperator<'a> {
    input: OperatorBox<'a>,
    subject: PatternTerm,
    path: PropertyPath,
    object: PatternTerm,
    current: Option<Solution>,
    pairs: Vec<(RdfTerm, RdfTerm)>,
    position: usize,
}

impl<'a> PathOperator<'a> {
    pub fn new(
        input: OperatorBox<'a>,
        subject: PatternTerm,
        path: PropertyPath,
        object: PatternTerm,
    ) -> Self {
        Self {
            input,
            subject,
            path,
            object,
            current: None,
            pairs: Vec::new(),
            position: 0,
        }
    }
}

impl<'a> PhysicalOperator<'a> for PathOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        loop {
            if let Some(input) = &self.current {
                while self.position < self.pairs.len() {
                    let (start, end) = self.pairs[self.position].clone();
                    self.position += 1;
                    let mut solution = input.clone();
                    if bind_position(&mut solution, &self.subject, start)
                        && bind_position(&mut solution, &self.object, end)
                    {
                        return Ok(Some(solution));
                    }
                }
            }

            match self.input.next(ctx)? {
                Some(solution) => {
                    let subject = resolve(&self.subject, &solution);
                    let object = resolve(&self.object, &solution);
                    self.pairs = eval::evaluate_path(ctx.store, &self.path, subject, object);
                    self.position = 0;
                    self.current = Some(solution);
                }
                None => {
                    self.current = None;
                    return Ok(None);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.current = None;
        self.pairs.clear();
        self.position = 0;
    }
}

/// Pull every remaining solution from an operator
fn drain<'a>(
    operator: &mut OperatorBox<'a>,
    ctx: &ExecutionContext<'a>,
) -> ExecutionResult<Vec<Solution>> {
    let mut solutions = Vec::new();
    while let Some(solution) = operator.next(ctx)? {
        solutions.push(solution);
    }
    Ok(solutions)
}

/// Join of two arbitrary sub-plans; the right side is materialized once
pub struct JoinOperator<'a> {
    left: OperatorBox<'a>,
    right: OperatorBox<'a>,
    right_rows: Vec<Solution>,
    materialized: bool,
    current: Option<Solution>,
    right_pos: usize,
}

impl<'a> JoinOperator<'a> {
    pub fn new(left: OperatorBox<'a>, right: OperatorBox<'a>) -> Self {
        Self {
            left,
            right,
            right_rows: Vec::new(),
            materialized: false,
            current: None,
            right_pos: 0,
        }
    }
}

impl<'a> PhysicalOperator<'a> for JoinOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if !self.materialized {
            self.right_rows = drain(&mut self.right, ctx)?;
            self.materialized = true;
        }

        loop {
            if let Some(left) = &self.current {
                while self.right_pos < self.right_rows.len() {
                    let right = &self.right_rows[self.right_pos];
                    self.right_pos += 1;
                    if let Some(merged) = left.merge(right) {
                        return Ok(Some(merged));
                    }
                }
            }

            match self.left.next(ctx)? {
                Some(left) => {
                    self.current = Some(left);
                    self.right_pos = 0;
                }
                None => {
                    self.current = None;
                    return Ok(None);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.right_rows.clear();
        self.materialized = false;
        self.current = None;
        self.right_pos = 0;
    }
}

/// OPTIONAL: every left solution is emitted at least once
pub struct LeftJoinOperator<'a> {
    left: OperatorBox<'a>,
    right: OperatorBox<'a>,
    condition: Option<Expr>,
    right_rows: Vec<Solution>,
    materialized: bool,
    current: Option<Solution>,
    right_pos: usize,
    matched: bool,
}

impl<'a> LeftJoinOperator<'a> {
    pub fn new(left: OperatorBox<'a>, right: OperatorBox<'a>, condition: Option<Expr>) -> Self {
        Self {
            left,
            right,
            condition,
            right_rows: Vec::new(),
            materialized: false,
            current: None,
            right_pos: 0,
            matched: false,
        }
    }
}

impl<'a> PhysicalOperator<'a> for LeftJoinOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if !self.materialized {
            self.right_rows = drain(&mut self.right, ctx)?;
            self.materialized = true;
        }

        loop {
            let Some(left) = self.current.as_ref() else {
                match self.left.next(ctx)? {
                    Some(left) => {
                        self.current = Some(left);
                        self.right_pos = 0;
                        self.matched = false;
                        continue;
                    }
                    None => return Ok(None),
                }
            };

            while self.right_pos < self.right_rows.len() {
                let right = &self.right_rows[self.right_pos];
                self.right_pos += 1;
                let Some(merged) = left.merge(right) else {
                    continue;
                };
                let accepted = match &self.condition {
                    Some(condition) => eval::evaluate_condition(condition, &merged, ctx),
                    None => true,
                };
                if accepted {
                    self.matched = true;
                    return Ok(Some(merged));
                }
            }

            let unmatched = !self.matched;
            let left = self.current.take();
            if unmatched {
                return Ok(left);
            }
        }
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.right_rows.clear();
        self.materialized = false;
        self.current = None;
        self.right_pos = 0;
        self.matched = false;
    }
}

/// Bag union: all left solutions, then all right solutions
pub struct UnionOperator<'a> {
    left: OperatorBox<'a>,
    right: OperatorBox<'a>,
    left_done: bool,
}

impl<'a> UnionOperator<'a> {
    pub fn new(left: OperatorBox<'a>, right: OperatorBox<'a>) -> Self {
        Self {
            left,
            right,
            left_done: false,
        }
    }
}

impl<'a> PhysicalOperator<'a> for UnionOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if !self.left_done {
            if let Some(solution) = self.left.next(ctx)? {
                return Ok(Some(solution));
            }
            self.left_done = true;
        }
        self.right.next(ctx)
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.left_done = false;
    }
}

/// MINUS: drops left solutions that have a compatible right solution
/// sharing at least one variable
pub struct MinusOperator<'a> {
    left: OperatorBox<'a>,
    right: OperatorBox<'a>,
    right_rows: Vec<Solution>,
    materialized: bool,
}

impl<'a> MinusOperator<'a> {
    pub fn new(left: OperatorBox<'a>, right: OperatorBox<'a>) -> Self {
        Self {
            left,
            right,
            right_rows: Vec::new(),
            materialized: false,
        }
    }
}

impl<'a> PhysicalOperator<'a> for MinusOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if !self.materialized {
            self.right_rows = drain(&mut self.right, ctx)?;
            self.materialized = true;
        }

        while let Some(left) = self.left.next(ctx)? {
            let excluded = self
                .right_rows
                .iter()
                .any(|right| left.shares_variable(right) && left.is_compatible(right));
            if !excluded {
                return Ok(Some(left));
            }
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.right_rows.clear();
        self.materialized = false;
    }
}

/// Filter operator: keeps solutions whose condition is true
pub struct FilterOperator<'a> {
    input: OperatorBox<'a>,
    condition: Expr,
}

impl<'a> FilterOperator<'a> {
    pub fn new(input: OperatorBox<'a>, condition: Expr) -> Self {
        Self { input, condition }
    }
}

impl<'a> PhysicalOperator<'a> for FilterOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        while let Some(solution) = self.input.next(ctx)? {
            if eval::evaluate_condition(&self.condition, &solution, ctx) {
                return Ok(Some(solution));
            }
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// BIND: evaluation errors leave the variable unbound
pub struct ExtendOperator<'a> {
    input: OperatorBox<'a>,
    variable: String,
    expr: Expr,
}

impl<'a> ExtendOperator<'a> {
    pub fn new(input: OperatorBox<'a>, variable: String, expr: Expr) -> Self {
        Self {
            input,
            variable,
            expr,
        }
    }
}

impl<'a> PhysicalOperator<'a> for ExtendOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        let Some(mut solution) = self.input.next(ctx)? else {
            return Ok(None);
        };
        if let Some(term) = eval::evaluate(&self.expr, &solution, ctx) {
            solution.bind(self.variable.clone(), term);
        }
        Ok(Some(solution))
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Running state of one aggregate within one group
#[derive(Default)]
struct AggregateState {
    rows: i64,
    values: Vec<RdfTerm>,
    seen_terms: FxHashSet<RdfTerm>,
    seen_rows: FxHashSet<Solution>,
}

impl AggregateState {
    fn update(&mut self, call: &AggregateCall, solution: &Solution, ctx: &ExecutionContext<'_>) {
        match &call.expr {
            None => {
                if call.distinct && !self.seen_rows.insert(solution.clone()) {
                    return;
                }
                self.rows += 1;
            }
            Some(expr) => {
                // Unbound and erroring inputs are skipped
                let Some(value) = eval::evaluate(expr, solution, ctx) else {
                    return;
                };
                if call.distinct && !self.seen_terms.insert(value.clone()) {
                    return;
                }
                self.values.push(value);
            }
        }
    }

    fn sum(&self) -> Option<Numeric> {
        self.values.iter().try_fold(Numeric::Integer(0), |acc, value| {
            acc.add(Numeric::from_literal(value.as_literal()?)?)
        })
    }

    fn finish(&self, call: &AggregateCall) -> Option<RdfTerm> {
        match call.function {
            AggregateFunction::Count => {
                let count = if call.expr.is_none() {
                    self.rows
                } else {
                    self.values.len() as i64
                };
                Some(Literal::integer(count).into())
            }
            AggregateFunction::Sum => Some(self.sum()?.to_literal().into()),
            AggregateFunction::Avg => {
                if self.values.is_empty() {
                    return Some(Literal::integer(0).into());
                }
                let count = Numeric::Integer(self.values.len() as i64);
                Some(self.sum()?.div(count)?.to_literal().into())
            }
            AggregateFunction::Min => self
                .values
                .iter()
                .min_by(|a, b| compare_terms(Some(a), Some(b)))
                .cloned(),
            AggregateFunction::Max => self
                .values
                .iter()
                .max_by(|a, b| compare_terms(Some(a), Some(b)))
                .cloned(),
            AggregateFunction::Sample => self.values.first().cloned(),
            AggregateFunction::GroupConcat => {
                let separator = call.separator.as_deref().unwrap_or(" ");
                let parts = self
                    .values
                    .iter()
                    .map(|v| v.as_literal().map(Literal::value))
                    .collect::<Option<Vec<_>>>()?;
                Some(Literal::new_simple_literal(parts.join(separator)).into())
            }
        }
    }
}

/// GROUP BY with aggregates
///
/// Groups come out in order of first appearance. Without grouping keys an
/// empty input still produces one group, so `COUNT(*)` over nothing is 0.
pub struct GroupOperator<'a> {
    input: OperatorBox<'a>,
    keys: Vec<String>,
    aggregates: Vec<(String, AggregateCall)>,
    results: Vec<Solution>,
    current: usize,
    executed: bool,
}

impl<'a> GroupOperator<'a> {
    pub fn new(
        input: OperatorBox<'a>,
        keys: Vec<String>,
        aggregates: Vec<(String, AggregateCall)>,
    ) -> Self {
        Self {
            input,
            keys,
            aggregates,
            results: Vec::new(),
            current: 0,
            executed: false,
        }
    }

    fn fresh_states(&self) -> Vec<AggregateState> {
        self.aggregates
            .iter()
            .map(|_| AggregateState::default())
            .collect()
    }

    fn execute(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<()> {
        let mut groups: IndexMap<Vec<Option<RdfTerm>>, Vec<AggregateState>> = IndexMap::new();

        while let Some(solution) = self.input.next(ctx)? {
            let key: Vec<Option<RdfTerm>> =
                self.keys.iter().map(|k| solution.get(k).cloned()).collect();
            if !groups.contains_key(&key) {
                groups.insert(key.clone(), self.fresh_states());
            }
            if let Some(states) = groups.get_mut(&key) {
                for (state, (_, call)) in states.iter_mut().zip(&self.aggregates) {
                    state.update(call, &solution, ctx);
                }
            }
        }

        if groups.is_empty() && self.keys.is_empty() {
            groups.insert(Vec::new(), self.fresh_states());
        }

        self.results = groups
            .into_iter()
            .map(|(key, states)| {
                let mut solution = Solution::new();
                for (variable, term) in self.keys.iter().zip(key) {
                    if let Some(term) = term {
                        solution.bind(variable.clone(), term);
                    }
                }
                for ((variable, call), state) in self.aggregates.iter().zip(&states) {
                    if let Some(term) = state.finish(call) {
                        solution.bind(variable.clone(), term);
                    }
                }
                solution
            })
            .collect();
        Ok(())
    }
}

impl<'a> PhysicalOperator<'a> for GroupOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if !self.executed {
            self.execute(ctx)?;
            self.executed = true;
        }

        if self.current < self.results.len() {
            let solution = self.results[self.current].clone();
            self.current += 1;
            Ok(Some(solution))
        } else {
            Ok(None)
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.results.clear();
        self.current = 0;
        self.executed = false;
    }
}

/// Stable multi-key sort in SPARQL term order
pub struct SortOperator<'a> {
    input: OperatorBox<'a>,
    keys: Vec<OrderKey>,
    records: Vec<Solution>,
    current: usize,
    executed: bool,
}

impl<'a> SortOperator<'a> {
    pub fn new(input: OperatorBox<'a>, keys: Vec<OrderKey>) -> Self {
        Self {
            input,
            keys,
            records: Vec::new(),
            current: 0,
            executed: false,
        }
    }
}

impl<'a> PhysicalOperator<'a> for SortOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if !self.executed {
            // Evaluate sort keys once per row; errors sort like unbound
            let mut keyed = Vec::new();
            while let Some(solution) = self.input.next(ctx)? {
                let values: Vec<Option<RdfTerm>> = self
                    .keys
                    .iter()
                    .map(|key| eval::evaluate(&key.expr, &solution, ctx))
                    .collect();
                keyed.push((values, solution));
            }

            let keys = &self.keys;
            keyed.sort_by(|(a, _), (b, _)| {
                for (idx, key) in keys.iter().enumerate() {
                    let ordering = compare_terms(a[idx].as_ref(), b[idx].as_ref());
                    let ordering = if key.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });

            self.records = keyed.into_iter().map(|(_, solution)| solution).collect();
            self.executed = true;
        }

        if self.current < self.records.len() {
            let solution = self.records[self.current].clone();
            self.current += 1;
            Ok(Some(solution))
        } else {
            Ok(None)
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.records.clear();
        self.current = 0;
        self.executed = false;
    }
}

/// Project operator: restricts solutions to the selected variables
pub struct ProjectOperator<'a> {
    input: OperatorBox<'a>,
    variables: Vec<String>,
}

impl<'a> ProjectOperator<'a> {
    pub fn new(input: OperatorBox<'a>, variables: Vec<String>) -> Self {
        Self { input, variables }
    }
}

impl<'a> PhysicalOperator<'a> for ProjectOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        Ok(self
            .input
            .next(ctx)?
            .map(|solution| solution.project(&self.variables)))
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

pub struct DistinctOperator<'a> {
    input: OperatorBox<'a>,
    seen: FxHashSet<Solution>,
}

impl<'a> DistinctOperator<'a> {
    pub fn new(input: OperatorBox<'a>) -> Self {
        Self {
            input,
            seen: FxHashSet::default(),
        }
    }
}

impl<'a> PhysicalOperator<'a> for DistinctOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        while let Some(solution) = self.input.next(ctx)? {
            if self.seen.insert(solution.clone()) {
                return Ok(Some(solution));
            }
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.seen.clear();
    }
}

/// REDUCED: drops a solution only when it repeats the one just emitted
pub struct ReducedOperator<'a> {
    input: OperatorBox<'a>,
    last: Option<Solution>,
}

impl<'a> ReducedOperator<'a> {
    pub fn new(input: OperatorBox<'a>) -> Self {
        Self { input, last: None }
    }
}

impl<'a> PhysicalOperator<'a> for ReducedOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        while let Some(solution) = self.input.next(ctx)? {
            if self.last.as_ref() != Some(&solution) {
                self.last = Some(solution.clone());
                return Ok(Some(solution));
            }
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.last = None;
    }
}

/// OFFSET then LIMIT
pub struct SliceOperator<'a> {
    input: OperatorBox<'a>,
    offset: usize,
    limit: Option<usize>,
    skipped: bool,
    emitted: usize,
}

impl<'a> SliceOperator<'a> {
    pub fn new(input: OperatorBox<'a>, offset: usize, limit: Option<usize>) -> Self {
        Self {
            input,
            offset,
            limit,
            skipped: false,
            emitted: 0,
        }
    }
}

impl<'a> PhysicalOperator<'a> for SliceOperator<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return Ok(None);
        }
        if !self.skipped {
            for _ in 0..self.offset {
                if self.input.next(ctx)?.is_none() {
                    break;
                }
            }
            self.skipped = true;
        }

        let next = self.input.next(ctx)?;
        if next.is_some() {
            self.emitted += 1;
        }
        Ok(next)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.skipped = false;
        self.emitted = 0;
    }
}

/// Inline VALUES rows
pub struct TableOperator {
    rows: Vec<Solution>,
    current: usize,
}

impl TableOperator {
    pub fn new(rows: Vec<Solution>) -> Self {
        Self { rows, current: 0 }
    }
}

impl<'a> PhysicalOperator<'a> for TableOperator {
    fn next(&mut self, _ctx: &ExecutionContext<'a>) -> ExecutionResult<Option<Solution>> {
        if self.current < self.rows.len() {
            let row = self.rows[self.current].clone();
            self.current += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn reset(&mut self) {
        self.current = 0;
    }
}
