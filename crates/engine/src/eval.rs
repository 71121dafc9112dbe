//! Forward evaluation and dependency-edge maintenance.
//!
//! Evaluating an AST is also what keeps the dependency graph true: the
//! walk over `Ref` leaves installs the owning cell into each referenced
//! cell's dependents, and `remove_as_dependent` reverse-walks a replaced
//! AST to delete the stale edges. Cycles are detected here, during the
//! forward pass, never at install time.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::cell::CellTable;
use crate::cell_id::CellId;
use crate::error::{EngineError, Result};
use crate::formula::{Ast, FnId};
use crate::undo::UndoLog;

/// Values produced by one operation, keyed in canonical cell order.
pub type Updates = BTreeMap<CellId, f64>;

/// Recompute `root`, then everything that transitively depends on it.
///
/// A cell seen twice on the active DFS stack is a circular reference; the
/// error names that cell and the caller rolls the table back.
pub(crate) fn eval_from_root(
    cells: &mut CellTable,
    undo: &mut UndoLog,
    root: CellId,
) -> Result<Updates> {
    let mut visiting = FxHashSet::default();
    let mut updates = Updates::new();
    eval_one(cells, undo, root, &mut visiting, &mut updates)?;
    Ok(updates)
}

fn eval_one(
    cells: &mut CellTable,
    undo: &mut UndoLog,
    id: CellId,
    visiting: &mut FxHashSet<CellId>,
    updates: &mut Updates,
) -> Result<()> {
    if !visiting.insert(id) {
        return Err(EngineError::CircularRef(id));
    }

    let ast = cells.get(id).and_then(|c| c.ast.clone());
    let value = match &ast {
        Some(ast) => eval_ast(cells, undo, id, ast)?,
        None => 0.0,
    };
    cells.update(undo, id, |c| c.value = value);
    updates.insert(id, value);

    // Dependents visited in canonical order for deterministic updates and
    // cycle reports.
    let mut dependents: Vec<CellId> = cells
        .get(id)
        .map(|c| c.dependents.iter().copied().collect())
        .unwrap_or_default();
    dependents.sort_unstable();
    for dep in dependents {
        eval_one(cells, undo, dep, visiting, updates)?;
    }

    visiting.remove(&id);
    Ok(())
}

/// Evaluate `ast` in the context of the cell that owns it, installing a
/// dependency edge at every reference leaf.
fn eval_ast(cells: &mut CellTable, undo: &mut UndoLog, base: CellId, ast: &Ast) -> Result<f64> {
    match ast {
        Ast::Num(n) => Ok(*n),
        Ast::Ref(r) => {
            let target = r.resolve(base)?;
            cells.update(undo, target, |c| {
                c.dependents.insert(base);
            });
            Ok(cells.get(target).map_or(0.0, |c| c.value))
        }
        Ast::App { op, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_ast(cells, undo, base, arg)?);
            }
            Ok(apply(*op, &values))
        }
    }
}

/// Fold an argument list through a function. Division follows IEEE 754:
/// a zero divisor yields an infinity or NaN that is cached like any other
/// value.
fn apply(op: FnId, values: &[f64]) -> f64 {
    match (op, values) {
        (FnId::Add, [a, b]) => a + b,
        (FnId::Sub, [a, b]) => a - b,
        (FnId::Mul, [a, b]) => a * b,
        (FnId::Div, [a, b]) => a / b,
        (FnId::Neg, [a]) => -a,
        (FnId::Min, vs) => vs.iter().copied().fold(f64::INFINITY, f64::min),
        (FnId::Max, vs) => vs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        // Arity is enforced by the parser; nothing else constructs ASTs.
        _ => f64::NAN,
    }
}

/// Reverse walk of a replaced AST: delete `owner` from the dependents of
/// every cell the old formula referenced, dropping any record this
/// orphans.
pub(crate) fn remove_as_dependent(
    cells: &mut CellTable,
    undo: &mut UndoLog,
    owner: CellId,
    ast: &Ast,
) {
    match ast {
        Ast::Num(_) => {}
        Ast::Ref(r) => {
            // Installed ASTs always resolve against their own cell.
            if let Ok(target) = r.resolve(owner) {
                if cells
                    .get(target)
                    .is_some_and(|c| c.dependents.contains(&owner))
                {
                    cells.update(undo, target, |c| {
                        c.dependents.remove(&owner);
                    });
                    cells.remove_if_dead(undo, target);
                }
            }
        }
        Ast::App { args, .. } => {
            for arg in args {
                remove_as_dependent(cells, undo, owner, arg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse;

    fn id(s: &str) -> CellId {
        s.parse().unwrap()
    }

    fn install(cells: &mut CellTable, undo: &mut UndoLog, at: &str, formula: &str) -> Updates {
        let target = id(at);
        let ast = parse(formula, target).unwrap();
        cells.update(undo, target, |c| c.ast = Some(ast));
        eval_from_root(cells, undo, target).unwrap()
    }

    #[test]
    fn test_literal_evaluation() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        let updates = install(&mut cells, &mut undo, "a1", "(1+2)*3");
        assert_eq!(updates.get(&id("a1")), Some(&9.0));
    }

    #[test]
    fn test_reference_installs_edge_and_reads_value() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        install(&mut cells, &mut undo, "a1", "5");
        install(&mut cells, &mut undo, "b1", "a1+1");

        assert!(cells.get(id("a1")).unwrap().dependents.contains(&id("b1")));
        assert_eq!(cells.get(id("b1")).unwrap().value, 6.0);
    }

    #[test]
    fn test_empty_reference_reads_zero() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        let updates = install(&mut cells, &mut undo, "b2", "z9*2");
        assert_eq!(updates.get(&id("b2")), Some(&0.0));
        // The referenced cell now exists purely as a back-edge carrier.
        let z9 = cells.get(id("z9")).unwrap();
        assert!(z9.ast.is_none());
        assert!(z9.dependents.contains(&id("b2")));
    }

    #[test]
    fn test_propagation_through_dependents() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        install(&mut cells, &mut undo, "a1", "1");
        install(&mut cells, &mut undo, "b1", "a1*10");
        install(&mut cells, &mut undo, "c1", "b1+a1");

        let updates = install(&mut cells, &mut undo, "a1", "2");
        assert_eq!(updates.get(&id("a1")), Some(&2.0));
        assert_eq!(updates.get(&id("b1")), Some(&20.0));
        assert_eq!(updates.get(&id("c1")), Some(&22.0));
    }

    #[test]
    fn test_self_reference_is_circular() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        let target = id("a1");
        let ast = parse("a1+1", target).unwrap();
        cells.update(&mut undo, target, |c| c.ast = Some(ast));

        let err = eval_from_root(&mut cells, &mut undo, target).unwrap_err();
        assert_eq!(err, EngineError::CircularRef(target));
    }

    #[test]
    fn test_division_follows_ieee() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        let updates = install(&mut cells, &mut undo, "a1", "1/0");
        assert_eq!(updates.get(&id("a1")), Some(&f64::INFINITY));

        let updates = install(&mut cells, &mut undo, "b1", "0/0");
        assert!(updates.get(&id("b1")).unwrap().is_nan());
    }

    #[test]
    fn test_min_max_variadic() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        assert_eq!(
            install(&mut cells, &mut undo, "a1", "min(3,1,2)").get(&id("a1")),
            Some(&1.0)
        );
        assert_eq!(
            install(&mut cells, &mut undo, "a2", "max(3,1,2)").get(&id("a2")),
            Some(&3.0)
        );
        assert_eq!(
            install(&mut cells, &mut undo, "a3", "min(7)").get(&id("a3")),
            Some(&7.0)
        );
    }

    #[test]
    fn test_remove_as_dependent_prunes_edges_and_orphans() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        install(&mut cells, &mut undo, "b1", "a1+a2");

        let ast = cells.get(id("b1")).unwrap().ast.clone().unwrap();
        remove_as_dependent(&mut cells, &mut undo, id("b1"), &ast);

        // Both referenced cells were empty back-edge carriers; pruning the
        // edges removes them entirely.
        assert!(cells.get(id("a1")).is_none());
        assert!(cells.get(id("a2")).is_none());
    }

    #[test]
    fn test_remove_as_dependent_keeps_formula_cells() {
        let mut cells = CellTable::new();
        let mut undo = UndoLog::new();
        install(&mut cells, &mut undo, "a1", "4");
        install(&mut cells, &mut undo, "b1", "a1*2");

        let ast = cells.get(id("b1")).unwrap().ast.clone().unwrap();
        remove_as_dependent(&mut cells, &mut undo, id("b1"), &ast);

        let a1 = cells.get(id("a1")).unwrap();
        assert!(a1.dependents.is_empty());
        assert_eq!(a1.value, 4.0);
    }
}
