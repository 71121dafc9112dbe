//! AST printing with minimal parentheses and reference rebasing.
//!
//! Printing against a new base is how *copy* adjusts relative references:
//! the offsets stored in the AST stay fixed and the rendered specs move
//! with the base cell. A relative reference that falls off the sheet
//! under the new base is a syntax error.

use crate::cell_id::CellId;
use crate::coord;
use crate::error::Result;

use super::ast::{Ast, CellRef, FnId};

/// Render `ast` as formula text with relative references rebased against
/// `base`.
///
/// Round-trip law: `parse(ast_to_string(a, c), c)` is structurally equal
/// to `a` whenever every reference stays in range under `c`.
pub fn ast_to_string(ast: &Ast, base: CellId) -> Result<String> {
    let mut out = String::new();
    write_node(&mut out, ast, base)?;
    Ok(out)
}

fn write_node(out: &mut String, ast: &Ast, base: CellId) -> Result<()> {
    match ast {
        Ast::Num(n) => {
            out.push_str(&fmt_num(*n));
            Ok(())
        }
        Ast::Ref(r) => write_ref(out, r, base),
        Ast::App { op, args } => match op {
            FnId::Neg => write_neg(out, args, base),
            FnId::Min => write_call(out, "min", args, base),
            FnId::Max => write_call(out, "max", args, base),
            FnId::Add | FnId::Sub | FnId::Mul | FnId::Div => write_infix(out, *op, args, base),
        },
    }
}

fn write_infix(out: &mut String, op: FnId, args: &[Ast], base: CellId) -> Result<()> {
    let (Some((symbol, prec)), [lhs, rhs]) = (op.infix(), args) else {
        debug_assert!(false, "infix application must have two arguments");
        return Ok(());
    };

    write_child(out, lhs, base, needs_parens(lhs, prec, false))?;
    out.push(symbol);
    write_child(out, rhs, base, needs_parens(rhs, prec, true))
}

/// A child needs parentheses iff it is itself an infix application whose
/// precedence loses to the parent: strictly lower on the left,
/// lower-or-equal on the right (both operator tiers are left-associative).
fn needs_parens(child: &Ast, parent_prec: u8, is_right: bool) -> bool {
    match child {
        Ast::App { op, .. } => match op.infix() {
            Some((_, p)) => {
                if is_right {
                    p <= parent_prec
                } else {
                    p < parent_prec
                }
            }
            None => false,
        },
        Ast::Num(_) | Ast::Ref(_) => false,
    }
}

fn write_child(out: &mut String, child: &Ast, base: CellId, parens: bool) -> Result<()> {
    if parens {
        out.push('(');
        write_node(out, child, base)?;
        out.push(')');
    } else {
        write_node(out, child, base)?;
    }
    Ok(())
}

/// Unary minus parenthesizes its operand iff the operand is an
/// application of a binary infix operator.
fn write_neg(out: &mut String, args: &[Ast], base: CellId) -> Result<()> {
    let [arg] = args else {
        debug_assert!(false, "negation must have one argument");
        return Ok(());
    };
    out.push('-');
    let parens = matches!(arg, Ast::App { op, .. } if op.infix().is_some());
    write_child(out, arg, base, parens)
}

fn write_call(out: &mut String, name: &str, args: &[Ast], base: CellId) -> Result<()> {
    out.push_str(name);
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_node(out, arg, base)?;
    }
    out.push(')');
    Ok(())
}

// A leading `$` pins the whole reference, so a fully-pinned ref prints as
// `$a1` and the inner marker appears only for row-only pins (`a$1`).
// Mirrors the parser's reading of the markers.
fn write_ref(out: &mut String, r: &CellRef, base: CellId) -> Result<()> {
    if r.col.is_abs {
        out.push('$');
        out.push(coord::index_to_col_spec(r.col.index, 0)?);
    } else {
        out.push(coord::index_to_col_spec(r.col.index, base.col)?);
    }
    if r.row.is_abs {
        if !r.col.is_abs {
            out.push('$');
        }
        out.push_str(&coord::index_to_row_spec(r.row.index, 0)?);
    } else {
        out.push_str(&coord::index_to_row_spec(r.row.index, base.row)?);
    }
    Ok(())
}

/// Canonical decimal form: integral values print without a fraction.
fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
