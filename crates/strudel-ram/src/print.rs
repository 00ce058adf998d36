//! The canonical indented listing of RAM programs.
//!
//! One instruction per line, nested levels indented by one space. The
//! listing is the stable text format consumed by snapshot tests and
//! debug reports.

use std::fmt;

use crate::condition::Condition;
use crate::expression::Expression;
use crate::operation::Operation;
use crate::program::Program;
use crate::statement::Statement;

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        write!(f, " ")?;
    }
    Ok(())
}

fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(T::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::TupleElement { level, column } => write!(f, "t{level}.{column}"),
            Expression::SignedConstant(value) => write!(f, "{value}"),
            Expression::UnsignedConstant(value) => write!(f, "{value}"),
            Expression::FloatConstant(value) => write!(f, "{value}"),
            Expression::StringConstant(value) => write!(f, "\"{value}\""),
            Expression::Intrinsic { op, args, .. } => {
                if op.is_infix() && args.len() == 2 {
                    write!(f, "({} {} {})", args[0], op.symbol(), args[1])
                } else if args.len() == 1 && op.symbol() == "-" {
                    write!(f, "(-{})", args[0])
                } else {
                    write!(f, "{}({})", op.symbol(), join(args, ", "))
                }
            }
            Expression::UserDefined { name, args } => {
                write!(f, "{name}({})", join(args, ", "))
            }
            Expression::AutoIncrement => write!(f, "autoinc()"),
            Expression::PackRecord(args) => write!(f, "[{}]", join(args, ", ")),
            Expression::RelationSize(relation) => write!(f, "size({relation})"),
            Expression::SubroutineArgument(index) => write!(f, "arg({index})"),
            Expression::Undef => write!(f, "⊥"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::True => write!(f, "true"),
            Condition::False => write!(f, "false"),
            Condition::Conjunction(lhs, rhs) => write!(f, "{lhs} AND {rhs}"),
            Condition::Negation(inner) => write!(f, "(NOT {inner})"),
            Condition::EmptinessCheck(relation) => write!(f, "({relation} = ∅)"),
            Condition::ExistenceCheck { relation, values } => {
                write!(f, "({}) ∈ {relation}", join(values, ","))
            }
            Condition::ProvenanceExistenceCheck { relation, values } => {
                write!(f, "({}) ∈ {relation} [provenance]", join(values, ","))
            }
            Condition::Constraint { op, lhs, rhs } => {
                write!(f, "({lhs} {} {rhs})", op.keyword())
            }
        }
    }
}

/// Index patterns print as the bound-column comparisons.
fn pattern_text(level: usize, pattern: &[Expression]) -> String {
    let bounds: Vec<String> = pattern
        .iter()
        .enumerate()
        .filter(|(_, expr)| !expr.is_undef())
        .map(|(column, expr)| format!("t{level}.{column} = {expr}"))
        .collect();
    bounds.join(" AND ")
}

fn print_operation(op: &Operation, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    indent(f, depth)?;
    match op {
        Operation::Scan {
            relation,
            level,
            inner,
        } => {
            writeln!(f, "FOR t{level} IN {relation}")?;
            print_operation(inner, f, depth + 1)
        }
        Operation::ParallelScan {
            relation,
            level,
            inner,
        } => {
            writeln!(f, "PARALLEL FOR t{level} IN {relation}")?;
            print_operation(inner, f, depth + 1)
        }
        Operation::IndexScan {
            relation,
            level,
            pattern,
            inner,
        } => {
            writeln!(
                f,
                "FOR t{level} IN {relation} ON INDEX {}",
                pattern_text(*level, pattern)
            )?;
            print_operation(inner, f, depth + 1)
        }
        Operation::ParallelIndexScan {
            relation,
            level,
            pattern,
            inner,
        } => {
            writeln!(
                f,
                "PARALLEL FOR t{level} IN {relation} ON INDEX {}",
                pattern_text(*level, pattern)
            )?;
            print_operation(inner, f, depth + 1)
        }
        Operation::IfExists {
            relation,
            level,
            condition,
            inner,
        } => {
            writeln!(f, "IF EXISTS t{level} IN {relation} WHERE {condition}")?;
            print_operation(inner, f, depth + 1)
        }
        Operation::IndexIfExists {
            relation,
            level,
            pattern,
            condition,
            inner,
        } => {
            writeln!(
                f,
                "IF EXISTS t{level} IN {relation} ON INDEX {} WHERE {condition}",
                pattern_text(*level, pattern)
            )?;
            print_operation(inner, f, depth + 1)
        }
        Operation::Aggregate {
            op,
            relation,
            level,
            expression,
            condition,
            inner,
        } => {
            write!(
                f,
                "t{level}.0 = {}",
                op.keyword().to_uppercase()
            )?;
            if !expression.is_undef() {
                write!(f, " {expression}")?;
            }
            write!(f, " SEARCH t{level} IN {relation}")?;
            if *condition != Condition::True {
                write!(f, " WHERE {condition}")?;
            }
            writeln!(f)?;
            print_operation(inner, f, depth + 1)
        }
        Operation::IndexAggregate {
            op,
            relation,
            level,
            pattern,
            expression,
            condition,
            inner,
        } => {
            write!(f, "t{level}.0 = {}", op.keyword().to_uppercase())?;
            if !expression.is_undef() {
                write!(f, " {expression}")?;
            }
            write!(
                f,
                " SEARCH t{level} IN {relation} ON INDEX {}",
                pattern_text(*level, pattern)
            )?;
            if *condition != Condition::True {
                write!(f, " WHERE {condition}")?;
            }
            writeln!(f)?;
            print_operation(inner, f, depth + 1)
        }
        Operation::UnpackRecord {
            expression,
            arity,
            level,
            inner,
        } => {
            writeln!(f, "UNPACK t{level} ARITY {arity} FROM {expression}")?;
            print_operation(inner, f, depth + 1)
        }
        Operation::Filter { condition, inner } => {
            writeln!(f, "IF {condition}")?;
            print_operation(inner, f, depth + 1)
        }
        Operation::Break { condition, inner } => {
            writeln!(f, "IF {condition} BREAK")?;
            print_operation(inner, f, depth + 1)
        }
        Operation::NestedIntrinsic {
            op,
            args,
            level,
            inner,
        } => {
            writeln!(f, "{}({}) INTO t{level}", op.keyword(), join(args, ", "))?;
            print_operation(inner, f, depth + 1)
        }
        Operation::Insert { relation, values } => {
            writeln!(f, "INSERT ({}) INTO {relation}", join(values, ", "))
        }
        Operation::GuardedInsert {
            relation,
            values,
            condition,
        } => {
            writeln!(
                f,
                "INSERT ({}) INTO {relation} IF {condition}",
                join(values, ", ")
            )
        }
        Operation::SubroutineReturn(values) => {
            writeln!(f, "RETURN ({})", join(values, ", "))
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        print_operation(self, f, 0)
    }
}

fn print_statement(stmt: &Statement, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    match stmt {
        Statement::Sequence(children) => {
            for child in children {
                print_statement(child, f, depth)?;
            }
            Ok(())
        }
        Statement::Parallel(children) => {
            indent(f, depth)?;
            writeln!(f, "PARALLEL")?;
            for child in children {
                print_statement(child, f, depth + 1)?;
            }
            indent(f, depth)?;
            writeln!(f, "END PARALLEL")
        }
        Statement::Loop(inner) => {
            indent(f, depth)?;
            writeln!(f, "LOOP")?;
            print_statement(inner, f, depth + 1)?;
            indent(f, depth)?;
            writeln!(f, "END LOOP")
        }
        Statement::Exit(condition) => {
            indent(f, depth)?;
            writeln!(f, "EXIT {condition}")
        }
        Statement::Swap(a, b) => {
            indent(f, depth)?;
            writeln!(f, "SWAP ({a}, {b})")
        }
        Statement::Extend { target, source } => {
            indent(f, depth)?;
            writeln!(f, "EXTEND {target} WITH {source}")
        }
        Statement::Clear(relation) => {
            indent(f, depth)?;
            writeln!(f, "CLEAR {relation}")
        }
        Statement::Io {
            relation,
            directives,
        } => {
            indent(f, depth)?;
            let params: Vec<String> = directives
                .iter()
                .map(|(key, value)| format!("{key}=\"{value}\""))
                .collect();
            writeln!(f, "IO {relation} ({})", params.join(","))
        }
        Statement::LogTimer { message, inner } => {
            indent(f, depth)?;
            writeln!(f, "TIMER \"{message}\"")?;
            print_statement(inner, f, depth + 1)?;
            indent(f, depth)?;
            writeln!(f, "END TIMER")
        }
        Statement::LogRelationTimer {
            message,
            relation,
            inner,
        } => {
            indent(f, depth)?;
            writeln!(f, "TIMER ON {relation} \"{message}\"")?;
            print_statement(inner, f, depth + 1)?;
            indent(f, depth)?;
            writeln!(f, "END TIMER")
        }
        Statement::LogSize { relation, message } => {
            indent(f, depth)?;
            writeln!(f, "LOGSIZE {relation} \"{message}\"")
        }
        Statement::DebugInfo { message, inner } => {
            indent(f, depth)?;
            writeln!(f, "DEBUG \"{message}\"")?;
            print_statement(inner, f, depth + 1)?;
            indent(f, depth)?;
            writeln!(f, "END DEBUG")
        }
        Statement::Call(name) => {
            indent(f, depth)?;
            writeln!(f, "CALL {name}")
        }
        Statement::Query(operation) => {
            indent(f, depth)?;
            writeln!(f, "QUERY")?;
            print_operation(operation, f, depth + 1)
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        print_statement(self, f, 0)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PROGRAM")?;
        writeln!(f, " DECLARATION")?;
        for relation in &self.relations {
            writeln!(f, "  {}", relation.signature())?;
        }
        writeln!(f, " END DECLARATION")?;
        for (name, body) in &self.subroutines {
            writeln!(f, " SUBROUTINE {name}")?;
            print_statement(body, f, 2)?;
            writeln!(f, " END SUBROUTINE")?;
        }
        writeln!(f, " MAIN")?;
        print_statement(&self.main, f, 2)?;
        writeln!(f, " END MAIN")?;
        writeln!(f, "END PROGRAM")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{ConstraintOp, IntrinsicOp};
    use strudel_solver::ResolvedConstraintOp;
    use strudel_types::Kind;

    #[test]
    fn expression_rendering() {
        let sum = Expression::Intrinsic {
            op: IntrinsicOp::Add,
            kind: Kind::Signed,
            args: vec![Expression::tuple(0, 1), Expression::SignedConstant(1)],
        };
        assert_eq!(sum.to_string(), "(t0.1 + 1)");
        assert_eq!(Expression::StringConstant("a".into()).to_string(), "\"a\"");
        assert_eq!(
            Expression::PackRecord(vec![Expression::SignedConstant(1), Expression::Undef])
                .to_string(),
            "[1, ⊥]"
        );
    }

    #[test]
    fn condition_rendering() {
        let cond = Condition::Negation(Box::new(Condition::ExistenceCheck {
            relation: "f".into(),
            values: vec![Expression::SignedConstant(1), Expression::Undef],
        }));
        assert_eq!(cond.to_string(), "(NOT (1,⊥) ∈ f)");

        let cmp = Condition::Constraint {
            op: ResolvedConstraintOp::new(ConstraintOp::Ge, Kind::Signed),
            lhs: Expression::RelationSize("f".into()),
            rhs: Expression::SignedConstant(100),
        };
        assert_eq!(cmp.to_string(), "(size(f) >= 100)");
    }

    #[test]
    fn query_rendering_is_indented() {
        let query = Statement::Query(Operation::Scan {
            relation: "edge".into(),
            level: 0,
            inner: Box::new(Operation::Insert {
                relation: "path".into(),
                values: vec![Expression::tuple(0, 0), Expression::tuple(0, 1)],
            }),
        });
        assert_eq!(
            query.to_string(),
            "QUERY\n FOR t0 IN edge\n  INSERT (t0.0, t0.1) INTO path\n"
        );
    }

    #[test]
    fn loop_rendering() {
        let fixpoint = Statement::Loop(Box::new(Statement::sequence(vec![
            Statement::Exit(Condition::EmptinessCheck("@new_path".into())),
            Statement::Swap("@delta_path".into(), "@new_path".into()),
            Statement::Clear("@new_path".into()),
        ])));
        assert_eq!(
            fixpoint.to_string(),
            "LOOP\n EXIT (@new_path = ∅)\n SWAP (@delta_path, @new_path)\n CLEAR @new_path\nEND LOOP\n"
        );
    }
}
