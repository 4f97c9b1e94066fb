//! IR well-formedness checks (spec §8 invariant 7): every branch targets a
//! label in the same function, `TryBegin`/`TryEnd` pair up, `LoopBegin`/
//! `LoopEnd` balance, and `ScopeBegin`/`ScopeEnd` balance. Run once per
//! lowered function before handing it to the code generator; a failure
//! here means a bug in `lower`, not a user error, so it reports via
//! [`crate::IrError::Internal`].

use crate::{Ir, IrOp, LabelId};
use std::collections::HashSet;

pub fn verify_well_formed(ir: &Ir) -> crate::Result<()> {
    let mut labels = HashSet::new();
    for inst in &ir.instructions {
        if let IrOp::Label(id) = &inst.op {
            labels.insert(*id);
        }
    }

    let mut scope_depth: i64 = 0;
    let mut loop_depth: i64 = 0;
    let mut try_depth: i64 = 0;

    let check_target = |id: &LabelId, labels: &HashSet<LabelId>| -> crate::Result<()> {
        if labels.contains(id) {
            Ok(())
        } else {
            Err(crate::IrError::Internal(format!(
                "branch targets label {} not defined in this function",
                id.0
            )))
        }
    };

    for inst in &ir.instructions {
        match &inst.op {
            IrOp::Branch(id) => check_target(id, &labels)?,
            IrOp::ConditionalBranch {
                if_true, if_false, ..
            } => {
                check_target(if_true, &labels)?;
                check_target(if_false, &labels)?;
            }
            IrOp::LoopBegin {
                start, end, increment,
            } => {
                check_target(start, &labels)?;
                check_target(end, &labels)?;
                check_target(increment, &labels)?;
                loop_depth += 1;
            }
            IrOp::LoopEnd => loop_depth -= 1,
            IrOp::ScopeBegin => scope_depth += 1,
            IrOp::ScopeEnd => scope_depth -= 1,
            IrOp::TryBegin { handlers_label, .. } => {
                check_target(handlers_label, &labels)?;
                try_depth += 1;
            }
            IrOp::TryEnd => try_depth -= 1,
            IrOp::CatchBegin(handler) => check_target(&handler.handler_label, &labels)?,
            _ => {}
        }
        if scope_depth < 0 || loop_depth < 0 || try_depth < 0 {
            return Err(crate::IrError::Internal(
                "unbalanced scope/loop/try markers".into(),
            ));
        }
    }

    if scope_depth != 0 {
        return Err(crate::IrError::Internal(format!(
            "{scope_depth} unclosed ScopeBegin/ScopeEnd pair(s)"
        )));
    }
    if loop_depth != 0 {
        return Err(crate::IrError::Internal(format!(
            "{loop_depth} unclosed LoopBegin/LoopEnd pair(s)"
        )));
    }
    if try_depth != 0 {
        return Err(crate::IrError::Internal(format!(
            "{try_depth} unclosed TryBegin/TryEnd pair(s)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacc_ast::SourceToken;

    fn tok() -> SourceToken {
        SourceToken { line: 1, column: 1 }
    }

    #[test]
    fn balanced_scopes_pass() {
        let mut ir = Ir::default();
        ir.push(IrOp::ScopeBegin, tok());
        ir.push(IrOp::ScopeEnd, tok());
        assert!(verify_well_formed(&ir).is_ok());
    }

    #[test]
    fn unbalanced_scope_fails() {
        let mut ir = Ir::default();
        ir.push(IrOp::ScopeBegin, tok());
        assert!(verify_well_formed(&ir).is_err());
    }

    #[test]
    fn branch_to_missing_label_fails() {
        let mut ir = Ir::default();
        ir.push(IrOp::Branch(LabelId(0)), tok());
        assert!(verify_well_formed(&ir).is_err());
    }

    #[test]
    fn branch_to_defined_label_passes() {
        let mut ir = Ir::default();
        let l = ir.new_label();
        ir.push(IrOp::Branch(l), tok());
        ir.push(IrOp::Label(l), tok());
        assert!(verify_well_formed(&ir).is_ok());
    }
}
