use crate::parser::ast::Stmt;
use crate::span::Spanned;

/// Whether `body` returns a value on every path.
///
/// Structural and conservative: only the last statement counts, an IF needs
/// an ELSE and every arm returning, and loops never guarantee a return even
/// when their body does.
pub fn must_return(body: &[Spanned<Stmt>]) -> bool {
    let Some(last) = body.iter().rev().find(|s| !matches!(s.node, Stmt::Label(_))) else {
        return false;
    };
    match &last.node {
        Stmt::Return { value } => value.is_some(),
        Stmt::If { then_body, elseifs, else_body, .. } => {
            must_return(then_body)
                && elseifs.iter().all(|(_, body)| must_return(body))
                && else_body.as_deref().is_some_and(must_return)
        }
        Stmt::SelectCase { arms, else_body, .. } => {
            arms.iter().all(|arm| must_return(&arm.body)) && else_body.as_deref().is_some_and(must_return)
        }
        _ => false,
    }
}
