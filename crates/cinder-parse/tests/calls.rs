use cinder_ast::ast::{BlockItem, Expr, Item, Stmt};
use cinder_parse::{parse_str, ParseError};

fn ret(src: &str) -> Expr {
    let program = parse_str("<mem>", &format!("int main() {{ return {src}; }}")).expect("parse ok");
    let Item::Function(f) = &program.items[0] else {
        panic!("expected function");
    };
    let BlockItem::Stmt(Stmt::Return(Some(e))) = &f.body[0] else {
        panic!("expected return");
    };
    e.clone()
}

#[test]
fn call_binds_tighter_than_infix() {
    // f(1) + 2
    match ret("f(1) + 2") {
        Expr::Binary { lhs, .. } => assert!(matches!(*lhs, Expr::Call { .. })),
        other => panic!("expected binary, got {other:?}"),
    }
    // f((1 + 2))
    match ret("f(1 + 2)") {
        Expr::Call { args, .. } => assert!(matches!(args[0], Expr::Binary { .. })),
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn nested_calls() {
    let Expr::Call { name, args } = ret("f(g(1), h(2, 3), 4)") else {
        panic!("expected call");
    };
    assert_eq!(name, "f");
    assert_eq!(args.len(), 3);
    assert!(matches!(&args[0], Expr::Call { name, .. } if name == "g"));
    assert!(matches!(&args[1], Expr::Call { args, .. } if args.len() == 2));
}

#[test]
fn call_without_arguments() {
    assert_eq!(
        ret("f()"),
        Expr::Call {
            name: "f".into(),
            args: vec![]
        }
    );
}

#[test]
fn four_arguments_are_rejected() {
    let err = parse_str("<mem>", "int main() { return f(1, 2, 3, 4); }").unwrap_err();
    assert_eq!(
        err,
        ParseError::TooManyArguments {
            function: "f".into(),
            count: 4
        }
    );
}

#[test]
fn four_parameters_are_rejected() {
    let err = parse_str("<mem>", "int f(int a, int b, int c, int d) { return a; }").unwrap_err();
    assert!(matches!(err, ParseError::TooManyParameters { count: 4, .. }));
}
