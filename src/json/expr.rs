//! Expression serialization
//!
//! Every expression becomes an object whose `"type"` names the construct.
//! A missing expression is written as `null`.

use crate::json::select::{write_select, write_window};
use crate::json::writer::JsonWriter;
use crate::parser::ast::{Expr, ExprList, FunctionCall, InRhs, Opcode};

/// Symbol of a binary operator, or `None` for opcodes outside the
/// supported set
pub fn binary_op_name(op: Opcode) -> Option<&'static str> {
    let name = match op {
        Opcode::AND => "AND",
        Opcode::OR => "OR",
        Opcode::LT => "<",
        Opcode::LE => "<=",
        Opcode::GT => ">",
        Opcode::GE => ">=",
        Opcode::EQ => "=",
        Opcode::NE => "!=",
        Opcode::IS => "IS",
        Opcode::ISNOT => "IS NOT",
        Opcode::PLUS => "+",
        Opcode::MINUS => "-",
        Opcode::STAR => "*",
        Opcode::SLASH => "/",
        Opcode::REM => "%",
        Opcode::BITAND => "&",
        Opcode::BITOR => "|",
        Opcode::LSHIFT => "<<",
        Opcode::RSHIFT => ">>",
        Opcode::CONCAT => "||",
        Opcode::LIKE_KW => "LIKE",
        Opcode::MATCH => "MATCH",
        _ => return None,
    };
    Some(name)
}

fn truth_test_name(negated: bool, value: bool) -> &'static str {
    match (negated, value) {
        (false, false) => "IS FALSE",
        (false, true) => "IS TRUE",
        (true, false) => "IS NOT FALSE",
        (true, true) => "IS NOT TRUE",
    }
}

pub fn write_expr(w: &mut JsonWriter, expr: Option<&Expr>) {
    let Some(expr) = expr else {
        w.null();
        return;
    };

    w.begin_object();
    match expr {
        Expr::Integer { text, value } => {
            w.key_string("type", Some("integer"));
            w.key("value");
            match value {
                Some(value) => w.number(i64::from(*value)),
                None => w.string(text),
            }
        }
        Expr::Float(text) => {
            w.key_string("type", Some("float"));
            w.key_string("value", Some(text));
        }
        Expr::String(text) => {
            w.key_string("type", Some("string"));
            w.key_string("value", Some(text));
        }
        Expr::Blob(text) => {
            w.key_string("type", Some("blob"));
            w.key_string("value", Some(text));
        }
        Expr::Null => {
            w.key_string("type", Some("null"));
        }
        Expr::Boolean(value) => {
            w.key_string("type", Some("boolean"));
            w.key_bool("value", *value);
        }
        Expr::Id(name) => {
            w.key_string("type", Some("name"));
            w.key_string("name", Some(name));
        }
        Expr::Dot { left, right } => {
            w.key_string("type", Some("dot"));
            w.key("left");
            write_expr(w, Some(left));
            w.key("right");
            write_expr(w, Some(right));
        }
        Expr::Asterisk => {
            w.key_string("type", Some("star"));
        }
        Expr::Variable(name) => {
            w.key_string("type", Some("parameter"));
            w.key_string("name", Some(name));
        }
        Expr::Cast { expr, type_name } => {
            w.key_string("type", Some("cast"));
            w.key("expr");
            write_expr(w, Some(expr));
            w.key_string("as", Some(type_name));
        }
        Expr::Case { operand, list } => {
            w.key_string("type", Some("case"));
            w.key("operand");
            write_expr(w, operand.as_deref());
            if let Some(list) = list {
                write_case_arms(w, list);
            }
        }
        Expr::Between { expr, low, high } => {
            w.key_string("type", Some("between"));
            w.key("expr");
            write_expr(w, Some(expr));
            w.key("low");
            write_expr(w, Some(low));
            w.key("high");
            write_expr(w, Some(high));
        }
        Expr::In { expr, rhs } => {
            w.key_string("type", Some("in"));
            w.key("expr");
            write_expr(w, Some(expr));
            match rhs {
                InRhs::Select(select) => {
                    w.key("select");
                    write_select(w, Some(select));
                }
                InRhs::List(list) => {
                    w.key("values");
                    write_expr_list(w, Some(list));
                }
            }
        }
        Expr::Exists(select) => {
            w.key_string("type", Some("exists"));
            w.key("select");
            write_select(w, Some(select));
        }
        Expr::Subquery(select) => {
            w.key_string("type", Some("subquery"));
            w.key("select");
            write_select(w, Some(select));
        }
        Expr::Collate { expr, collation } => {
            w.key_string("type", Some("collate"));
            w.key("expr");
            write_expr(w, Some(expr));
            w.key_string("collation", Some(collation));
        }
        Expr::Function(call) => write_function(w, call),
        Expr::Unary { op, operand } => {
            w.key_string("type", Some("unary"));
            w.key_string("op", Some(op.symbol()));
            w.key("operand");
            write_expr(w, Some(operand));
        }
        Expr::IsNull(operand) => {
            w.key_string("type", Some("isnull"));
            w.key("operand");
            write_expr(w, Some(operand));
        }
        Expr::NotNull(operand) => {
            w.key_string("type", Some("notnull"));
            w.key("operand");
            write_expr(w, Some(operand));
        }
        Expr::Truth {
            operand,
            negated,
            value,
        } => {
            w.key_string("type", Some("truth_test"));
            w.key_string("op", Some(truth_test_name(*negated, *value)));
            w.key("operand");
            write_expr(w, Some(operand));
        }
        Expr::Raise { action, message } => {
            w.key_string("type", Some("raise"));
            w.key_string("action", Some(action.as_str()));
            if let Some(message) = message {
                w.key_string("message", Some(message));
            }
        }
        Expr::Vector(list) => {
            w.key_string("type", Some("vector"));
            w.key("values");
            write_expr_list(w, Some(list));
        }
        Expr::Span { text, expr } => {
            w.key_string("type", Some("span"));
            w.key_string("text", Some(text));
            w.key("expr");
            write_expr(w, Some(expr));
        }
        Expr::Binary { op, left, right } => match binary_op_name(*op) {
            Some(symbol) => {
                w.key_string("type", Some("binary"));
                w.key_string("op", Some(symbol));
                w.key("left");
                write_expr(w, Some(left));
                w.key("right");
                write_expr(w, Some(right));
            }
            None => {
                w.key_string("type", Some("unknown"));
                w.key("op");
                w.number(i64::from(op.0));
            }
        },
    }
    w.end_object();
}

/// WHEN/THEN pairs from the flat list, then the trailing ELSE if any
fn write_case_arms(w: &mut JsonWriter, list: &ExprList) {
    w.key("when_clauses");
    w.begin_array();
    for pair in list.items.chunks_exact(2) {
        w.begin_object();
        w.key("when");
        write_expr(w, Some(&pair[0].expr));
        w.key("then");
        write_expr(w, Some(&pair[1].expr));
        w.end_object();
    }
    w.end_array();

    w.key("else");
    match list.items.chunks_exact(2).remainder() {
        [otherwise] => write_expr(w, Some(&otherwise.expr)),
        _ => w.null(),
    }
}

fn write_function(w: &mut JsonWriter, call: &FunctionCall) {
    w.key_string("type", Some("function"));
    w.key_string("name", Some(&call.name));

    w.key("args");
    match &call.args {
        Some(args) => write_expr_list(w, Some(args)),
        None => {
            w.begin_array();
            w.end_array();
        }
    }
    w.key_bool("distinct", call.distinct);

    if let Some(order_by) = &call.order_by {
        w.key("order_by");
        write_expr_list(w, Some(order_by));
    }
    if let Some(window) = &call.over {
        w.key("over");
        write_window(w, Some(window));
    }
    if let Some(filter) = &call.filter {
        w.key("filter");
        write_expr(w, Some(filter));
    }
}

/// Array of expressions; `null` when the list is absent
pub fn write_expr_list(w: &mut JsonWriter, list: Option<&ExprList>) {
    let Some(list) = list else {
        w.null();
        return;
    };

    w.begin_array();
    for item in list.iter() {
        write_expr(w, Some(&item.expr));
    }
    w.end_array();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{
        Expr, ExprList, FunctionCall, Opcode, RaiseAction, UnaryOp, Window, WindowFrame,
    };
    use serde_json::{json, Value};

    fn to_value(expr: Option<&Expr>) -> Value {
        let mut w = JsonWriter::new();
        write_expr(&mut w, expr);
        serde_json::from_str(&w.finish()).unwrap()
    }

    #[test]
    fn test_integer_literal() {
        assert_eq!(
            to_value(Some(&Expr::int(42))),
            json!({"type": "integer", "value": 42})
        );
        assert_eq!(
            to_value(Some(&Expr::integer("0x7fffffff"))),
            json!({"type": "integer", "value": 2147483647})
        );
        assert_eq!(
            to_value(Some(&Expr::integer("0x80000000"))),
            json!({"type": "integer", "value": "0x80000000"})
        );
        assert_eq!(
            to_value(Some(&Expr::integer("9223372036854775807"))),
            json!({"type": "integer", "value": "9223372036854775807"})
        );
    }

    #[test]
    fn test_missing_expression_is_null() {
        assert_eq!(to_value(None), Value::Null);
    }

    #[test]
    fn test_literals_and_names() {
        assert_eq!(
            to_value(Some(&Expr::Blob("X'00'".to_string()))),
            json!({"type": "blob", "value": "X'00'"})
        );
        assert_eq!(to_value(Some(&Expr::Null)), json!({"type": "null"}));
        assert_eq!(
            to_value(Some(&Expr::Boolean(true))),
            json!({"type": "boolean", "value": true})
        );
        assert_eq!(
            to_value(Some(&Expr::Variable("?1".to_string()))),
            json!({"type": "parameter", "name": "?1"})
        );
        assert_eq!(
            to_value(Some(&Expr::Dot {
                left: Box::new(Expr::id("t")),
                right: Box::new(Expr::Asterisk),
            })),
            json!({"type": "dot", "left": {"type": "name", "name": "t"}, "right": {"type": "star"}})
        );
    }

    #[test]
    fn test_case_arms() {
        let list = ExprList::from_exprs([Expr::int(1), Expr::string("a"), Expr::string("b")]);
        let value = to_value(Some(&Expr::Case {
            operand: None,
            list: Some(list),
        }));
        assert_eq!(value["operand"], Value::Null);
        assert_eq!(value["when_clauses"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["when_clauses"][0]["then"]["value"], "a");
        assert_eq!(value["else"]["value"], "b");

        let list = ExprList::from_exprs([Expr::int(1), Expr::int(2)]);
        let value = to_value(Some(&Expr::Case {
            operand: Some(Box::new(Expr::id("x"))),
            list: Some(list),
        }));
        assert_eq!(value["operand"]["name"], "x");
        assert_eq!(value["else"], Value::Null);
    }

    #[test]
    fn test_function_call_shapes() {
        let value = to_value(Some(&Expr::Function(Box::new(FunctionCall::new(
            "count", None,
        )))));
        assert_eq!(
            value,
            json!({"type": "function", "name": "count", "args": [], "distinct": false})
        );

        let mut call = FunctionCall::new("sum", Some(ExprList::from_exprs([Expr::id("x")])));
        call.over = Some(Box::new(Window {
            frame: Some(WindowFrame::implicit()),
            ..Window::default()
        }));
        let value = to_value(Some(&Expr::Function(Box::new(call))));
        assert_eq!(value["args"][0]["name"], "x");
        assert_eq!(value["over"]["name"], Value::Null);
        assert_eq!(value["over"]["frame"]["type"], "RANGE");
        assert!(value.get("filter").is_none());

        let mut call = FunctionCall::new("count", Some(ExprList::from_exprs([Expr::id("x")])));
        call.filter = Some(Box::new(Expr::Boolean(true)));
        let value = to_value(Some(&Expr::Function(Box::new(call))));
        assert_eq!(value["filter"]["type"], "boolean");
        assert!(value.get("over").is_none());
    }

    #[test]
    fn test_operators() {
        let value = to_value(Some(&Expr::binary(
            Opcode::ISNOT,
            Expr::id("a"),
            Expr::int(1),
        )));
        assert_eq!(value["type"], "binary");
        assert_eq!(value["op"], "IS NOT");

        let value = to_value(Some(&Expr::unary(UnaryOp::Not, Expr::id("a"))));
        assert_eq!(value, json!({"type": "unary", "op": "NOT", "operand": {"type": "name", "name": "a"}}));

        let value = to_value(Some(&Expr::Truth {
            operand: Box::new(Expr::id("a")),
            negated: true,
            value: false,
        }));
        assert_eq!(value["op"], "IS NOT FALSE");
    }

    #[test]
    fn test_unknown_operator_degrades() {
        let value = to_value(Some(&Expr::binary(Opcode::PTR, Expr::id("a"), Expr::id("b"))));
        assert_eq!(value, json!({"type": "unknown", "op": 112}));

        // the rest of the document is still written
        let list = ExprList::from_exprs([
            Expr::binary(Opcode(250), Expr::int(1), Expr::int(2)),
            Expr::int(3),
        ]);
        let mut w = JsonWriter::new();
        write_expr_list(&mut w, Some(&list));
        let value: Value = serde_json::from_str(&w.finish()).unwrap();
        assert_eq!(value, json!([{"type": "unknown", "op": 250}, {"type": "integer", "value": 3}]));
    }

    #[test]
    fn test_raise_and_span() {
        let value = to_value(Some(&Expr::Raise {
            action: RaiseAction::Ignore,
            message: None,
        }));
        assert_eq!(value, json!({"type": "raise", "action": "IGNORE"}));

        let value = to_value(Some(&Expr::Span {
            text: "a+1".to_string(),
            expr: Box::new(Expr::id("a")),
        }));
        assert_eq!(value["type"], "span");
        assert_eq!(value["text"], "a+1");
    }

    #[test]
    fn test_expr_list_absent_and_empty() {
        let mut w = JsonWriter::new();
        write_expr_list(&mut w, None);
        assert_eq!(w.finish(), "\nnull");

        let mut w = JsonWriter::new();
        write_expr_list(&mut w, Some(&ExprList::new()));
        assert_eq!(w.finish(), "\n[\n]");
    }
}
