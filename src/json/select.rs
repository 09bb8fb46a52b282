//! SELECT, clause and list serialization

use tracing::{debug, warn};

use crate::error::Result;
use crate::json::expr::{write_expr, write_expr_list};
use crate::json::writer::JsonWriter;
use crate::parser::ast::{
    CompoundOp, ExprList, FrameBound, JoinConstraint, JoinFlags, Limit, Materialized, Select,
    SelectFlags, SrcList, TableSource, Window, WindowFrame, With,
};

// ============================================================================
// SELECT
// ============================================================================

pub fn write_select(w: &mut JsonWriter, select: Option<&Select>) {
    match select {
        None => w.null(),
        Some(select) if select.is_compound() => write_compound(w, select),
        Some(select) => write_simple(w, select),
    }
}

fn write_simple(w: &mut JsonWriter, select: &Select) {
    w.begin_object();
    w.key_string("type", Some("select"));
    w.key_bool("distinct", select.flags.contains(SelectFlags::DISTINCT));
    w.key_bool("all", select.flags.contains(SelectFlags::ALL));

    if let Some(with) = &select.with {
        w.key("with");
        write_with(w, Some(with));
    }

    write_branch_body(w, select);

    // SQLite links WINDOW definitions newest first
    if !select.window_defs.is_empty() {
        w.key("window_definitions");
        w.begin_array();
        for window in select.window_defs.iter().rev() {
            write_window(w, Some(window));
        }
        w.end_array();
    }

    w.key("order_by");
    write_order_by(w, select.order_by.as_ref());
    write_limit(w, select.limit.as_ref());
    w.end_object();
}

/// A compound select is written left to right; ORDER BY and LIMIT belong
/// to the whole chain and come from the root.
fn write_compound(w: &mut JsonWriter, root: &Select) {
    let branches = match linearize(root) {
        Ok(branches) => branches,
        Err(err) => {
            warn!(%err, "cannot order compound select branches");
            w.null();
            return;
        }
    };
    debug!(branches = branches.len(), "writing compound select");

    w.begin_object();
    w.key_string("type", Some("compound"));
    w.key("body");
    w.begin_array();
    for (i, branch) in branches.iter().enumerate() {
        w.begin_object();
        if i > 0 {
            let op = branch.op.unwrap_or(CompoundOp::Union);
            w.key_string("operator", Some(op.as_str()));
        }
        w.key("select");
        w.begin_object();
        w.key_string("type", Some("select"));
        w.key_bool("distinct", branch.flags.contains(SelectFlags::DISTINCT));
        w.key_bool("all", branch.flags.contains(SelectFlags::ALL));
        write_branch_body(w, branch);
        w.end_object();
        w.end_object();
    }
    w.end_array();

    w.key("order_by");
    write_order_by(w, root.order_by.as_ref());
    write_limit(w, root.limit.as_ref());
    w.end_object();
}

/// Branches of a compound chain, leftmost first
fn linearize(root: &Select) -> Result<Vec<&Select>> {
    let mut branches = Vec::new();
    branches.try_reserve_exact(root.branch_count())?;

    let mut cur = Some(root);
    while let Some(select) = cur {
        branches.push(select);
        cur = select.prior.as_deref();
    }
    branches.reverse();
    Ok(branches)
}

fn write_branch_body(w: &mut JsonWriter, select: &Select) {
    w.key("columns");
    write_result_columns(w, Some(&select.columns));
    w.key("from");
    write_src_list(w, Some(&select.from));
    w.key("where");
    write_expr(w, select.where_clause.as_deref());
    w.key("group_by");
    write_expr_list(w, select.group_by.as_ref());
    w.key("having");
    write_expr(w, select.having.as_deref());
}

fn write_limit(w: &mut JsonWriter, limit: Option<&Limit>) {
    match limit {
        Some(limit) => {
            w.key("limit");
            write_expr(w, Some(&limit.limit));
            w.key("offset");
            write_expr(w, limit.offset.as_deref());
        }
        None => w.key_null("limit"),
    }
}

// ============================================================================
// Lists
// ============================================================================

/// Result columns as `{expr, alias}`; `alias` is only an explicit name
pub fn write_result_columns(w: &mut JsonWriter, list: Option<&ExprList>) {
    let Some(list) = list else {
        w.null();
        return;
    };

    w.begin_array();
    for item in list.iter() {
        w.begin_object();
        w.key("expr");
        write_expr(w, Some(&item.expr));
        w.key_string("alias", item.alias());
        w.end_object();
    }
    w.end_array();
}

/// Ordering terms as `{expr, direction, nulls?}`
pub fn write_order_by(w: &mut JsonWriter, list: Option<&ExprList>) {
    let Some(list) = list else {
        w.null();
        return;
    };

    w.begin_array();
    for item in list.iter() {
        w.begin_object();
        w.key("expr");
        write_expr(w, Some(&item.expr));
        w.key_string("direction", Some(item.order.as_str()));
        if let Some(nulls) = item.nulls {
            w.key_string("nulls", Some(nulls.as_str()));
        }
        w.end_object();
    }
    w.end_array();
}

pub fn write_id_list(w: &mut JsonWriter, names: Option<&[String]>) {
    let Some(names) = names else {
        w.null();
        return;
    };

    w.begin_array();
    for name in names {
        w.string(name);
    }
    w.end_array();
}

// ============================================================================
// FROM
// ============================================================================

/// Display name of a join; `None` for a comma join
pub fn join_type_name(flags: JoinFlags) -> Option<&'static str> {
    let natural = flags.contains(JoinFlags::NATURAL);

    if flags.contains(JoinFlags::LEFT | JoinFlags::RIGHT) {
        Some(if natural {
            "NATURAL FULL OUTER JOIN"
        } else {
            "FULL OUTER JOIN"
        })
    } else if flags.contains(JoinFlags::LEFT) {
        Some(if natural { "NATURAL LEFT JOIN" } else { "LEFT JOIN" })
    } else if flags.contains(JoinFlags::RIGHT) {
        Some(if natural { "NATURAL RIGHT JOIN" } else { "RIGHT JOIN" })
    } else if flags.contains(JoinFlags::CROSS) {
        Some("CROSS JOIN")
    } else if natural {
        Some("NATURAL JOIN")
    } else if flags.contains(JoinFlags::INNER) {
        Some("JOIN")
    } else {
        None
    }
}

/// FROM items; `null` when there are none
pub fn write_src_list(w: &mut JsonWriter, from: Option<&SrcList>) {
    let Some(from) = from.filter(|from| !from.is_empty()) else {
        w.null();
        return;
    };

    w.begin_array();
    for item in &from.items {
        w.begin_object();
        match &item.source {
            TableSource::Table(name) => {
                w.key_string("type", Some("table"));
                w.key_string("name", Some(&name.name));
                if let Some(schema) = &name.schema {
                    w.key_string("schema", Some(schema));
                }
            }
            TableSource::Subquery(select) => {
                w.key_string("type", Some("subquery"));
                w.key("select");
                write_select(w, Some(select));
            }
        }

        w.key_string("alias", item.alias.as_deref());
        w.key_string("join_type", join_type_name(item.join_type));

        match &item.constraint {
            Some(JoinConstraint::On(expr)) => {
                w.key("on");
                write_expr(w, Some(expr));
            }
            Some(JoinConstraint::Using(columns)) => {
                w.key("using");
                write_id_list(w, Some(columns));
            }
            None => {}
        }

        if let Some(args) = &item.func_args {
            w.key("args");
            write_expr_list(w, Some(args));
        }
        w.end_object();
    }
    w.end_array();
}

// ============================================================================
// WITH
// ============================================================================

pub fn write_with(w: &mut JsonWriter, with: Option<&With>) {
    let Some(with) = with else {
        w.null();
        return;
    };

    w.begin_array();
    for cte in &with.ctes {
        w.begin_object();
        w.key_string("name", Some(&cte.name));

        if let Some(columns) = cte.columns.as_deref().filter(|c| !c.is_empty()) {
            w.key("columns");
            write_id_list(w, Some(columns));
        }

        match cte.materialized {
            Materialized::Yes => w.key_string("materialized", Some("MATERIALIZED")),
            Materialized::No => w.key_string("materialized", Some("NOT MATERIALIZED")),
            Materialized::Any => {}
        }

        w.key("select");
        write_select(w, Some(&cte.select));
        w.end_object();
    }
    w.end_array();
}

// ============================================================================
// Windows
// ============================================================================

pub fn write_window(w: &mut JsonWriter, window: Option<&Window>) {
    let Some(window) = window else {
        w.null();
        return;
    };

    w.begin_object();
    w.key_string("name", window.name.as_deref());
    w.key_string("base", window.base.as_deref());

    if let Some(partition_by) = &window.partition_by {
        w.key("partition_by");
        write_expr_list(w, Some(partition_by));
    }
    if let Some(order_by) = &window.order_by {
        w.key("order_by");
        write_order_by(w, Some(order_by));
    }
    if let Some(frame) = &window.frame {
        w.key("frame");
        write_frame(w, frame);
    }
    if let Some(filter) = &window.filter {
        w.key("filter");
        write_expr(w, Some(filter));
    }
    w.end_object();
}

fn write_frame(w: &mut JsonWriter, frame: &WindowFrame) {
    w.begin_object();
    w.key_string("type", Some(frame.mode.as_str()));
    w.key("start");
    write_bound(w, &frame.start);
    w.key("end");
    write_bound(w, &frame.end);
    if let Some(exclude) = frame.exclude {
        w.key_string("exclude", Some(exclude.as_str()));
    }
    w.end_object();
}

fn write_bound(w: &mut JsonWriter, bound: &FrameBound) {
    w.begin_object();
    w.key_string("type", Some(bound.kind.as_str()));
    if let Some(expr) = &bound.expr {
        w.key("expr");
        write_expr(w, Some(expr));
    }
    w.end_object();
}
