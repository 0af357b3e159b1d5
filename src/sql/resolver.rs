//! Name resolution against the catalog
//!
//! The resolver turns a parsed SELECT into a resolved tree:
//! - Table and view names to their schemas (views and subqueries recursively)
//! - Column names to positions in the combined FROM row, with type and mode
//! - Function and operator names to library entries, with argument checks
//! - SELECT list expansion and output column naming
//!
//! Grouping validation is delegated to the type checker.

use std::collections::HashSet;

use crate::catalog::{Catalog, ColumnDef, DataType, Mode, Schema, View};
use crate::functions::{self, FunctionRef, ScalarFunction};
use crate::sql::ast::*;
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::typecheck::TypeChecker;

/// Name resolver
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    /// Views currently being expanded, outermost first
    views: Vec<String>,
}

impl<'a> Resolver<'a> {
    /// Create a new resolver
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            views: Vec::new(),
        }
    }

    /// Resolve a SELECT statement
    pub fn resolve_select(&self, select: &SelectStatement) -> SqlResult<ResolvedSelect> {
        let (from, scope) = match &select.from {
            Some(table_expr) => {
                let (resolved, scope) = self.resolve_table_expr(table_expr)?;
                (Some(resolved), scope)
            }
            None => (None, Scope::default()),
        };
        let qualify_star = matches!(from, Some(ResolvedTableExpr::Join { .. }));

        let filter = select
            .filter
            .as_ref()
            .map(|f| self.resolve_labeled(f, &ExprScope::new(&scope, Clause::Where)))
            .transpose()?;
        if let Some(filter) = &filter {
            TypeChecker::check_predicate(filter)?;
        }

        let columns = self.resolve_select_list(&select.columns, &scope, qualify_star)?;
        let keys = self.resolve_group_by(&select.group_by, &columns, &scope)?;

        let having = select
            .having
            .as_ref()
            .map(|h| self.resolve_labeled(h, &ExprScope::with_aliases(&scope, Clause::Having, &columns)))
            .transpose()?;
        if let Some(having) = &having {
            TypeChecker::check_predicate(having)?;
        }

        let order_env = ExprScope::with_aliases(&scope, Clause::OrderBy, &columns);
        let mut order_by = Vec::new();
        for item in &select.order_by {
            order_by.push(ResolvedOrderByItem {
                expr: self.resolve_labeled(&item.expr, &order_env)?,
                ascending: item.ascending,
            });
        }

        let grouped = !select.group_by.is_empty()
            || columns.iter().any(|c| c.expr.contains_aggregate())
            || having.as_ref().is_some_and(|h| h.expr.contains_aggregate())
            || order_by.iter().any(|o| o.expr.expr.contains_aggregate());

        let schema = Schema::from_columns(
            columns
                .iter()
                .map(|c| ColumnDef::new(c.name.clone(), c.expr.data_type()).mode(c.expr.mode()))
                .collect(),
        )
        .map_err(|e| SqlError::DuplicateAlias(e.to_string()))?;

        let mut resolved = ResolvedSelect {
            distinct: select.distinct,
            columns,
            from,
            filter,
            grouping: grouped.then_some(keys),
            having,
            order_by,
            limit: select.limit,
            offset: select.offset,
            schema,
        };
        if resolved.grouping.is_some() {
            TypeChecker::bind_grouped(&mut resolved)?;
        }
        Ok(resolved)
    }

    // ============ FROM ============

    fn resolve_table_expr(&self, table_expr: &TableExpr) -> SqlResult<(ResolvedTableExpr, Scope)> {
        match table_expr {
            TableExpr::Table { name, alias } => {
                let qualifier = alias.as_deref().unwrap_or(name);
                if let Ok(table) = self.catalog.get_table(name) {
                    let scope = Scope::from_schema(Some(qualifier), table.schema());
                    return Ok((
                        ResolvedTableExpr::Table {
                            name: name.clone(),
                            schema: table.schema().clone(),
                        },
                        scope,
                    ));
                }
                let view = self
                    .catalog
                    .get_view(name)
                    .ok_or_else(|| SqlError::UnknownTable(name.clone()))?;
                let select = self.resolve_view(view)?;
                let scope = Scope::from_schema(Some(qualifier), &select.schema);
                Ok((ResolvedTableExpr::Subquery(Box::new(select)), scope))
            }
            TableExpr::Subquery { query, alias } => {
                let select = self.resolve_select(query)?;
                let scope = Scope::from_schema(alias.as_deref(), &select.schema);
                Ok((ResolvedTableExpr::Subquery(Box::new(select)), scope))
            }
            TableExpr::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                let (left, mut scope) = self.resolve_table_expr(left)?;
                let (right, mut right_scope) = self.resolve_table_expr(right)?;

                let left_quals = scope.qualifiers();
                if let Some(dup) = right_scope.qualifiers().into_iter().find(|q| left_quals.contains(q)) {
                    return Err(SqlError::DuplicateAlias(dup));
                }

                // Every right-side column may be absent, whatever its source mode
                if *join_type == JoinType::LeftOuter {
                    for col in &mut right_scope.columns {
                        col.mode = Mode::Nullable;
                    }
                }
                let left_width = scope.columns.len();
                let right_width = right_scope.columns.len();
                scope.columns.append(&mut right_scope.columns);

                let condition = match (join_type, condition) {
                    (JoinType::Cross, None) => None,
                    (JoinType::Cross, Some(_)) => {
                        return Err(SqlError::InvalidJoin("CROSS JOIN takes no ON clause".into()))
                    }
                    (_, None) => {
                        return Err(SqlError::InvalidJoin("JOIN requires an ON clause".into()))
                    }
                    (_, Some(cond)) => {
                        let cond = self.resolve_labeled(cond, &ExprScope::new(&scope, Clause::JoinOn))?;
                        TypeChecker::check_predicate(&cond)?;
                        Some(cond)
                    }
                };

                Ok((
                    ResolvedTableExpr::Join {
                        left: Box::new(left),
                        right: Box::new(right),
                        join_type: *join_type,
                        condition,
                        left_width,
                        right_width,
                    },
                    scope,
                ))
            }
        }
    }

    /// Expand a view as a subquery, refusing cycles
    fn resolve_view(&self, view: &View) -> SqlResult<ResolvedSelect> {
        let name = view.name().to_string();
        if self.views.contains(&name) {
            let mut chain = self.views.clone();
            chain.push(name.clone());
            return Err(SqlError::InvalidView {
                name,
                reason: format!("cyclic reference {}", chain.join(" -> ")),
            });
        }
        let ast = crate::sql::parse(view.query()).map_err(|e| SqlError::InvalidView {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let mut views = self.views.clone();
        views.push(name);
        Resolver {
            catalog: self.catalog,
            views,
        }
        .resolve_select(&ast)
    }

    // ============ SELECT list ============

    fn resolve_select_list(
        &self,
        items: &[SelectItem],
        scope: &Scope,
        qualify_star: bool,
    ) -> SqlResult<Vec<ResolvedSelectItem>> {
        // Explicit aliases claim their names before any natural name
        let mut taken = HashSet::new();
        for item in items {
            if let SelectItem::Expr {
                alias: Some(alias), ..
            } = item
            {
                if !taken.insert(alias.clone()) {
                    return Err(SqlError::DuplicateAlias(alias.clone()));
                }
            }
        }

        let env = ExprScope::new(scope, Clause::Select);
        let mut expanded: Vec<(ResolvedExpr, Option<String>, Option<String>, String)> = Vec::new();
        for item in items {
            match item {
                SelectItem::Expr { expr, alias } => {
                    let natural = match expr {
                        Expr::Column(name) => Some(name.clone()),
                        _ => None,
                    };
                    let resolved = self.resolve_expr(expr, &env)?;
                    expanded.push((resolved, alias.clone(), natural, expr.to_string()));
                }
                SelectItem::Wildcard => {
                    if scope.columns.is_empty() {
                        return Err(SqlError::Unsupported("SELECT * requires a FROM clause".into()));
                    }
                    for index in 0..scope.columns.len() {
                        let name = scope.display_name(index, qualify_star);
                        expanded.push((scope.column_expr(index), None, Some(name.clone()), name));
                    }
                }
                SelectItem::QualifiedWildcard(qualifier) => {
                    let indices: Vec<usize> = (0..scope.columns.len())
                        .filter(|i| scope.columns[*i].qualifier.as_deref() == Some(qualifier.as_str()))
                        .collect();
                    if indices.is_empty() {
                        return Err(SqlError::UnknownTable(qualifier.clone()));
                    }
                    for index in indices {
                        let name = scope.columns[index].name.clone();
                        let text = scope.display_name(index, true);
                        expanded.push((scope.column_expr(index), None, Some(name), text));
                    }
                }
            }
        }

        let mut synthetic = 0;
        let mut columns = Vec::with_capacity(expanded.len());
        for (expr, alias, natural, text) in expanded {
            let name = match (alias, natural) {
                (Some(alias), _) => alias,
                (None, Some(natural)) if !taken.contains(&natural) => natural,
                _ => loop {
                    let candidate = format!("f{}_", synthetic);
                    synthetic += 1;
                    if !taken.contains(&candidate) {
                        break candidate;
                    }
                },
            };
            taken.insert(name.clone());
            columns.push(ResolvedSelectItem { expr, name, text });
        }
        Ok(columns)
    }

    // ============ GROUP BY ============

    fn resolve_group_by(
        &self,
        items: &[Expr],
        columns: &[ResolvedSelectItem],
        scope: &Scope,
    ) -> SqlResult<Vec<LabeledExpr>> {
        let env = ExprScope::new(scope, Clause::GroupBy);
        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            let selected = match item {
                Expr::Column(name) => columns.iter().find(|c| &c.name == name),
                Expr::Literal(Literal::Integer(position)) => {
                    let found = usize::try_from(*position)
                        .ok()
                        .and_then(|p| p.checked_sub(1))
                        .and_then(|i| columns.get(i));
                    match found {
                        Some(column) => Some(column),
                        None => {
                            return Err(SqlError::InvalidGroupBy(format!(
                                "position {} is not in the select list",
                                position
                            )))
                        }
                    }
                }
                _ => None,
            };

            let key = match selected {
                Some(column) => {
                    if column.expr.contains_aggregate() {
                        return Err(SqlError::InvalidGroupBy(format!(
                            "cannot group by aggregate '{}'",
                            column.text
                        )));
                    }
                    LabeledExpr {
                        expr: column.expr.clone(),
                        text: column.text.clone(),
                    }
                }
                None => self.resolve_labeled(item, &env)?,
            };
            if key.expr.mode() == Mode::Repeated {
                return Err(SqlError::InvalidGroupBy(format!(
                    "cannot group by REPEATED '{}'",
                    key.text
                )));
            }
            keys.push(key);
        }
        Ok(keys)
    }

    // ============ Expressions ============

    fn resolve_labeled(&self, expr: &Expr, env: &ExprScope<'_>) -> SqlResult<LabeledExpr> {
        Ok(LabeledExpr {
            expr: self.resolve_expr(expr, env)?,
            text: expr.to_string(),
        })
    }

    /// Resolve expression
    fn resolve_expr(&self, expr: &Expr, env: &ExprScope<'_>) -> SqlResult<ResolvedExpr> {
        match expr {
            Expr::Column(name) => {
                if let Some(item) = env.aliases.iter().find(|item| &item.name == name) {
                    return Ok(item.expr.clone());
                }
                env.scope.resolve_column(name)
            }
            Expr::Literal(lit) => Ok(ResolvedExpr::Literal {
                value: lit.to_value(),
                data_type: lit.data_type(),
            }),
            Expr::BinaryOp { left, op, right } => {
                let function = functions::get_binary_operator(*op)
                    .ok_or_else(|| SqlError::UnknownFunction(op.symbol().to_string()))?;
                let args = vec![self.resolve_expr(left, env)?, self.resolve_expr(right, env)?];
                Self::resolve_call(function, args, expr)
            }
            Expr::UnaryOp { op, expr: operand } => {
                let function = functions::get_unary_operator(*op)
                    .ok_or_else(|| SqlError::UnknownFunction(format!("{:?}", op)))?;
                let args = vec![self.resolve_expr(operand, env)?];
                Self::resolve_call(function, args, expr)
            }
            Expr::Function { name, args } => self.resolve_function(name, args, expr, env),
            Expr::InList {
                expr: needle,
                list,
                negated,
            } => {
                let mut args = Vec::with_capacity(list.len() + 1);
                args.push((**needle).clone());
                args.extend(list.iter().cloned());
                let call = Expr::Function {
                    name: "in".to_string(),
                    args,
                };
                self.resolve_expr(&negate_if(call, *negated), env)
            }
            Expr::Between {
                expr: value,
                low,
                high,
                negated,
            } => {
                let range = Expr::binary(
                    Expr::binary((**value).clone(), BinaryOp::GtEq, (**low).clone()),
                    BinaryOp::And,
                    Expr::binary((**value).clone(), BinaryOp::LtEq, (**high).clone()),
                );
                self.resolve_expr(&negate_if(range, *negated), env)
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => self.resolve_expr(&case_to_if(operand.as_deref(), branches, else_result.as_deref()), env),
        }
    }

    fn resolve_function(
        &self,
        name: &str,
        args: &[Expr],
        expr: &Expr,
        env: &ExprScope<'_>,
    ) -> SqlResult<ResolvedExpr> {
        match functions::get_function(name) {
            None => Err(SqlError::UnknownFunction(name.to_uppercase())),
            Some(FunctionRef::Scalar(function)) => {
                let mut resolved = Vec::with_capacity(args.len());
                for arg in args {
                    resolved.push(self.resolve_expr(arg, env)?);
                }
                Self::resolve_call(function, resolved, expr)
            }
            Some(FunctionRef::Aggregate(function)) => {
                if !env.clause.allows_aggregates() {
                    return Err(SqlError::AggregateNotAllowed {
                        expr: expr.to_string(),
                        clause: env.clause.name(),
                    });
                }
                let signature = function.signature();
                check_arity(signature, args.len())?;

                let inner = env.nested(Clause::AggregateArg);
                let mut resolved = Vec::with_capacity(args.len());
                for arg in args {
                    resolved.push(self.resolve_expr(arg, &inner)?);
                }
                check_literals(signature, &resolved, expr)?;

                let types: Vec<DataType> = resolved.iter().map(|a| a.data_type()).collect();
                let data_type = function
                    .check_types(&types)
                    .map_err(|message| SqlError::TypeMismatch {
                        expr: expr.to_string(),
                        message,
                    })?;
                Ok(ResolvedExpr::Aggregate {
                    function,
                    args: resolved,
                    data_type,
                    mode: function.result_mode(),
                })
            }
        }
    }

    /// Bind a scalar function or operator to resolved arguments
    fn resolve_call(
        function: &'static dyn ScalarFunction,
        args: Vec<ResolvedExpr>,
        expr: &Expr,
    ) -> SqlResult<ResolvedExpr> {
        let signature = function.signature();
        check_arity(signature, args.len())?;
        check_literals(signature, &args, expr)?;

        let types: Vec<DataType> = args.iter().map(|a| a.data_type()).collect();
        let data_type = function
            .check_types(&types)
            .map_err(|message| SqlError::TypeMismatch {
                expr: expr.to_string(),
                message,
            })?;
        let modes: Vec<Mode> = args.iter().map(|a| a.mode()).collect();
        Ok(ResolvedExpr::Call {
            function,
            mode: function.result_mode(&modes),
            args,
            data_type,
        })
    }
}

fn check_arity(signature: &functions::FunctionSignature, found: usize) -> SqlResult<()> {
    if signature.accepts(found) {
        Ok(())
    } else {
        Err(SqlError::BadArity {
            function: signature.name.to_uppercase(),
            expected: signature.arity(),
            found,
        })
    }
}

fn check_literals(
    signature: &functions::FunctionSignature,
    args: &[ResolvedExpr],
    expr: &Expr,
) -> SqlResult<()> {
    for &position in signature.literal_args {
        if let Some(arg) = args.get(position) {
            if !matches!(arg, ResolvedExpr::Literal { .. }) {
                return Err(SqlError::TypeMismatch {
                    expr: expr.to_string(),
                    message: format!("argument {} must be a literal", position + 1),
                });
            }
        }
    }
    Ok(())
}

fn negate_if(expr: Expr, negated: bool) -> Expr {
    if negated {
        Expr::unary(UnaryOp::Not, expr)
    } else {
        expr
    }
}

/// CASE compiles to nested IF calls, last branch innermost
fn case_to_if(operand: Option<&Expr>, branches: &[(Expr, Expr)], else_result: Option<&Expr>) -> Expr {
    let mut result = else_result
        .cloned()
        .unwrap_or(Expr::Literal(Literal::Null));
    for (when, then) in branches.iter().rev() {
        let condition = match operand {
            Some(operand) => Expr::binary(operand.clone(), BinaryOp::Eq, when.clone()),
            None => when.clone(),
        };
        result = Expr::Function {
            name: "if".to_string(),
            args: vec![condition, then.clone(), result],
        };
    }
    result
}

/// Clause an expression appears in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Select,
    Where,
    JoinOn,
    GroupBy,
    Having,
    OrderBy,
    AggregateArg,
}

impl Clause {
    fn name(self) -> &'static str {
        match self {
            Clause::Select => "SELECT",
            Clause::Where => "WHERE",
            Clause::JoinOn => "JOIN ON",
            Clause::GroupBy => "GROUP BY",
            Clause::Having => "HAVING",
            Clause::OrderBy => "ORDER BY",
            Clause::AggregateArg => "aggregate argument",
        }
    }

    fn allows_aggregates(self) -> bool {
        matches!(self, Clause::Select | Clause::Having | Clause::OrderBy)
    }
}

/// What an expression can see
struct ExprScope<'s> {
    scope: &'s Scope,
    clause: Clause,
    /// Select items visible by output name (HAVING and ORDER BY)
    aliases: &'s [ResolvedSelectItem],
}

impl<'s> ExprScope<'s> {
    fn new(scope: &'s Scope, clause: Clause) -> Self {
        Self {
            scope,
            clause,
            aliases: &[],
        }
    }

    fn with_aliases(scope: &'s Scope, clause: Clause, aliases: &'s [ResolvedSelectItem]) -> Self {
        Self {
            scope,
            clause,
            aliases,
        }
    }

    /// Scope for the arguments of an aggregate: FROM columns only
    fn nested(&self, clause: Clause) -> ExprScope<'s> {
        ExprScope::new(self.scope, clause)
    }
}

/// Scope for name resolution: the columns of the FROM row, in order
#[derive(Debug, Default)]
struct Scope {
    columns: Vec<ScopeColumn>,
}

#[derive(Debug, Clone)]
struct ScopeColumn {
    /// Table name or alias the column is visible under
    qualifier: Option<String>,
    name: String,
    data_type: DataType,
    mode: Mode,
}

impl Scope {
    fn from_schema(qualifier: Option<&str>, schema: &Schema) -> Self {
        Self {
            columns: schema
                .columns()
                .iter()
                .map(|c| ScopeColumn {
                    qualifier: qualifier.map(str::to_string),
                    name: c.name.clone(),
                    data_type: c.data_type,
                    mode: c.mode,
                })
                .collect(),
        }
    }

    /// Distinct qualifiers, in column order
    fn qualifiers(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for q in self.columns.iter().filter_map(|c| c.qualifier.as_ref()) {
            if !seen.contains(q) {
                seen.push(q.clone());
            }
        }
        seen
    }

    fn display_name(&self, index: usize, qualified: bool) -> String {
        let col = &self.columns[index];
        match (&col.qualifier, qualified) {
            (Some(q), true) => format!("{}.{}", q, col.name),
            _ => col.name.clone(),
        }
    }

    fn column_expr(&self, index: usize) -> ResolvedExpr {
        let col = &self.columns[index];
        ResolvedExpr::Column(ResolvedColumn {
            table: col.qualifier.clone(),
            name: col.name.clone(),
            index,
            data_type: col.data_type,
            mode: col.mode,
        })
    }

    /// Resolve a possibly qualified column name
    ///
    /// `a.b.c` matches a column named `a.b.c`, a column `b.c` under
    /// qualifier `a`, or a column `c` under qualifier `a.b`.
    fn resolve_column(&self, name: &str) -> SqlResult<ResolvedExpr> {
        let matches: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, col)| {
                col.name == name
                    || name.match_indices('.').any(|(dot, _)| {
                        col.qualifier.as_deref() == Some(&name[..dot]) && col.name == name[dot + 1..]
                    })
            })
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [index] => Ok(self.column_expr(*index)),
            [] => Err(SqlError::UnknownColumn(name.to_string())),
            many => Err(SqlError::AmbiguousColumn {
                name: name.to_string(),
                candidates: many.iter().map(|i| self.display_name(*i, true)).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Field;
    use crate::sql::parse;

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .create_table(
                "users",
                &[
                    Field::new("id", DataType::Integer).required(),
                    Field::new("name", DataType::String),
                    Field::new("tags", DataType::String).repeated(),
                    Field::record("address", vec![Field::new("city", DataType::String)]),
                ],
            )
            .unwrap();
        catalog
            .create_table(
                "orders",
                &[
                    Field::new("id", DataType::Integer).required(),
                    Field::new("user_id", DataType::Integer),
                    Field::new("total", DataType::Float),
                ],
            )
            .unwrap();
        catalog
    }

    fn resolve(catalog: &Catalog, sql: &str) -> SqlResult<ResolvedSelect> {
        Resolver::new(catalog).resolve_select(&parse(sql).unwrap())
    }

    #[test]
    fn test_resolve_select() {
        let catalog = test_catalog();
        let select = resolve(&catalog, "SELECT id, name FROM users WHERE id = 1").unwrap();
        assert_eq!(select.columns.len(), 2);
        assert!(select.filter.is_some());
        assert!(select.grouping.is_none());
        assert_eq!(select.schema.names(), vec!["id", "name"]);
        assert_eq!(select.schema.columns()[0].mode, Mode::Required);
    }

    #[test]
    fn test_resolve_table_not_found() {
        let catalog = test_catalog();
        let result = resolve(&catalog, "SELECT * FROM nonexistent");
        assert!(matches!(result, Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn test_resolve_column_not_found() {
        let catalog = test_catalog();
        let result = resolve(&catalog, "SELECT nonexistent FROM users");
        assert!(matches!(result, Err(SqlError::UnknownColumn(_))));
    }

    #[test]
    fn test_resolve_ambiguous_column() {
        let catalog = test_catalog();
        // Both users and orders have 'id' column
        let result = resolve(
            &catalog,
            "SELECT id FROM users JOIN orders ON users.id = orders.user_id",
        );
        match result {
            Err(SqlError::AmbiguousColumn { candidates, .. }) => {
                assert_eq!(candidates, vec!["users.id", "orders.id"]);
            }
            other => panic!("expected AmbiguousColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_qualified_column() {
        let catalog = test_catalog();
        let select = resolve(
            &catalog,
            "SELECT u.id, o.total FROM users u JOIN orders o ON u.id = o.user_id",
        )
        .unwrap();
        assert_eq!(select.schema.names(), vec!["u.id", "o.total"]);
        match &select.columns[1].expr {
            ResolvedExpr::Column(col) => assert_eq!(col.index, 6),
            other => panic!("expected column, got {:?}", other),
        }
    }

    #[test]
    fn test_record_leaf_columns() {
        let catalog = test_catalog();
        let select = resolve(&catalog, "SELECT address.city, users.address.city FROM users").unwrap();
        assert_eq!(select.schema.names(), vec!["address.city", "users.address.city"]);
    }

    #[test]
    fn test_left_join_relaxes_right_modes() {
        let catalog = test_catalog();
        let select = resolve(
            &catalog,
            "SELECT * FROM users LEFT OUTER JOIN orders ON users.id = orders.user_id",
        )
        .unwrap();
        let modes: Vec<Mode> = select.schema.columns().iter().map(|c| c.mode).collect();
        assert_eq!(modes[0], Mode::Required);
        assert_eq!(modes[2], Mode::Repeated);
        assert_eq!(modes[4], Mode::Nullable);
        assert_eq!(select.schema.columns()[4].name, "orders.id");

        // Right-side REPEATED columns become NULLABLE too
        let select = resolve(
            &catalog,
            "SELECT * FROM orders LEFT OUTER JOIN users ON orders.user_id = users.id",
        )
        .unwrap();
        let tags = select.schema.get_column("users.tags").unwrap();
        assert_eq!(tags.mode, Mode::Nullable);
        assert_eq!(tags.data_type, DataType::String);
    }

    #[test]
    fn test_output_naming() {
        let catalog = test_catalog();
        let select = resolve(&catalog, "SELECT id + 1, name, id AS name2, LENGTH(name) FROM users").unwrap();
        assert_eq!(select.schema.names(), vec!["f0_", "name", "name2", "f1_"]);

        let select = resolve(&catalog, "SELECT name AS id, id FROM users").unwrap();
        assert_eq!(select.schema.names(), vec!["id", "f0_"]);

        let result = resolve(&catalog, "SELECT id AS x, name AS x FROM users");
        assert!(matches!(result, Err(SqlError::DuplicateAlias(_))));
    }

    #[test]
    fn test_function_errors() {
        let catalog = test_catalog();
        assert!(matches!(
            resolve(&catalog, "SELECT NO_SUCH(id) FROM users"),
            Err(SqlError::UnknownFunction(_))
        ));
        assert!(matches!(
            resolve(&catalog, "SELECT ABS(id, id) FROM users"),
            Err(SqlError::BadArity { found: 2, .. })
        ));
        assert!(matches!(
            resolve(&catalog, "SELECT id + name FROM users"),
            Err(SqlError::TypeMismatch { .. })
        ));
        assert!(matches!(
            resolve(&catalog, "SELECT REGEXP_MATCH(name, name) FROM users"),
            Err(SqlError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_aggregate_placement() {
        let catalog = test_catalog();
        assert!(matches!(
            resolve(&catalog, "SELECT id FROM users WHERE COUNT(*) > 1"),
            Err(SqlError::AggregateNotAllowed { clause: "WHERE", .. })
        ));
        assert!(matches!(
            resolve(&catalog, "SELECT SUM(COUNT(id)) FROM users"),
            Err(SqlError::AggregateNotAllowed { .. })
        ));
    }

    #[test]
    fn test_grouping() {
        let catalog = test_catalog();
        let select = resolve(&catalog, "SELECT name, COUNT(*) AS n FROM users GROUP BY name").unwrap();
        assert_eq!(select.grouping.as_ref().map(Vec::len), Some(1));
        assert!(matches!(select.columns[0].expr, ResolvedExpr::GroupKey { index: 0, .. }));
        assert_eq!(select.schema.columns()[1].mode, Mode::Required);

        let select = resolve(&catalog, "SELECT COUNT(*) FROM users").unwrap();
        assert_eq!(select.grouping.as_ref().map(Vec::len), Some(0));

        assert!(matches!(
            resolve(&catalog, "SELECT id, COUNT(*) FROM users GROUP BY name"),
            Err(SqlError::NotGrouped(_))
        ));
        assert!(matches!(
            resolve(&catalog, "SELECT tags FROM users GROUP BY tags"),
            Err(SqlError::InvalidGroupBy(_))
        ));
        assert!(matches!(
            resolve(&catalog, "SELECT name FROM users GROUP BY 2"),
            Err(SqlError::InvalidGroupBy(_))
        ));
    }

    #[test]
    fn test_group_by_alias_and_ordinal() {
        let catalog = test_catalog();
        let select = resolve(
            &catalog,
            "SELECT LEFT(name, 1) AS initial, COUNT(*) FROM users GROUP BY initial ORDER BY initial",
        )
        .unwrap();
        assert!(matches!(select.columns[0].expr, ResolvedExpr::GroupKey { .. }));
        assert!(matches!(select.order_by[0].expr.expr, ResolvedExpr::GroupKey { .. }));

        let select = resolve(&catalog, "SELECT id % 2, COUNT(*) FROM users GROUP BY 1").unwrap();
        assert_eq!(select.grouping.unwrap()[0].text, "(id % 2)");
    }

    #[test]
    fn test_having_alias() {
        let catalog = test_catalog();
        let select = resolve(
            &catalog,
            "SELECT name, COUNT(*) AS n FROM users GROUP BY name HAVING n > 1",
        )
        .unwrap();
        assert!(select.having.unwrap().expr.contains_aggregate());
    }

    #[test]
    fn test_subquery_scope() {
        let catalog = test_catalog();
        let select = resolve(
            &catalog,
            "SELECT s.total FROM (SELECT SUM(total) AS total FROM orders) s",
        )
        .unwrap();
        assert!(matches!(select.from, Some(ResolvedTableExpr::Subquery(_))));
        assert_eq!(select.schema.names(), vec!["s.total"]);
    }

    #[test]
    fn test_self_join_needs_aliases() {
        let catalog = test_catalog();
        assert!(matches!(
            resolve(&catalog, "SELECT * FROM users JOIN users ON users.id = users.id"),
            Err(SqlError::DuplicateAlias(_))
        ));
        assert!(resolve(&catalog, "SELECT a.id FROM users a JOIN users b ON a.id = b.id").is_ok());
    }

    #[test]
    fn test_case_between_in_lowering() {
        let catalog = test_catalog();
        let select = resolve(
            &catalog,
            "SELECT CASE WHEN id BETWEEN 1 AND 5 THEN 'low' ELSE 'high' END, \
             id NOT IN (1, 2) FROM users",
        )
        .unwrap();
        assert_eq!(select.schema.columns()[0].data_type, DataType::String);
        assert_eq!(select.schema.columns()[1].data_type, DataType::Boolean);
    }

    #[test]
    fn test_where_must_be_boolean() {
        let catalog = test_catalog();
        assert!(matches!(
            resolve(&catalog, "SELECT id FROM users WHERE id + 1"),
            Err(SqlError::TypeMismatch { .. })
        ));
    }
}
