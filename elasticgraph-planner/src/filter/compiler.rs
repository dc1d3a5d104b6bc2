//! The Filter Compiler (component C3, §4.2): GraphQL filter trees → datastore boolean-query
//! trees.

use super::boolean_query::BooleanQuery;
use super::boolean_query::Clause;
use super::boolean_query::Occurrence;
use super::boolean_query::RangeBounds;
use super::classify;
use super::Classification;
use super::FilterExpression;
use super::LeafOperator;
use elasticgraph_error::GatewayError;
use elasticgraph_error::SingleGatewayError;
use elasticgraph_schema::TypeKind;
use elasticgraph_schema::TypeRef;
use serde_json::Value;

/// What descending into a schema field tells the compiler: the storage path segment to append,
/// the field's declared type, and whether it is list-valued.
#[derive(Debug, Clone)]
pub struct FieldPathResolution {
    pub name_in_index: String,
    pub child_type: TypeRef,
    pub is_list: bool,
    pub is_nested_object: bool,
}

/// Schema lookups the compiler needs but does not own. Implemented by `SchemaRegistry` in
/// ordinary use; tests supply a fixed table instead.
pub trait FieldPathResolver {
    fn resolve(&self, type_ref: &TypeRef, graphql_field_name: &str) -> Result<FieldPathResolution, GatewayError>;

    /// The schema `TypeKind` of `type_ref`, when known. `None` for scalar leaf types that never
    /// appear in the type registry (e.g. built-in GraphQL scalars).
    fn kind_of(&self, type_ref: &TypeRef) -> Option<TypeKind>;
}

impl FieldPathResolver for elasticgraph_schema::SchemaRegistry {
    fn resolve(&self, type_ref: &TypeRef, graphql_field_name: &str) -> Result<FieldPathResolution, GatewayError> {
        let field = self.field_by(type_ref, graphql_field_name)?;
        let child_type = field.type_ref.clone();
        let is_nested_object = self
            .type_by(&child_type)
            .map(|t| matches!(t.kind, TypeKind::Object | TypeKind::Interface | TypeKind::Union))
            .unwrap_or(false);
        Ok(FieldPathResolution {
            name_in_index: field.name_in_index.clone(),
            child_type,
            is_list: field.is_list,
            is_nested_object,
        })
    }

    fn kind_of(&self, type_ref: &TypeRef) -> Option<TypeKind> {
        self.type_by(type_ref).ok().map(|t| t.kind)
    }
}

struct Ctx<'a> {
    resolver: &'a dyn FieldPathResolver,
}

/// Compile a filter expression rooted at `root_type` into a boolean-query node, or `None` if the
/// filter is empty (nil or `{}`).
pub fn compile_filter(
    resolver: &dyn FieldPathResolver,
    root_type: &TypeRef,
    filter: &FilterExpression,
) -> Result<Option<BooleanQuery>, GatewayError> {
    if filter.is_empty() {
        return Ok(None);
    }
    let ctx = Ctx { resolver };
    let query = compile_node(&ctx, root_type, &[], filter, false)?;
    if query.is_empty() {
        Ok(None)
    } else {
        Ok(Some(query))
    }
}

fn joined(path: &[String]) -> String {
    path.join(".")
}

/// Rewrite a filter expression's sub-field keys from GraphQL names (`name_in_graphql`) to their
/// `name_in_index` equivalents, without compiling a boolean-query tree. The Routing/Index
/// Optimizer (C5, §4.4) matches filter keys directly against `IndexDefinition`'s already
/// index-side routing-field/rollover-timestamp paths, so it needs this same name_in_index descent
/// `compile_node`'s `SubField` branch performs for C3 — just without building `Clause`s.
pub fn translate_filter_to_index_names(
    resolver: &dyn FieldPathResolver,
    type_ref: &TypeRef,
    filter: &FilterExpression,
) -> Result<FilterExpression, GatewayError> {
    let mut out = FilterExpression::new();
    for (key, value) in filter {
        match classify(key, value) {
            Classification::Empty => {
                out.insert(key.clone(), value.clone());
            }
            Classification::Not => {
                let Value::Object(inner) = value else {
                    out.insert(key.clone(), value.clone());
                    continue;
                };
                let translated = translate_filter_to_index_names(resolver, type_ref, inner)?;
                out.insert(key.clone(), Value::Object(translated));
            }
            Classification::AnyOf | Classification::AllOf => {
                let Value::Array(items) = value else {
                    out.insert(key.clone(), value.clone());
                    continue;
                };
                let mut translated_items = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(obj) => {
                            translated_items.push(Value::Object(translate_filter_to_index_names(resolver, type_ref, obj)?));
                        }
                        other => translated_items.push(other.clone()),
                    }
                }
                out.insert(key.clone(), Value::Array(translated_items));
            }
            Classification::AnySatisfy => {
                // `any_satisfy`'s inner predicate is compiled against the same type/path as its
                // enclosing field (see `compile_any_satisfy`): translate it the same way.
                let Value::Object(inner) = value else {
                    out.insert(key.clone(), value.clone());
                    continue;
                };
                let translated = translate_filter_to_index_names(resolver, type_ref, inner)?;
                out.insert(key.clone(), Value::Object(translated));
            }
            Classification::Count => {
                // `count`'s predicate is operators-only (§4.2); nothing beneath it to translate.
                out.insert(key.clone(), value.clone());
            }
            Classification::Operator(_) => {
                out.insert(key.clone(), value.clone());
            }
            Classification::SubField(name) => {
                let Value::Object(inner) = value else {
                    out.insert(key.clone(), value.clone());
                    continue;
                };
                let resolution = resolver.resolve(type_ref, name)?;
                let translated = translate_filter_to_index_names(resolver, &resolution.child_type, inner)?;
                out.insert(resolution.name_in_index.clone(), Value::Object(translated));
            }
        }
    }
    Ok(out)
}

/// Compile one filter map at `path`/`type_ref`, under the given negation polarity. `negate`
/// threads through recursion; De Morgan's laws flip union↔intersection at `any_of`/`all_of` and
/// select `must_not` instead of `filter` for leaf clauses (§4.2: "negating inside `not` flips
/// union↔intersection in the value-set extractor" — the boolean-query side mirrors this by
/// choosing occurrence per clause rather than re-wrapping in nested `not` nodes, which is what
/// naturally collapses `not` of `not`).
fn compile_node(
    ctx: &Ctx<'_>,
    type_ref: &TypeRef,
    path: &[String],
    filter: &FilterExpression,
    negate: bool,
) -> Result<BooleanQuery, GatewayError> {
    let and_occurrence = if negate { Occurrence::MustNot } else { Occurrence::Filter };
    let mut query = BooleanQuery::new();

    for (key, value) in filter {
        match classify(key, value) {
            Classification::Empty => {}

            Classification::Not => {
                let Value::Object(inner) = value else {
                    return Err(SingleGatewayError::InvalidArgumentValue {
                        message: format!("\"not\" at \"{}\" must be an object", joined(path)),
                    }
                    .into());
                };
                let flipped = compile_node(ctx, type_ref, path, inner, !negate)?;
                merge_into(&mut query, flipped);
            }

            Classification::AnyOf => {
                let Value::Array(branches) = value else {
                    return Err(SingleGatewayError::InvalidArgumentValue {
                        message: format!("\"any_of\" at \"{}\" must be a list", joined(path)),
                    }
                    .into());
                };
                if branches.is_empty() {
                    if negate {
                        // NOT(always-false) contributes nothing.
                    } else {
                        merge_into(&mut query, BooleanQuery::always_false());
                    }
                    continue;
                }
                let compiled: Vec<BooleanQuery> = branches
                    .iter()
                    .map(|b| {
                        let Value::Object(m) = b else {
                            return Err(SingleGatewayError::InvalidArgumentValue {
                                message: format!("\"any_of\" branch at \"{}\" must be an object", joined(path)),
                            }
                            .into());
                        };
                        compile_node(ctx, type_ref, path, m, negate)
                    })
                    .collect::<Result<_, GatewayError>>()?;
                if negate {
                    // NOT(A or B) = NOT A AND NOT B: each already-negated branch ANDs in directly.
                    for branch in compiled {
                        merge_into(&mut query, branch);
                    }
                } else {
                    query.push(
                        Occurrence::Filter,
                        Clause::Bool(Box::new(or_together(compiled))),
                    );
                }
            }

            Classification::AllOf => {
                let Value::Array(branches) = value else {
                    return Err(SingleGatewayError::InvalidArgumentValue {
                        message: format!("\"all_of\" at \"{}\" must be a list", joined(path)),
                    }
                    .into());
                };
                let compiled: Vec<BooleanQuery> = branches
                    .iter()
                    .map(|b| {
                        let Value::Object(m) = b else {
                            return Err(SingleGatewayError::InvalidArgumentValue {
                                message: format!("\"all_of\" branch at \"{}\" must be an object", joined(path)),
                            }
                            .into());
                        };
                        compile_node(ctx, type_ref, path, m, negate)
                    })
                    .collect::<Result<_, GatewayError>>()?;
                if negate {
                    // NOT(A and B) = NOT A OR NOT B.
                    query.push(Occurrence::Filter, Clause::Bool(Box::new(or_together(compiled))));
                } else {
                    for branch in compiled {
                        merge_into(&mut query, branch);
                    }
                }
            }

            Classification::AnySatisfy => {
                let Value::Object(inner) = value else {
                    return Err(SingleGatewayError::InvalidArgumentValue {
                        message: format!("\"any_satisfy\" at \"{}\" must be an object", joined(path)),
                    }
                    .into());
                };
                let clause = compile_any_satisfy(ctx, type_ref, path, inner)?;
                if let Some(clause) = clause {
                    query.push(and_occurrence, clause);
                }
            }

            Classification::Count => {
                let Value::Object(predicate) = value else {
                    return Err(SingleGatewayError::InvalidArgumentValue {
                        message: format!("\"count\" at \"{}\" must be an object", joined(path)),
                    }
                    .into());
                };
                let mut count_path = path.to_vec();
                let last = count_path.pop().unwrap_or_default();
                count_path.push(format!("{last}__counts"));
                let count_field = joined(&count_path);
                let predicate_matches_zero = predicate_can_match_zero(predicate);
                let mut count_filter = FilterExpression::new();
                for (k, v) in predicate {
                    count_filter.insert(k.clone(), v.clone());
                }
                let leaf = compile_operators_only(&count_field, &count_filter)?;
                if predicate_matches_zero {
                    // absence of __counts (field never populated) is equivalent to a count of 0
                    let none_clause = Clause::Bool(Box::new({
                        let mut b = BooleanQuery::new();
                        b.push(Occurrence::MustNot, Clause::Exists { field: count_field.clone() });
                        b
                    }));
                    query.push(
                        and_occurrence,
                        Clause::Bool(Box::new(or_together(vec![
                            {
                                let mut b = BooleanQuery::new();
                                merge_into(&mut b, leaf);
                                b
                            },
                            {
                                let mut b = BooleanQuery::new();
                                b.push(Occurrence::Filter, none_clause);
                                b
                            },
                        ]))),
                    );
                } else {
                    merge_with_occurrence(&mut query, leaf, and_occurrence);
                }
            }

            Classification::Operator(op) => {
                let field = joined(path);
                apply_operator(&mut query, and_occurrence, &field, op, value)?;
            }

            Classification::SubField(name) => {
                let Value::Object(inner) = value else {
                    return Err(SingleGatewayError::InvalidArgumentValue {
                        message: format!("filter on \"{name}\" at \"{}\" must be an object", joined(path)),
                    }
                    .into());
                };
                let resolution = ctx.resolver.resolve(type_ref, name)?;
                let mut child_path = path.to_vec();
                child_path.push(resolution.name_in_index.clone());
                let child = compile_node(ctx, &resolution.child_type, &child_path, inner, negate)?;
                merge_into(&mut query, child);
            }
        }
    }

    Ok(query)
}

/// `any_satisfy` dispatches by field kind (§4.2): a nested-object list wraps the compiled inner
/// query in `{nested: {path, query}}`; a scalar list inlines the inner clauses directly but
/// rejects anything requiring more than one matching clause on a single list element.
fn compile_any_satisfy(
    ctx: &Ctx<'_>,
    type_ref: &TypeRef,
    path: &[String],
    inner: &FilterExpression,
) -> Result<Option<Clause>, GatewayError> {
    // `any_satisfy` is applied to the field this path already points at; the inner filter is
    // compiled against the same type/path (the "current node" is the list field itself).
    let compiled = compile_node(ctx, type_ref, path, inner, false)?;
    if compiled.is_empty() {
        return Ok(None);
    }

    // By the time `any_satisfy` is reached, `type_ref` is the list field's own element type (the
    // sub-field descent above already walked onto it) — its schema kind tells us nested vs scalar.
    let is_nested = matches!(
        ctx.resolver.kind_of(type_ref),
        Some(TypeKind::Object | TypeKind::Interface | TypeKind::Union)
    );

    if is_nested {
        Ok(Some(Clause::Nested {
            path: joined(path),
            query: Box::new(compiled),
        }))
    } else {
        let required = compiled.required_matching_clause_count();
        if required > 1 {
            return Err(SingleGatewayError::AnySatisfyRequiresSingleMatch {
                field_path: joined(path),
                message: format!(
                    "predicate would require {required} clauses to match within a single list element"
                ),
            }
            .into());
        }
        Ok(Some(Clause::Bool(Box::new(compiled))))
    }
}

fn or_together(branches: Vec<BooleanQuery>) -> BooleanQuery {
    let mut query = BooleanQuery::new();
    for branch in branches {
        if branch.is_always_false() {
            continue;
        }
        query.push(Occurrence::Should, Clause::Bool(Box::new(branch)));
    }
    query
}

fn merge_into(query: &mut BooleanQuery, other: BooleanQuery) {
    merge_with_occurrence(query, other, Occurrence::Filter);
}

/// Merge `other`'s clauses into `query`, remapping its `filter`/`must` clauses onto
/// `default_occurrence` (used when the caller has already decided the enclosing polarity, e.g.
/// `and_occurrence` for a negated branch) while leaving its own `should`/`must_not` as-is.
fn merge_with_occurrence(query: &mut BooleanQuery, other: BooleanQuery, default_occurrence: Occurrence) {
    for clause in other.must.into_iter().chain(other.filter.into_iter()) {
        query.push(default_occurrence, clause);
    }
    query.extend(Occurrence::Should, other.should);
    query.extend(Occurrence::MustNot, other.must_not);
}

fn apply_operator(
    query: &mut BooleanQuery,
    occurrence: Occurrence,
    field: &str,
    op: LeafOperator,
    value: &Value,
) -> Result<(), GatewayError> {
    match op {
        LeafOperator::EqualToAnyOf => {
            let Value::Array(values) = value else {
                return Err(SingleGatewayError::InvalidArgumentValue {
                    message: format!("\"equal_to_any_of\" at \"{field}\" must be a list"),
                }
                .into());
            };
            if values.is_empty() {
                query.push(occurrence, Clause::MatchNone);
            } else {
                query.push(
                    occurrence,
                    Clause::Terms {
                        field: field.to_string(),
                        values: values.clone(),
                    },
                );
            }
        }
        LeafOperator::Gt | LeafOperator::Gte | LeafOperator::Lt | LeafOperator::Lte => {
            let bounds = match op {
                LeafOperator::Gt => RangeBounds { gt: Some(value.clone()), ..Default::default() },
                LeafOperator::Gte => RangeBounds { gte: Some(value.clone()), ..Default::default() },
                LeafOperator::Lt => RangeBounds { lt: Some(value.clone()), ..Default::default() },
                LeafOperator::Lte => RangeBounds { lte: Some(value.clone()), ..Default::default() },
                _ => unreachable!(),
            };
            query.merge_range(occurrence, field, bounds);
        }
        LeafOperator::Matches => {
            query.push(
                occurrence,
                Clause::Matches {
                    field: field.to_string(),
                    value: value.clone(),
                },
            );
        }
        LeafOperator::Contains => {
            query.push(
                occurrence,
                Clause::Contains {
                    field: field.to_string(),
                    value: value.clone(),
                },
            );
        }
    }
    Ok(())
}

/// A reduced compiler used only for `count` predicates: these are plain operator maps on an
/// integer field, never connectives or sub-fields.
fn compile_operators_only(field: &str, predicate: &FilterExpression) -> Result<BooleanQuery, GatewayError> {
    let mut query = BooleanQuery::new();
    for (key, value) in predicate {
        if let Some(op) = LeafOperator::from_key(key) {
            apply_operator(&mut query, Occurrence::Filter, field, op, value)?;
        }
    }
    Ok(query)
}

/// Whether a `count` predicate could be satisfied by a count of zero — if so, the absence of the
/// `__counts` field (meaning the list was never populated) must also be treated as a match
/// (§4.2: "expand to `any_of: [predicate, {equal_to_any_of: [null]}]`").
fn predicate_can_match_zero(predicate: &FilterExpression) -> bool {
    let zero = Value::from(0);
    predicate.iter().all(|(key, value)| match LeafOperator::from_key(key) {
        Some(LeafOperator::EqualToAnyOf) => value
            .as_array()
            .is_some_and(|values| values.iter().any(|v| v == &zero)),
        Some(LeafOperator::Gt) => value.as_i64().is_some_and(|n| 0 > n),
        Some(LeafOperator::Gte) => value.as_i64().is_some_and(|n| 0 >= n),
        Some(LeafOperator::Lt) => value.as_i64().is_some_and(|n| 0 < n),
        Some(LeafOperator::Lte) => value.as_i64().is_some_and(|n| 0 <= n),
        _ => false,
    })
}
