use std::collections::{BTreeMap, VecDeque};

use reqwest::Method;
use url::form_urlencoded::byte_serialize;

use crate::ClientError;
use crate::query::{
    COLLECTION_QUERY_PARAMETERS, ENTITY_QUERY_PARAMETERS, NO_QUERY_PARAMETERS, QueryParameter,
};
use crate::transform::{TransformField, TransformOp};

/// EDM primitive type of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdmType {
    Int16,
    Int32,
    Int64,
    Boolean,
    String,
    DateTimeOffset,
}

/// Scalar property of an entity set.
#[derive(Clone, Copy, Debug)]
pub struct PropertyDefinition {
    /// Wire name, e.g. `aktørid`.
    pub name: &'static str,
    pub edm_type: EdmType,
    pub nullable: bool,
    /// Entity set this property is a foreign key into.
    pub references: Option<&'static str>,
}

/// Navigation property of an entity set.
#[derive(Clone, Copy, Debug)]
pub struct NavigationDefinition {
    pub name: &'static str,
    /// Entity set the navigation leads to.
    pub target: &'static str,
    /// `true` for to-many navigations.
    pub collection: bool,
}

/// One entity set exposed by the service.
#[derive(Clone, Copy, Debug)]
pub struct EntitySetDefinition {
    pub name: &'static str,
    pub key: &'static str,
    pub properties: &'static [PropertyDefinition],
    pub navigations: &'static [NavigationDefinition],
    /// Date rules for a single entity of this set.
    pub date_rules: &'static [TransformField],
    /// Date rules for a collection envelope of this set.
    pub collection_date_rules: &'static [TransformField],
}

impl EntitySetDefinition {
    pub fn navigation(&self, name: &str) -> Option<&'static NavigationDefinition> {
        self.navigations.iter().find(|navigation| navigation.name == name)
    }

    /// Names of the `Edm.DateTimeOffset` properties.
    pub fn date_properties(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.properties
            .iter()
            .filter(|property| property.edm_type == EdmType::DateTimeOffset)
            .map(|property| property.name)
    }
}

/// Shape of an operation, used for typed lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    List,
    Create,
    Get,
    Update,
    Delete,
    ListRelated,
    GetRelated,
    CreateRelated,
    Batch,
}

/// Metadata for one service operation.
///
/// Values are generated from `metadata/oda.json` at build time.
#[derive(Clone, Copy, Debug)]
pub struct OperationDefinition {
    /// Stable operation identifier, e.g. `sagGetById`.
    pub operation_id: &'static str,
    /// Uppercase HTTP method (for example `GET`, `PATCH`).
    pub method: &'static str,
    /// Path template, potentially containing `{id}`.
    pub path_template: &'static str,
    /// Required path parameter names extracted from `path_template`.
    pub path_params: &'static [&'static str],
    /// Query options this operation accepts.
    pub query_params: &'static [QueryParameter],
    pub kind: OperationKind,
    pub entity_set: Option<&'static str>,
    pub navigation: Option<&'static str>,
    /// Date rules applied to the decoded response body.
    pub response_dates: &'static [TransformField],
}

// Generated file contract (`$OUT_DIR/oda_catalog.rs`):
// 1. `ODA_DEFAULT_SERVER_URL: &str` from `service.serverUrl`.
// 2. Per entity set: `<SET>_PROPERTIES`, `<SET>_NAVIGATIONS`,
//    `<SET>_DATE_RULES`, `<SET>_COLLECTION_DATE_RULES` and a
//    `<set>_date_rules()` thunk used by nested `Loop`/`Select` rules.
// 3. `ENTITY_SETS: &[EntitySetDefinition]` in metadata order.
// 4. `OPERATIONS: &[OperationDefinition]`: five per entity set, one or two
//    per navigation property, and `batchPost`.
include!(concat!(env!("OUT_DIR"), "/oda_catalog.rs"));

/// Returns the default service root from the metadata document.
pub fn oda_default_server_url() -> &'static str {
    ODA_DEFAULT_SERVER_URL
}

/// Returns every generated operation.
pub fn operations() -> &'static [OperationDefinition] {
    OPERATIONS
}

/// Returns every entity set in metadata order.
pub fn entity_sets() -> &'static [EntitySetDefinition] {
    ENTITY_SETS
}

pub fn entity_set(name: &str) -> Result<&'static EntitySetDefinition, ClientError> {
    ENTITY_SETS
        .iter()
        .find(|set| set.name == name)
        .ok_or_else(|| ClientError::UnknownEntitySet(name.to_owned()))
}

pub fn find_operation(operation_id: &str) -> Result<&'static OperationDefinition, ClientError> {
    OPERATIONS
        .iter()
        .find(|op| op.operation_id == operation_id)
        .ok_or_else(|| ClientError::UnknownOperation(operation_id.to_owned()))
}

/// Finds the operation of `kind` on `entity_set`, optionally through a
/// navigation property.
pub(crate) fn find_entity_operation(
    entity_set: &str,
    kind: OperationKind,
    navigation: Option<&str>,
) -> Result<&'static OperationDefinition, ClientError> {
    OPERATIONS
        .iter()
        .find(|op| {
            op.kind == kind && op.entity_set == Some(entity_set) && op.navigation == navigation
        })
        .ok_or_else(|| missing_operation(entity_set, navigation))
}

fn missing_operation(entity_set: &str, navigation: Option<&str>) -> ClientError {
    let Some(navigation) = navigation else {
        return ClientError::UnknownEntitySet(entity_set.to_owned());
    };
    let definition = match self::entity_set(entity_set) {
        Ok(set) => set.navigation(navigation),
        Err(error) => return error,
    };
    match definition {
        Some(definition) => ClientError::NavigationCardinality {
            entity_set: entity_set.to_owned(),
            navigation: navigation.to_owned(),
            cardinality: if definition.collection {
                "collection-valued"
            } else {
                "single-valued"
            },
        },
        None => ClientError::UnknownNavigation {
            entity_set: entity_set.to_owned(),
            navigation: navigation.to_owned(),
        },
    }
}

/// Checks that `navigation` exists on `entity_set` and leads to `target`.
pub(crate) fn check_navigation(
    entity_set: &str,
    navigation: &str,
    target: &str,
) -> Result<&'static NavigationDefinition, ClientError> {
    let definition = self::entity_set(entity_set)?
        .navigation(navigation)
        .ok_or_else(|| ClientError::UnknownNavigation {
            entity_set: entity_set.to_owned(),
            navigation: navigation.to_owned(),
        })?;
    if definition.target != target {
        return Err(ClientError::NavigationTarget {
            entity_set: entity_set.to_owned(),
            navigation: navigation.to_owned(),
            target: definition.target.to_owned(),
            requested: target.to_owned(),
        });
    }
    Ok(definition)
}

pub(crate) fn parse_method(operation: &OperationDefinition) -> Result<Method, ClientError> {
    Method::from_bytes(operation.method.as_bytes())
        .map_err(|_| ClientError::UnknownOperation(operation.operation_id.to_owned()))
}

/// Rejects query names outside the operation's allow-list.
pub(crate) fn check_query(
    operation: &OperationDefinition,
    query: &[(&str, &str)],
) -> Result<(), ClientError> {
    for (name, _) in query {
        let allowed = name
            .parse::<QueryParameter>()
            .is_ok_and(|parameter| operation.query_params.contains(&parameter));
        if !allowed {
            return Err(ClientError::UnsupportedQueryParameter {
                operation_id: operation.operation_id.to_owned(),
                parameter: (*name).to_owned(),
            });
        }
    }
    Ok(())
}

pub(crate) fn render_path(
    operation: &OperationDefinition,
    path_params: &[(&str, &str)],
) -> Result<String, ClientError> {
    let mut rendered = operation.path_template.to_owned();

    for required_param in operation.path_params {
        let value = path_params
            .iter()
            .find(|(name, _)| name == required_param)
            .map(|(_, value)| *value)
            .ok_or_else(|| ClientError::MissingPathParameter {
                operation_id: operation.operation_id.to_owned(),
                parameter: (*required_param).to_owned(),
            })?;

        let placeholder = format!("{{{required_param}}}");
        rendered = rendered.replace(&placeholder, &encode_path_segment(value));
    }

    Ok(rendered)
}

fn encode_path_segment(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Orders entity sets so that every set comes after the sets its foreign
/// keys reference.
///
/// Self-references are ignored. Sets on the same level keep metadata order.
pub fn dependency_order() -> Vec<&'static str> {
    let position: BTreeMap<&str, usize> = ENTITY_SETS
        .iter()
        .enumerate()
        .map(|(index, set)| (set.name, index))
        .collect();

    let mut pending = vec![0usize; ENTITY_SETS.len()];
    let mut referrers = vec![Vec::new(); ENTITY_SETS.len()];
    for (index, set) in ENTITY_SETS.iter().enumerate() {
        let mut targets: Vec<usize> = set
            .properties
            .iter()
            .filter_map(|property| property.references)
            .filter(|target| *target != set.name)
            .filter_map(|target| position.get(target).copied())
            .collect();
        targets.sort_unstable();
        targets.dedup();

        pending[index] = targets.len();
        for target in targets {
            referrers[target].push(index);
        }
    }

    let mut ready: VecDeque<usize> = (0..ENTITY_SETS.len())
        .filter(|index| pending[*index] == 0)
        .collect();
    let mut order = Vec::with_capacity(ENTITY_SETS.len());

    while let Some(index) = ready.pop_front() {
        order.push(ENTITY_SETS[index].name);
        let mut unlocked = Vec::new();
        for referrer in &referrers[index] {
            pending[*referrer] -= 1;
            if pending[*referrer] == 0 {
                unlocked.push(*referrer);
            }
        }
        unlocked.sort_unstable();
        ready.extend(unlocked);
    }

    // Cycles through more than one set would leave members behind; append
    // them in metadata order rather than dropping them.
    if order.len() < ENTITY_SETS.len() {
        for set in ENTITY_SETS {
            if !order.contains(&set.name) {
                order.push(set.name);
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::{
        OperationKind, check_navigation, check_query, dependency_order, entity_set, entity_sets,
        find_entity_operation, find_operation, operations, render_path,
    };
    use crate::ClientError;
    use crate::transform::TransformOp;

    #[test]
    fn operation_catalog_is_non_empty() {
        assert!(!operations().is_empty());
        assert_eq!(entity_sets().len(), 50);
    }

    #[test]
    fn operation_ids_are_unique() {
        let mut ids: Vec<_> = operations().iter().map(|op| op.operation_id).collect();
        ids.sort_unstable();
        let total = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn render_path_replaces_required_path_params() {
        let op = find_operation("sagGetById").expect("operation exists");
        let path = render_path(op, &[("id", "1234")]).expect("path renders");
        assert_eq!(path, "/Sag(1234)");
    }

    #[test]
    fn every_keyed_operation_substitutes_id() {
        for op in operations().iter().filter(|op| op.path_params == ["id"]) {
            let path = render_path(op, &[("id", "42")]).expect("path renders");
            assert!(!path.contains("{id}"), "{} kept placeholder", op.operation_id);
            assert!(path.contains("(42)"), "{} lost key", op.operation_id);
        }
    }

    #[test]
    fn render_path_reports_missing_parameter() {
        let op = find_operation("aktørSagAktørGetById").expect("operation exists");
        let error = render_path(op, &[]).expect_err("missing parameter should error");
        match error {
            ClientError::MissingPathParameter {
                operation_id,
                parameter,
            } => {
                assert_eq!(operation_id, "aktørSagAktørGetById");
                assert_eq!(parameter, "id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn navigation_operations_follow_foreign_keys() {
        let to_one = find_operation("sagSagstypeGetById").expect("single navigation");
        assert_eq!(to_one.kind, OperationKind::GetRelated);
        assert_eq!(to_one.path_template, "/Sag({id})/Sagstype");

        let to_many = find_operation("sagSagAktørGetById").expect("collection navigation");
        assert_eq!(to_many.kind, OperationKind::ListRelated);
        assert!(find_operation("sagSagAktørPostById").is_ok());
        assert!(find_operation("sagSagstypePostById").is_err());

        let renamed = find_entity_operation("Sag", OperationKind::ListRelated, Some("FremsatSager"))
            .expect("inverse of fremsatundersagid");
        assert_eq!(renamed.path_template, "/Sag({id})/FremsatSager");
    }

    #[test]
    fn check_query_enforces_allow_list() {
        let by_key = find_operation("dokumentGetById").expect("operation exists");
        assert!(check_query(by_key, &[("$expand", "Fil")]).is_ok());
        let error = check_query(by_key, &[("$top", "1")]).expect_err("not allowed on by-key");
        assert!(matches!(
            error,
            ClientError::UnsupportedQueryParameter { ref parameter, .. } if parameter == "$top"
        ));

        let delete = find_operation("dokumentDeleteById").expect("operation exists");
        assert!(check_query(delete, &[("$select", "id")]).is_err());
        let list = find_operation("dokumentGet").expect("operation exists");
        assert!(check_query(list, &[("top", "1")]).is_err());
    }

    #[test]
    fn date_rules_cover_properties_and_navigations() {
        let sag = entity_set("Sag").expect("Sag exists");
        let dates: Vec<_> = sag.date_properties().collect();
        assert_eq!(
            dates,
            [
                "opdateringsdato",
                "afgørelsesdato",
                "rådsmødedato",
                "lovnummerdato"
            ]
        );

        let expanded = sag
            .date_rules
            .iter()
            .find(|rule| rule.field == "SagAktør")
            .expect("SagAktør rule");
        let TransformOp::Loop(nested) = expanded.op else {
            panic!("collection navigation must loop");
        };
        assert!(nested().iter().any(|rule| rule.field == "Aktør"));

        let collection = sag.collection_date_rules;
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[0].field, "value");
    }

    #[test]
    fn check_navigation_validates_target() {
        assert!(check_navigation("Sag", "SagAktør", "SagAktør").is_ok());

        let error = check_navigation("Sag", "SagAktør", "Aktør").expect_err("wrong target");
        assert_eq!(
            error.to_string(),
            "navigation 'SagAktør' on 'Sag' leads to 'SagAktør', not 'Aktør'"
        );
        assert!(matches!(
            check_navigation("Sag", "Nope", "Aktør"),
            Err(ClientError::UnknownNavigation { ref navigation, .. }) if navigation == "Nope"
        ));
        assert!(matches!(
            check_navigation("Nope", "SagAktør", "SagAktør"),
            Err(ClientError::UnknownEntitySet(_))
        ));
    }

    #[test]
    fn entity_operation_reports_navigation_cardinality() {
        let error = find_entity_operation("Sag", OperationKind::ListRelated, Some("Sagstype"))
            .expect_err("Sagstype is a to-one navigation");
        assert_eq!(
            error.to_string(),
            "navigation 'Sagstype' on 'Sag' is single-valued"
        );

        let error = find_entity_operation("Sag", OperationKind::GetRelated, Some("SagAktør"))
            .expect_err("SagAktør is a to-many navigation");
        assert!(matches!(
            error,
            ClientError::NavigationCardinality { cardinality: "collection-valued", .. }
        ));

        assert!(matches!(
            find_entity_operation("Sag", OperationKind::ListRelated, Some("Nope")),
            Err(ClientError::UnknownNavigation { .. })
        ));
    }

    #[test]
    fn case_views_are_catalogued() {
        for (name, prefix) in [("Aktstykke", "aktstykke"), ("Almdel", "almdel"), ("Debat", "debat")] {
            let set = entity_set(name).expect("case view exists");
            assert!(set.date_properties().any(|field| field == "opdateringsdato"));
            for suffix in ["Get", "Post", "GetById", "PatchById", "DeleteById"] {
                let id = format!("{prefix}{suffix}");
                assert!(find_operation(&id).is_ok(), "{id} missing");
            }
            assert_eq!(
                find_operation(&format!("{prefix}SagstypeGetById"))
                    .expect("to-one navigation")
                    .path_template,
                format!("/{name}({{id}})/Sagstype")
            );
        }
    }

    #[test]
    fn inverse_navigations_collect_every_referrer() {
        let sagstype = entity_set("Sagstype").expect("Sagstype exists");
        let inverse: Vec<_> = sagstype
            .navigations
            .iter()
            .filter(|navigation| navigation.collection)
            .map(|navigation| navigation.name)
            .collect();
        for referrer in ["Sag", "Aktstykke", "Almdel", "Debat"] {
            assert!(inverse.contains(&referrer), "{referrer} missing on Sagstype");
        }

        let sag = entity_set("Sag").expect("Sag exists");
        let fremsat = sag.navigation("FremsatUnderSag").expect("renamed to-one");
        assert!(!fremsat.collection);
        assert_eq!(fremsat.target, "Sag");
        assert!(sag.navigation("FremsatSager").is_some_and(|nav| nav.collection));
    }

    #[test]
    fn dependency_order_puts_referenced_sets_first() {
        let order = dependency_order();
        assert_eq!(order.len(), entity_sets().len());

        let rank = |name: &str| order.iter().position(|set| *set == name).expect("present");
        for set in entity_sets() {
            for target in set.properties.iter().filter_map(|property| property.references) {
                if target != set.name {
                    assert!(rank(target) < rank(set.name), "{target} after {}", set.name);
                }
            }
        }
        assert!(rank("Periode") < rank("Sag"));
        assert!(rank("Sag") < rank("SagAktør"));
    }
}
