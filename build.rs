//! Generates the ODA entity model, operation registry and date-transform
//! descriptors from `metadata/oda.json`.
//!
//! Outputs (both in `$OUT_DIR`):
//! - `oda_catalog.rs`: included by `src/catalog.rs`.
//! - `oda_models.rs`: included by `src/model.rs`.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde_json::Value;

const METADATA_PATH: &str = "metadata/oda.json";

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "super", "trait", "true", "type", "unsafe",
    "use", "where", "while", "yield",
];

struct Property {
    name: String,
    edm_type: String,
    nullable: bool,
    references: Option<String>,
    navigation: Option<String>,
    inverse: Option<String>,
}

#[derive(Clone)]
struct Navigation {
    name: String,
    target: String,
    collection: bool,
}

struct EntitySet {
    name: String,
    properties: Vec<Property>,
    navigations: Vec<Navigation>,
}

fn main() {
    println!("cargo:rerun-if-changed={METADATA_PATH}");

    let raw = fs::read_to_string(METADATA_PATH)
        .unwrap_or_else(|error| panic!("failed to read {METADATA_PATH}: {error}"));
    let document: Value = serde_json::from_str(&raw)
        .unwrap_or_else(|error| panic!("failed to parse {METADATA_PATH}: {error}"));

    let server_url = document
        .pointer("/service/serverUrl")
        .and_then(Value::as_str)
        .unwrap_or("https://oda.ft.dk/api")
        .to_owned();

    let mut sets = parse_entity_sets(&document);
    derive_navigations(&mut sets);
    check_identifiers(&sets);

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    write_file(
        &Path::new(&out_dir).join("oda_catalog.rs"),
        &render_catalog(&server_url, &sets),
    );
    write_file(
        &Path::new(&out_dir).join("oda_models.rs"),
        &render_models(&sets),
    );
}

fn write_file(path: &Path, contents: &str) {
    fs::write(path, contents)
        .unwrap_or_else(|error| panic!("failed to write {}: {error}", path.display()));
}

fn parse_entity_sets(document: &Value) -> Vec<EntitySet> {
    let entries = document
        .get("entitySets")
        .and_then(Value::as_array)
        .expect("metadata must contain an `entitySets` array");

    entries
        .iter()
        .map(|entry| {
            let name = required_str(entry, "name").to_owned();
            let properties = entry
                .get("properties")
                .and_then(Value::as_array)
                .unwrap_or_else(|| panic!("entity set '{name}' has no `properties` array"))
                .iter()
                .map(|property| Property {
                    name: required_str(property, "name").to_owned(),
                    edm_type: required_str(property, "type").to_owned(),
                    nullable: property
                        .get("nullable")
                        .and_then(Value::as_bool)
                        .unwrap_or(true),
                    references: optional_str(property, "references"),
                    navigation: optional_str(property, "navigation"),
                    inverse: optional_str(property, "inverse"),
                })
                .collect::<Vec<_>>();

            assert!(
                properties.iter().any(|property| property.name == "id"),
                "entity set '{name}' has no `id` key property"
            );

            EntitySet {
                name,
                properties,
                navigations: Vec::new(),
            }
        })
        .collect()
}

fn required_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("missing string field `{key}` in {value}"))
}

fn optional_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Every foreign key yields a single-valued navigation on its owner and a
/// collection navigation on the referenced set.
fn derive_navigations(sets: &mut [EntitySet]) {
    let index: BTreeMap<String, usize> = sets
        .iter()
        .enumerate()
        .map(|(position, set)| (set.name.clone(), position))
        .collect();

    let mut single = vec![Vec::new(); sets.len()];
    let mut inverse = vec![Vec::new(); sets.len()];

    for (owner, set) in sets.iter().enumerate() {
        for property in &set.properties {
            let Some(target) = &property.references else {
                continue;
            };
            let target_index = *index.get(target).unwrap_or_else(|| {
                panic!(
                    "'{}.{}' references unknown entity set '{target}'",
                    set.name, property.name
                )
            });

            single[owner].push(Navigation {
                name: property.navigation.clone().unwrap_or_else(|| target.clone()),
                target: target.clone(),
                collection: false,
            });
            inverse[target_index].push(Navigation {
                name: property.inverse.clone().unwrap_or_else(|| set.name.clone()),
                target: set.name.clone(),
                collection: true,
            });
        }
    }

    for (position, set) in sets.iter_mut().enumerate() {
        set.navigations.append(&mut single[position]);
        set.navigations.append(&mut inverse[position]);

        let mut seen = BTreeSet::new();
        for navigation in &set.navigations {
            assert!(
                seen.insert(navigation.name.as_str()),
                "duplicate navigation '{}' on entity set '{}'",
                navigation.name,
                set.name
            );
        }
    }
}

fn check_identifiers(sets: &[EntitySet]) {
    let mut type_names = BTreeSet::new();
    for set in sets {
        assert!(
            type_names.insert(type_ident(&set.name)),
            "entity set '{}' collides with another set after transliteration",
            set.name
        );

        let mut fields = BTreeSet::new();
        for property in &set.properties {
            assert!(
                fields.insert(field_ident(&property.name)),
                "property '{}.{}' collides after transliteration",
                set.name,
                property.name
            );
        }
        for navigation in &set.navigations {
            assert!(
                fields.insert(navigation_ident(&navigation.name)),
                "navigation '{}.{}' collides with another member",
                set.name,
                navigation.name
            );
        }
    }
}

fn transliterate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        match ch {
            'æ' => out.push_str("ae"),
            'ø' => out.push_str("oe"),
            'å' => out.push_str("aa"),
            'Æ' => out.push_str("Ae"),
            'Ø' => out.push_str("Oe"),
            'Å' => out.push_str("Aa"),
            other => out.push(other),
        }
    }
    out
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (position, ch) in transliterate(name).chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if position > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn type_ident(set: &str) -> String {
    transliterate(set)
}

fn escape_keyword(ident: String) -> String {
    if RUST_KEYWORDS.contains(&ident.as_str()) {
        format!("r#{ident}")
    } else {
        ident
    }
}

fn field_ident(property: &str) -> String {
    escape_keyword(transliterate(property))
}

fn navigation_ident(navigation: &str) -> String {
    escape_keyword(snake_case(navigation))
}

fn const_prefix(set: &str) -> String {
    snake_case(set).to_ascii_uppercase()
}

fn rules_fn(set: &str) -> String {
    format!("{}_date_rules", snake_case(set))
}

fn operation_prefix(set: &str) -> String {
    let mut chars = set.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn rust_type(edm_type: &str) -> &'static str {
    match edm_type {
        "Edm.Int16" => "i16",
        "Edm.Int32" => "i32",
        "Edm.Int64" => "i64",
        "Edm.Boolean" => "bool",
        "Edm.String" => "String",
        "Edm.DateTimeOffset" => "DateTime<Utc>",
        other => panic!("unsupported EDM type '{other}'"),
    }
}

fn edm_variant(edm_type: &str) -> &'static str {
    match edm_type {
        "Edm.Int16" => "EdmType::Int16",
        "Edm.Int32" => "EdmType::Int32",
        "Edm.Int64" => "EdmType::Int64",
        "Edm.Boolean" => "EdmType::Boolean",
        "Edm.String" => "EdmType::String",
        "Edm.DateTimeOffset" => "EdmType::DateTimeOffset",
        other => panic!("unsupported EDM type '{other}'"),
    }
}

fn is_date(property: &Property) -> bool {
    property.edm_type == "Edm.DateTimeOffset"
}

fn is_key(property: &Property) -> bool {
    property.name == "id"
}

fn render_catalog(server_url: &str, sets: &[EntitySet]) -> String {
    let mut out = String::new();
    out.push_str("// @generated by build.rs from metadata/oda.json. Do not edit.\n\n");
    let _ = writeln!(
        out,
        "pub(crate) const ODA_DEFAULT_SERVER_URL: &str = {server_url:?};\n"
    );

    for set in sets {
        let prefix = const_prefix(&set.name);

        let _ = writeln!(out, "const {prefix}_PROPERTIES: &[PropertyDefinition] = &[");
        for property in &set.properties {
            let references = property
                .references
                .as_ref()
                .map_or_else(|| "None".to_owned(), |target| format!("Some({target:?})"));
            let _ = writeln!(
                out,
                "    PropertyDefinition {{ name: {:?}, edm_type: {}, nullable: {}, references: {references} }},",
                property.name,
                edm_variant(&property.edm_type),
                property.nullable,
            );
        }
        out.push_str("];\n\n");

        let _ = writeln!(out, "const {prefix}_NAVIGATIONS: &[NavigationDefinition] = &[");
        for navigation in &set.navigations {
            let _ = writeln!(
                out,
                "    NavigationDefinition {{ name: {:?}, target: {:?}, collection: {} }},",
                navigation.name, navigation.target, navigation.collection,
            );
        }
        out.push_str("];\n\n");

        let _ = writeln!(out, "const {prefix}_DATE_RULES: &[TransformField] = &[");
        for property in set.properties.iter().filter(|property| is_date(property)) {
            let _ = writeln!(
                out,
                "    TransformField {{ field: {:?}, op: TransformOp::This }},",
                property.name
            );
        }
        for navigation in &set.navigations {
            let op = if navigation.collection { "Loop" } else { "Select" };
            let _ = writeln!(
                out,
                "    TransformField {{ field: {:?}, op: TransformOp::{op}({}) }},",
                navigation.name,
                rules_fn(&navigation.target)
            );
        }
        out.push_str("];\n\n");

        let _ = writeln!(
            out,
            "const {prefix}_COLLECTION_DATE_RULES: &[TransformField] = &[\n    TransformField {{ field: \"value\", op: TransformOp::Loop({}) }},\n];\n",
            rules_fn(&set.name)
        );

        let _ = writeln!(
            out,
            "fn {}() -> &'static [TransformField] {{\n    {prefix}_DATE_RULES\n}}\n",
            rules_fn(&set.name)
        );
    }

    out.push_str("pub(crate) static ENTITY_SETS: &[EntitySetDefinition] = &[\n");
    for set in sets {
        let prefix = const_prefix(&set.name);
        let _ = writeln!(
            out,
            "    EntitySetDefinition {{ name: {:?}, key: \"id\", properties: {prefix}_PROPERTIES, navigations: {prefix}_NAVIGATIONS, date_rules: {prefix}_DATE_RULES, collection_date_rules: {prefix}_COLLECTION_DATE_RULES }},",
            set.name
        );
    }
    out.push_str("];\n\n");

    out.push_str("pub(crate) static OPERATIONS: &[OperationDefinition] = &[\n");
    for set in sets {
        render_operations(&mut out, set);
    }
    out.push_str(
        "    OperationDefinition { operation_id: \"batchPost\", method: \"POST\", path_template: \"/$batch\", path_params: &[], query_params: NO_QUERY_PARAMETERS, kind: OperationKind::Batch, entity_set: None, navigation: None, response_dates: &[] },\n",
    );
    out.push_str("];\n");

    out
}

fn render_operations(out: &mut String, set: &EntitySet) {
    let prefix = operation_prefix(&set.name);
    let consts = const_prefix(&set.name);
    let name = &set.name;
    let collection_path = format!("/{name}");
    let key_path = format!("/{name}({{id}})");

    let mut push = |operation_id: String,
                    method: &str,
                    path: &str,
                    with_id: bool,
                    query: &str,
                    kind: &str,
                    navigation: Option<&str>,
                    dates: String| {
        let path_params = if with_id { "&[\"id\"]" } else { "&[]" };
        let navigation = navigation.map_or_else(|| "None".to_owned(), |nav| format!("Some({nav:?})"));
        let _ = writeln!(
            out,
            "    OperationDefinition {{ operation_id: {operation_id:?}, method: {method:?}, path_template: {path:?}, path_params: {path_params}, query_params: {query}, kind: OperationKind::{kind}, entity_set: Some({name:?}), navigation: {navigation}, response_dates: {dates} }},"
        );
    };

    push(
        format!("{prefix}Get"),
        "GET",
        &collection_path,
        false,
        "COLLECTION_QUERY_PARAMETERS",
        "List",
        None,
        format!("{consts}_COLLECTION_DATE_RULES"),
    );
    push(
        format!("{prefix}Post"),
        "POST",
        &collection_path,
        false,
        "NO_QUERY_PARAMETERS",
        "Create",
        None,
        format!("{consts}_DATE_RULES"),
    );
    push(
        format!("{prefix}GetById"),
        "GET",
        &key_path,
        true,
        "ENTITY_QUERY_PARAMETERS",
        "Get",
        None,
        format!("{consts}_DATE_RULES"),
    );
    push(
        format!("{prefix}PatchById"),
        "PATCH",
        &key_path,
        true,
        "NO_QUERY_PARAMETERS",
        "Update",
        None,
        "&[]".to_owned(),
    );
    push(
        format!("{prefix}DeleteById"),
        "DELETE",
        &key_path,
        true,
        "NO_QUERY_PARAMETERS",
        "Delete",
        None,
        "&[]".to_owned(),
    );

    for navigation in &set.navigations {
        let target = const_prefix(&navigation.target);
        let path = format!("{key_path}/{}", navigation.name);
        if navigation.collection {
            push(
                format!("{prefix}{}GetById", navigation.name),
                "GET",
                &path,
                true,
                "COLLECTION_QUERY_PARAMETERS",
                "ListRelated",
                Some(&navigation.name),
                format!("{target}_COLLECTION_DATE_RULES"),
            );
            push(
                format!("{prefix}{}PostById", navigation.name),
                "POST",
                &path,
                true,
                "NO_QUERY_PARAMETERS",
                "CreateRelated",
                Some(&navigation.name),
                format!("{target}_DATE_RULES"),
            );
        } else {
            push(
                format!("{prefix}{}GetById", navigation.name),
                "GET",
                &path,
                true,
                "ENTITY_QUERY_PARAMETERS",
                "GetRelated",
                Some(&navigation.name),
                format!("{target}_DATE_RULES"),
            );
        }
    }
}

fn serde_attr(json_name: &str, rust_name: &str, optional: bool) -> Option<String> {
    let mut parts = Vec::new();
    if rust_name.trim_start_matches("r#") != json_name {
        parts.push(format!("rename = {json_name:?}"));
    }
    if optional {
        parts.push("default".to_owned());
        parts.push("skip_serializing_if = \"Option::is_none\"".to_owned());
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("    #[serde({})]\n", parts.join(", ")))
    }
}

fn push_field(out: &mut String, json_name: &str, rust_name: &str, ty: &str, optional: bool) {
    if let Some(attr) = serde_attr(json_name, rust_name, optional) {
        out.push_str(&attr);
    }
    if optional {
        let _ = writeln!(out, "    pub {rust_name}: Option<{ty}>,");
    } else {
        let _ = writeln!(out, "    pub {rust_name}: {ty},");
    }
}

fn render_models(sets: &[EntitySet]) -> String {
    let mut out = String::new();
    out.push_str("// @generated by build.rs from metadata/oda.json. Do not edit.\n\n");

    for set in sets {
        let ty = type_ident(&set.name);

        // Read shape.
        let _ = writeln!(
            out,
            "/// `{}` entity as returned by the service.\n///\n/// Every member is optional: `$select` may omit scalars and navigation\n/// properties are only present when requested with `$expand`.\n#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]\npub struct {ty} {{",
            set.name
        );
        for property in &set.properties {
            push_field(
                &mut out,
                &property.name,
                &field_ident(&property.name),
                rust_type(&property.edm_type),
                true,
            );
        }
        for navigation in &set.navigations {
            let target = type_ident(&navigation.target);
            let member = if navigation.collection {
                format!("Vec<{target}>")
            } else {
                format!("Box<{target}>")
            };
            push_field(
                &mut out,
                &navigation.name,
                &navigation_ident(&navigation.name),
                &member,
                true,
            );
        }
        out.push_str("}\n\n");

        // Create shape.
        let _ = writeln!(
            out,
            "/// Request body for creating a `{}` entity, optionally with related entities.\n#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]\npub struct {ty}Create {{",
            set.name
        );
        for property in &set.properties {
            push_field(
                &mut out,
                &property.name,
                &field_ident(&property.name),
                rust_type(&property.edm_type),
                property.nullable || is_key(property),
            );
        }
        for navigation in &set.navigations {
            let target = type_ident(&navigation.target);
            let member = if navigation.collection {
                format!("Vec<{target}Create>")
            } else {
                format!("Box<{target}Create>")
            };
            push_field(
                &mut out,
                &navigation.name,
                &navigation_ident(&navigation.name),
                &member,
                true,
            );
        }
        out.push_str("}\n\n");

        // Update shape.
        let _ = writeln!(
            out,
            "/// `PATCH` body for a `{}` entity. Only populated fields are sent.\n#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]\npub struct {ty}Update {{",
            set.name
        );
        for property in set.properties.iter().filter(|property| !is_key(property)) {
            push_field(
                &mut out,
                &property.name,
                &field_ident(&property.name),
                rust_type(&property.edm_type),
                true,
            );
        }
        out.push_str("}\n\n");

        let _ = writeln!(
            out,
            "impl Entity for {ty} {{\n    type Create = {ty}Create;\n    type Update = {ty}Update;\n\n    const ENTITY_SET: &'static str = {:?};\n}}\n",
            set.name
        );
    }

    out
}
