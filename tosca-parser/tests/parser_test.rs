//! End-to-end parses of whole documents

use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use tosca_core::value::{Mapping, Value};
use tosca_parser::config::ParserConfig;
use tosca_parser::ToscaParser;

fn parse_map(yaml: &str) -> Mapping {
    let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
    match Value::from_yaml(&tree, None) {
        Value::Map(map) => map,
        _ => panic!("expected a mapping"),
    }
}

fn lenient_parser() -> ToscaParser {
    ToscaParser::with_config(ParserConfig {
        verify: false,
        ..ParserConfig::default()
    })
}

#[test]
fn test_minimal_document() {
    let parser = ToscaParser::new();
    let document = parse_map(
        "tosca_definitions_version: tosca_simple_yaml_1_0\ntopology_template: {}\n",
    );
    let model = parser
        .parse_tree(&document, None, None)
        .expect("a minimal document parses");
    assert_eq!(model.version.as_deref(), Some("tosca_simple_yaml_1_0"));
    assert_eq!(model.topology.node_templates.len(), 0);
    assert!(model.errors.is_empty());
}

#[test]
fn test_unrecognized_version() {
    let parser = ToscaParser::new();
    let document = parse_map("tosca_definitions_version: tosca_simple_yaml_9_9\n");
    let err = parser.parse_tree(&document, None, None).unwrap_err();
    assert!(err.to_string().contains("tosca_simple_yaml_9_9"));
}

#[test]
fn test_constraint_violation_is_the_only_error() {
    let parser = lenient_parser();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_0
node_types:
  A:
    derived_from: tosca.nodes.Root
    properties:
      p:
        type: integer
        constraints:
          - greater_than: 0
topology_template:
  node_templates:
    instance:
      type: A
      properties:
        p: 0
"#,
    );
    let model = parser.parse_tree(&document, None, None).expect("lenient parse");
    assert_eq!(model.errors.len(), 1, "{:?}", model.errors);
    assert!(model.errors[0].contains("greater_than"));
    assert!(model.errors[0].contains("in node template \"instance\""));
}

#[test]
fn test_hosted_on_resolution() {
    let parser = ToscaParser::new();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_0
topology_template:
  node_templates:
    db:
      type: tosca.nodes.Database
      properties:
        name: content
      requirements:
        - host: dbms
    dbms:
      type: tosca.nodes.DBMS
"#,
    );
    let model = parser.parse_tree(&document, None, None).expect("parses");
    let relationships: Vec<_> = model.topology.node_relationships("db").collect();
    assert_eq!(relationships.len(), 1);
    let host = relationships[0];
    assert_eq!(host.type_name(), Some("tosca.relationships.HostedOn"));
    assert_eq!(host.source.as_deref(), Some("db"));
    assert_eq!(host.target.as_deref(), Some("dbms"));
    assert_eq!(host.capability.as_deref(), Some("host"));
    // and it is recorded inbound on the target
    assert_eq!(model.topology.inbound_relationships("dbms").count(), 1);
}

#[test]
fn test_node_filter_selects_in_range_template() {
    let parser = ToscaParser::new();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_2
node_types:
  test.Compute:
    derived_from: tosca.nodes.Root
    properties:
      num_cpus:
        type: integer
  test.App:
    derived_from: tosca.nodes.Root
    requirements:
      - req1:
          relationship: tosca.relationships.DependsOn
topology_template:
  node_templates:
    app:
      type: test.App
      requirements:
        - req1:
            node: test.Compute
            node_filter:
              properties:
                - num_cpus: {in_range: [1, 4]}
    small:
      type: test.Compute
      properties:
        num_cpus: 2
    large:
      type: test.Compute
      properties:
        num_cpus: 16
"#,
    );
    let model = parser.parse_tree(&document, None, None).expect("parses");
    let bound: Vec<_> = model.topology.node_relationships("app").collect();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].target.as_deref(), Some("small"));
}

#[test]
fn test_node_filter_demotes_default_directive() {
    let parser = ToscaParser::new();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_2
node_types:
  test.Compute:
    derived_from: tosca.nodes.Root
    properties:
      num_cpus:
        type: integer
  test.App:
    derived_from: tosca.nodes.Root
    requirements:
      - req1:
          relationship: tosca.relationships.DependsOn
topology_template:
  node_templates:
    app:
      type: test.App
      requirements:
        - req1:
            node: test.Compute
            node_filter:
              properties:
                - num_cpus: {in_range: [1, 4]}
    fallback:
      type: test.Compute
      directives: [default]
      properties:
        num_cpus: 2
    preferred:
      type: test.Compute
      properties:
        num_cpus: 3
"#,
    );
    let model = parser.parse_tree(&document, None, None).expect("parses");
    let bound: Vec<_> = model.topology.node_relationships("app").collect();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].target.as_deref(), Some("preferred"));
}

#[test]
fn test_ambiguous_node_filter_is_an_error() {
    let parser = lenient_parser();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_2
node_types:
  test.Compute:
    derived_from: tosca.nodes.Root
    properties:
      num_cpus:
        type: integer
  test.App:
    derived_from: tosca.nodes.Root
    requirements:
      - req1:
          relationship: tosca.relationships.DependsOn
topology_template:
  node_templates:
    app:
      type: test.App
      requirements:
        - req1:
            node: test.Compute
            node_filter:
              properties:
                - num_cpus: {in_range: [1, 4]}
    one:
      type: test.Compute
      properties:
        num_cpus: 2
    two:
      type: test.Compute
      properties:
        num_cpus: 3
"#,
    );
    let model = parser.parse_tree(&document, None, None).expect("lenient parse");
    assert!(model
        .errors
        .iter()
        .any(|line| line.contains("ambiguous")));
}

#[test]
fn test_pattern_constraint_end_to_end() {
    let template = |value: &str| {
        parse_map(&format!(
            r#"
tosca_definitions_version: tosca_simple_yaml_1_3
node_types:
  test.Named:
    derived_from: tosca.nodes.Root
    properties:
      label:
        type: string
        constraints:
          - pattern: "^[a-z]+$"
topology_template:
  node_templates:
    named:
      type: test.Named
      properties:
        label: {value}
"#
        ))
    };
    let parser = lenient_parser();
    let rejected = parser
        .parse_tree(&template("abc1"), None, None)
        .expect("lenient parse");
    assert_eq!(rejected.errors.len(), 1, "{:?}", rejected.errors);
    assert!(rejected.errors[0].contains("pattern"));

    let accepted = parser
        .parse_tree(&template("abc"), None, None)
        .expect("lenient parse");
    assert!(accepted.errors.is_empty(), "{:?}", accepted.errors);
}

#[test]
fn test_prefixed_import_resolves_types() {
    let dir = TempDir::new().expect("temp dir");
    let types_path = dir.path().join("types.yaml");
    fs::write(
        &types_path,
        r#"
tosca_definitions_version: tosca_simple_yaml_1_3
node_types:
  X:
    derived_from: tosca.nodes.Root
    properties:
      flavor:
        type: string
        default: plain
"#,
    )
    .expect("writes");
    let main_path = dir.path().join("service.yaml");
    fs::write(
        &main_path,
        r#"
tosca_definitions_version: tosca_simple_yaml_1_3
imports:
  - file: types.yaml
    namespace_prefix: ext
topology_template:
  node_templates:
    instance:
      type: ext.X
"#,
    )
    .expect("writes");

    let parser = ToscaParser::new();
    let model = parser.parse_file(&main_path, None).expect("parses");
    let instance = &model.topology.node_templates["instance"];
    assert_eq!(instance.type_name(), Some("ext.X"));
    let type_def = instance.template.type_definition.as_ref().expect("typed");
    assert_eq!(
        type_def.global_name(),
        format!("X@{}", types_path.to_string_lossy())
    );
    assert_eq!(
        instance.template.property_value("flavor"),
        Some(&Value::String("plain".into()))
    );
}

#[test]
fn test_missing_required_input() {
    let parser = lenient_parser();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_0
topology_template:
  inputs:
    cpus:
      type: integer
"#,
    );
    let model = parser.parse_tree(&document, None, None).expect("lenient parse");
    assert!(model
        .errors
        .iter()
        .any(|line| line.contains("cpus")));

    // supplying the parameter clears the error
    let mut params = Mapping::new();
    params.insert("cpus".into(), Value::Integer(4));
    let model = parser
        .parse_tree(&document, Some(&params), None)
        .expect("lenient parse");
    assert!(model.errors.is_empty(), "{:?}", model.errors);
}

#[test]
fn test_aggregate_raises_with_verify_on() {
    let parser = ToscaParser::new();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_0
topology_template:
  node_templates:
    volume:
      type: tosca.nodes.BlockStorage
"#,
    );
    let err = parser.parse_tree(&document, None, None).unwrap_err();
    let display = err.to_string();
    assert!(display.contains("failed validation"));
    assert!(display.contains("size"));
}

#[test]
fn test_parse_is_idempotent() {
    let parser = ToscaParser::new();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_0
topology_template:
  node_templates:
    db:
      type: tosca.nodes.Database
      properties:
        name: content
      requirements:
        - host: dbms
    dbms:
      type: tosca.nodes.DBMS
"#,
    );
    let first = parser.parse_tree(&document, None, None).expect("parses");
    let second = parser.parse_tree(&document, None, None).expect("parses");

    let shape = |model: &tosca_parser::ToscaTemplate| {
        let mut nodes: Vec<(String, Option<String>)> = Vec::new();
        for (name, node) in &model.topology.node_templates {
            nodes.push((name.clone(), node.type_name().map(str::to_string)));
        }
        let mut relationships: Vec<(Option<String>, Option<String>, Option<String>)> = Vec::new();
        for relationship in &model.topology.relationships {
            relationships.push((
                relationship.source.clone(),
                relationship.target.clone(),
                relationship.type_name().map(str::to_string),
            ));
        }
        (nodes, relationships, model.errors.clone())
    };
    assert_eq!(shape(&first), shape(&second));
}

#[test]
fn test_outputs_groups_policies_workflows() {
    let parser = ToscaParser::new();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_3
topology_template:
  node_templates:
    server:
      type: tosca.nodes.Compute
    other:
      type: tosca.nodes.Compute
  outputs:
    address:
      value: {get_attribute: [server, private_address]}
  groups:
    machines:
      type: tosca.groups.Root
      members: [server, other]
  policies:
    - keep_together:
        type: tosca.policies.Placement
        targets: [machines]
  workflows:
    start_all:
      steps:
        start_server:
          target: server
          activities:
            - call_operation: Standard.start
"#,
    );
    let model = parser.parse_tree(&document, None, None).expect("parses");
    assert_eq!(model.outputs().len(), 1);
    assert_eq!(model.groups()["machines"].members, vec!["server", "other"]);
    assert_eq!(model.policies().len(), 1);
    assert_eq!(
        model.policies()[0].targets_type,
        tosca_parser::templates::policy::PolicyTargets::Groups
    );
    assert_eq!(model.workflows()["start_all"].steps.len(), 1);
}

#[test]
fn test_substitution_wiring() {
    let dir = TempDir::new().expect("temp dir");
    let nested_path = dir.path().join("db-topology.yaml");
    fs::write(
        &nested_path,
        r#"
tosca_definitions_version: tosca_simple_yaml_1_3
node_types:
  example.Database:
    derived_from: tosca.nodes.Root
    properties:
      port:
        type: integer
        required: false
topology_template:
  inputs:
    port:
      type: integer
      default: 5432
  node_templates:
    inner_db:
      type: tosca.nodes.DBMS
  substitution_mappings:
    node_type: example.Database
    properties:
      port: [port]
"#,
    )
    .expect("writes");
    let main_path = dir.path().join("service.yaml");
    fs::write(
        &main_path,
        r#"
tosca_definitions_version: tosca_simple_yaml_1_3
imports:
  - db-topology.yaml
topology_template:
  node_templates:
    db:
      type: example.Database
      directives: [substitute]
"#,
    )
    .expect("writes");

    let parser = ToscaParser::new();
    let model = parser.parse_file(&main_path, None).expect("parses");
    assert_eq!(model.nested_topologies.len(), 1);
    let db = &model.topology.node_templates["db"];
    let nested_key = db.substitution.as_deref().expect("wired to the nested topology");
    let nested = &model.nested_topologies[nested_key];
    assert_eq!(nested.exposed_node_type(), Some("example.Database"));
    assert!(nested.substitution_mappings.as_ref().unwrap().properties.contains_key("port"));
}

#[test]
fn test_scalar_unit_capability_constraints() {
    let parser = lenient_parser();
    let document = parse_map(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_3
topology_template:
  node_templates:
    server:
      type: tosca.nodes.Compute
      capabilities:
        host:
          properties:
            mem_size: 4 GB
            cpu_frequency: 0.05 GHz
"#,
    );
    let model = parser.parse_tree(&document, None, None).expect("lenient parse");
    // mem_size passes; cpu_frequency violates greater_or_equal 0.1 GHz
    assert_eq!(model.errors.len(), 1, "{:?}", model.errors);
    assert!(model.errors[0].contains("cpu_frequency") || model.errors[0].contains("greater_or_equal"));
}
