use breadflow::dsl::builder::DiagramBuilder;
use breadflow::dsl::{NodeType, Target};
use std::collections::BTreeMap;

#[test]
fn test_builder_declares_nodes_in_order() {
    let diagram = DiagramBuilder::new("order")
        .name("Order handling")
        .action("pay")
        .label("Pay the invoice")
        .auto_decision("ship", &["post", "pickup"], "\"post\"")
        .join("together")
        .build();

    assert_eq!(diagram.id, "order");
    assert_eq!(diagram.name, "Order handling");
    let ids: Vec<_> = diagram.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["pay", "ship", "together"]);

    assert_eq!(diagram.nodes[0].label.as_deref(), Some("Pay the invoice"));
    assert_eq!(diagram.nodes[1].label, None);
    assert_eq!(
        diagram.nodes[1].kind,
        NodeType::Decision {
            choices: vec!["post".to_string(), "pickup".to_string()],
            auto: Some("\"post\"".to_string()),
        }
    );
    assert_eq!(diagram.nodes[2].kind, NodeType::Join);
}

#[test]
fn test_name_defaults_to_id() {
    let diagram = DiagramBuilder::new("plain").build();
    assert_eq!(diagram.name, "plain");
    assert!(diagram.nodes.is_empty());
    assert!(diagram.transitions.is_empty());
}

#[test]
fn test_builder_transition_shapes() {
    let diagram = DiagramBuilder::new("shapes")
        .connect("a", "b")
        .terminate("b")
        .parallel("c", &["d", "e"])
        .choose("f")
            .when("yes", "g")
            .end_when("no")
            .build()
        .build();

    let targets: Vec<_> = diagram.transitions.iter().map(|t| t.target.clone()).collect();
    let mut choices = BTreeMap::new();
    choices.insert("yes".to_string(), Some("g".to_string()));
    choices.insert("no".to_string(), None);
    assert_eq!(
        targets,
        vec![
            Target::Node(Some("b".to_string())),
            Target::Node(None),
            Target::Parallel(vec![Some("d".to_string()), Some("e".to_string())]),
            Target::Choices(choices),
        ]
    );
    assert_eq!(diagram.transitions[3].source, "f");
}
