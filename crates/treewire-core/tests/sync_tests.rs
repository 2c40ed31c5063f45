//! End-to-end diff engine tests: a sender-side cache and a receiver-side
//! cache exchange diff streams without any transport in between.

use treewire_core::codec::base_registry;
use treewire_core::engine::{DiffOp, ReceiveQueue, RemoteObjectCache, SendQueue};
use treewire_core::error::RemotingError;
use treewire_core::tree::{
    Assignment, Block, Call, Comment, Container, Identifier, LeftPadded, Literal, Marker,
    Reference, RightPadded, SourceFile, Space, Tree, TypeDescriptor,
};

fn padded(tree: Tree) -> RightPadded<Tree> {
    RightPadded::new(tree, Space::of("\n"))
}

/// A file exercising every base kind, formatting space, comments, markers
/// and a shared type reference.
fn rich_source_file() -> SourceFile {
    let string_type = Reference::new(TypeDescriptor::named("lang.String"));

    let mut target = Identifier::new("greeting");
    target.type_ref = Some(string_type.clone());

    let mut value = Literal::new("\"hello\"");
    value.prefix = Space::of(" ");
    value.type_ref = Some(string_type);

    let assignment = Assignment::new(
        Tree::Identifier(target),
        LeftPadded::new(Space::of(" "), Tree::Literal(value)),
    );

    let call = Call::new(
        Tree::Identifier(Identifier::new("print")),
        Container::new(
            Space::empty(),
            vec![RightPadded::new(
                Tree::Identifier(Identifier::new("greeting")),
                Space::empty(),
            )],
        ),
    );

    let mut block = Block::new(vec![padded(Tree::Call(call))]);
    block.prefix = Space {
        whitespace: "\n".into(),
        comments: vec![Comment::new("// entry point", "\n")],
    };
    block.markers = block.markers.with(Marker::provenance("demo-parser"));

    let mut file = SourceFile::new(
        "src/main.x",
        vec![padded(Tree::Assignment(assignment)), padded(Tree::Block(block))],
    );
    file.eof = Space::of("\n");
    file
}

#[test]
fn test_round_trip_preserves_everything() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let tree = Tree::SourceFile(rich_source_file());
    let events = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    let received = ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), events).unwrap();

    assert_eq!(received, tree);
}

#[test]
fn test_unchanged_tree_diffs_to_single_no_change() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let tree = Tree::SourceFile(rich_source_file());
    let first = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), first).unwrap();

    let second = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].op, DiffOp::NoChange);

    let received =
        ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), second).unwrap();
    assert_eq!(received, tree);
}

#[test]
fn test_single_scalar_edit_sends_exactly_one_payload() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();

    let before = Identifier::new("x");
    SendQueue::diff(&mut sender, &registry, &Tree::Identifier(before.clone())).unwrap();

    let mut after = before;
    after.name = "y".into();
    let events =
        SendQueue::diff(&mut sender, &registry, &Tree::Identifier(after)).unwrap();

    // Change node, NoChange prefix, NoChange markers, Change name,
    // NoChange type_ref.
    assert_eq!(events.len(), 5);
    let with_payload: Vec<_> = events.iter().filter(|e| e.payload.is_some()).collect();
    assert_eq!(with_payload.len(), 1);
    assert_eq!(with_payload[0].payload, Some(serde_json::json!("y")));
}

#[test]
fn test_deep_edit_collapses_unchanged_siblings() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let before = rich_source_file();
    let tree = Tree::SourceFile(before.clone());
    let first = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), first).unwrap();

    // Rewrite the literal inside the first statement, leaving the rest of
    // the file untouched.
    let mut after = before;
    if let Tree::Assignment(assignment) = &mut after.statements[0].element {
        if let Tree::Literal(literal) = &mut assignment.value.element {
            literal.value_source = Some("\"goodbye\"".into());
        }
    }
    let after_tree = Tree::SourceFile(after);

    let events = SendQueue::diff(&mut sender, &registry, &after_tree).unwrap();
    // The unchanged second statement collapses to a single slot event.
    let payloads = events.iter().filter(|e| e.payload.is_some()).count();
    assert!(payloads <= 3, "expected a near-minimal stream, got {events:#?}");

    let received =
        ReceiveQueue::apply(&mut receiver, &registry, Some(after_tree.id()), events).unwrap();
    assert_eq!(received, after_tree);
}

#[test]
fn test_list_edit_emits_delete_marker_and_add() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let a = Identifier::new("a");
    let b = Identifier::new("b");
    let c = Identifier::new("c");

    let mut file = SourceFile::new(
        "list.x",
        vec![
            padded(Tree::Identifier(a.clone())),
            padded(Tree::Identifier(b.clone())),
            padded(Tree::Identifier(c.clone())),
        ],
    );
    let tree = Tree::SourceFile(file.clone());
    let first = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), first).unwrap();

    // [a, b, c] -> [a, c, d]
    let d = Identifier::new("d");
    file.statements = vec![
        padded(Tree::Identifier(a.clone())),
        padded(Tree::Identifier(c.clone())),
        padded(Tree::Identifier(d.clone())),
    ];
    let after_tree = Tree::SourceFile(file);

    let events = SendQueue::diff(&mut sender, &registry, &after_tree).unwrap();

    let deletes: Vec<_> = events.iter().filter(|e| e.op == DiffOp::Delete).collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].reference, Some(b.id));

    // Kept elements travel as identity-referencing NoChange slots.
    assert!(events
        .iter()
        .any(|e| e.op == DiffOp::NoChange && e.reference == Some(a.id)));
    assert!(events
        .iter()
        .any(|e| e.op == DiffOp::NoChange && e.reference == Some(c.id)));

    let received =
        ReceiveQueue::apply(&mut receiver, &registry, Some(after_tree.id()), events).unwrap();
    assert_eq!(received, after_tree);
}

#[test]
fn test_shared_reference_payload_travels_once() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let int_type = Reference::new(TypeDescriptor::named("lang.Int"));
    let mut x = Identifier::new("x");
    x.type_ref = Some(int_type.clone());
    let mut y = Identifier::new("y");
    y.type_ref = Some(int_type.clone());
    let mut z = Identifier::new("z");
    z.type_ref = Some(int_type.clone());

    let file = SourceFile::new(
        "typed.x",
        vec![
            padded(Tree::Identifier(x)),
            padded(Tree::Identifier(y)),
            padded(Tree::Identifier(z)),
        ],
    );
    let tree = Tree::SourceFile(file);

    let events = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    let ref_events: Vec<_> = events
        .iter()
        .filter(|e| e.reference == Some(int_type.id()))
        .collect();
    assert_eq!(ref_events.len(), 3);
    assert_eq!(ref_events.iter().filter(|e| e.payload.is_some()).count(), 1);

    let received =
        ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), events).unwrap();

    // All three identifiers resolve to one shared allocation.
    let Tree::SourceFile(received) = received else {
        panic!("expected a source file");
    };
    let arcs: Vec<_> = received
        .statements
        .iter()
        .map(|s| match &s.element {
            Tree::Identifier(i) => i.type_ref.as_ref().unwrap().value_arc(),
            other => panic!("expected identifier, got {}", other.kind()),
        })
        .collect();
    assert!(std::sync::Arc::ptr_eq(&arcs[0], &arcs[1]));
    assert!(std::sync::Arc::ptr_eq(&arcs[0], &arcs[2]));
    assert_eq!(arcs[0].full_name, "lang.Int");
}

#[test]
fn test_reset_forces_full_retransmission() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();

    let tree = Tree::SourceFile(rich_source_file());
    SendQueue::diff(&mut sender, &registry, &tree).unwrap();

    let incremental = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    assert_eq!(incremental.len(), 1);

    sender.reset();
    let full = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    assert_eq!(full[0].op, DiffOp::Add);
    assert!(full.len() > 1);
}

#[test]
fn test_truncated_stream_is_a_desync() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let tree = Tree::SourceFile(rich_source_file());
    let mut events = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    events.truncate(events.len() / 2);

    let err =
        ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), events).unwrap_err();
    assert!(matches!(err, RemotingError::ProtocolDesync { .. }));
    assert!(err.requires_reset());
}

#[test]
fn test_trailing_events_are_a_desync() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let tree = Tree::Identifier(Identifier::new("x"));
    let mut events = SendQueue::diff(&mut sender, &registry, &tree).unwrap();
    events.push(treewire_core::engine::DiffEvent::no_change());

    let err =
        ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), events).unwrap_err();
    assert!(matches!(err, RemotingError::ProtocolDesync { .. }));
}

#[test]
fn test_incremental_change_without_prior_state_is_a_desync() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let tree = Tree::Identifier(Identifier::new("x"));
    SendQueue::diff(&mut sender, &registry, &tree).unwrap();

    let mut edited = match tree {
        Tree::Identifier(i) => i,
        _ => unreachable!(),
    };
    edited.name = "y".into();
    let edited = Tree::Identifier(edited);
    let events = SendQueue::diff(&mut sender, &registry, &edited).unwrap();

    // The receiver never saw the first snapshot, so the incremental stream
    // cannot be applied.
    let err =
        ReceiveQueue::apply(&mut receiver, &registry, Some(edited.id()), events).unwrap_err();
    assert!(matches!(err, RemotingError::ProtocolDesync { .. }));
}

#[test]
fn test_diff_streams_survive_json_transport() {
    let registry = base_registry();
    let mut sender = RemoteObjectCache::new();
    let mut receiver = RemoteObjectCache::new();

    let tree = Tree::SourceFile(rich_source_file());
    let events = SendQueue::diff(&mut sender, &registry, &tree).unwrap();

    let json = serde_json::to_string(&events).unwrap();
    let events: Vec<treewire_core::engine::DiffEvent> = serde_json::from_str(&json).unwrap();

    let received =
        ReceiveQueue::apply(&mut receiver, &registry, Some(tree.id()), events).unwrap();
    assert_eq!(received, tree);
}
