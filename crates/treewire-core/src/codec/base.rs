//! Codec for the base-language node catalog.
//!
//! One `visit` pair per node kind, each walking the kind's fields in the
//! canonical order: prefix, markers, kind-specific fields in declaration
//! order, resolved type reference. Mechanical by design; the generic
//! engine lives in `crate::engine`.

use crate::codec::{CodecRegistry, NodeCodec};
use crate::engine::{NodeHeader, ReceiveQueue, SendQueue};
use crate::error::{RemotingError, Result};
use crate::tree::{
    Assignment, Block, Call, Identifier, Literal, SourceFile, Tree,
};
use std::sync::Arc;

/// Encode/decode for every base-language kind.
pub struct BaseCodec;

impl NodeCodec for BaseCodec {
    fn send(&self, before: Option<&Tree>, after: &Tree, q: &mut SendQueue<'_>) -> Result<()> {
        match after {
            Tree::SourceFile(a) => send_source_file(before_source_file(before)?, a, q),
            Tree::Block(a) => send_block(before_block(before)?, a, q),
            Tree::Identifier(a) => send_identifier(before_identifier(before)?, a, q),
            Tree::Literal(a) => send_literal(before_literal(before)?, a, q),
            Tree::Call(a) => send_call(before_call(before)?, a, q),
            Tree::Assignment(a) => send_assignment(before_assignment(before)?, a, q),
            Tree::Ext(n) => Err(RemotingError::UnknownKind {
                kind: n.kind().to_string(),
                registry: "base".to_string(),
            }),
        }
    }

    fn receive(
        &self,
        header: NodeHeader,
        before: Option<&Tree>,
        q: &mut ReceiveQueue<'_>,
    ) -> Result<Tree> {
        match header.kind.as_str() {
            SourceFile::KIND => {
                receive_source_file(header, before_source_file(before)?, q).map(Tree::SourceFile)
            }
            Block::KIND => receive_block(header, before_block(before)?, q).map(Tree::Block),
            Identifier::KIND => {
                receive_identifier(header, before_identifier(before)?, q).map(Tree::Identifier)
            }
            Literal::KIND => receive_literal(header, before_literal(before)?, q).map(Tree::Literal),
            Call::KIND => receive_call(header, before_call(before)?, q).map(Tree::Call),
            Assignment::KIND => {
                receive_assignment(header, before_assignment(before)?, q).map(Tree::Assignment)
            }
            other => Err(RemotingError::UnknownKind {
                kind: other.to_string(),
                registry: "base".to_string(),
            }),
        }
    }
}

/// The shared base registry, one codec registration per base kind.
pub fn base_registry() -> Arc<CodecRegistry> {
    let mut registry = CodecRegistry::new("base");
    let codec: Arc<dyn NodeCodec> = Arc::new(BaseCodec);
    for kind in [
        SourceFile::KIND,
        Block::KIND,
        Identifier::KIND,
        Literal::KIND,
        Call::KIND,
        Assignment::KIND,
    ] {
        registry.register(kind, codec.clone());
    }
    Arc::new(registry)
}

fn kind_mismatch(expected: &str, found: &Tree) -> RemotingError {
    RemotingError::desync(format!(
        "expected a {expected} before value, found {}",
        found.kind()
    ))
}

fn before_source_file(before: Option<&Tree>) -> Result<Option<&SourceFile>> {
    match before {
        None => Ok(None),
        Some(Tree::SourceFile(n)) => Ok(Some(n)),
        Some(other) => Err(kind_mismatch(SourceFile::KIND, other)),
    }
}

fn before_block(before: Option<&Tree>) -> Result<Option<&Block>> {
    match before {
        None => Ok(None),
        Some(Tree::Block(n)) => Ok(Some(n)),
        Some(other) => Err(kind_mismatch(Block::KIND, other)),
    }
}

fn before_identifier(before: Option<&Tree>) -> Result<Option<&Identifier>> {
    match before {
        None => Ok(None),
        Some(Tree::Identifier(n)) => Ok(Some(n)),
        Some(other) => Err(kind_mismatch(Identifier::KIND, other)),
    }
}

fn before_literal(before: Option<&Tree>) -> Result<Option<&Literal>> {
    match before {
        None => Ok(None),
        Some(Tree::Literal(n)) => Ok(Some(n)),
        Some(other) => Err(kind_mismatch(Literal::KIND, other)),
    }
}

fn before_call(before: Option<&Tree>) -> Result<Option<&Call>> {
    match before {
        None => Ok(None),
        Some(Tree::Call(n)) => Ok(Some(n)),
        Some(other) => Err(kind_mismatch(Call::KIND, other)),
    }
}

fn before_assignment(before: Option<&Tree>) -> Result<Option<&Assignment>> {
    match before {
        None => Ok(None),
        Some(Tree::Assignment(n)) => Ok(Some(n)),
        Some(other) => Err(kind_mismatch(Assignment::KIND, other)),
    }
}

fn send_source_file(b: Option<&SourceFile>, a: &SourceFile, q: &mut SendQueue<'_>) -> Result<()> {
    q.space(b.map(|x| &x.prefix), &a.prefix)?;
    q.markers(b.map(|x| &x.markers), &a.markers)?;
    q.scalar(b.map(|x| &x.source_path), &a.source_path)?;
    q.tree_list(b.map(|x| x.statements.as_slice()), &a.statements)?;
    q.space(b.map(|x| &x.eof), &a.eof)
}

fn receive_source_file(
    header: NodeHeader,
    b: Option<&SourceFile>,
    q: &mut ReceiveQueue<'_>,
) -> Result<SourceFile> {
    let prefix = q.space(b.map(|x| &x.prefix))?;
    let markers = q.markers(b.map(|x| &x.markers))?;
    let source_path = q.scalar(b.map(|x| &x.source_path), "source_file.source_path")?;
    let statements = q.tree_list(b.map(|x| x.statements.as_slice()))?;
    let eof = q.space(b.map(|x| &x.eof))?;
    Ok(SourceFile {
        id: header.id,
        prefix,
        markers,
        source_path,
        statements,
        eof,
    })
}

fn send_block(b: Option<&Block>, a: &Block, q: &mut SendQueue<'_>) -> Result<()> {
    q.space(b.map(|x| &x.prefix), &a.prefix)?;
    q.markers(b.map(|x| &x.markers), &a.markers)?;
    q.tree_list(b.map(|x| x.statements.as_slice()), &a.statements)?;
    q.space(b.map(|x| &x.end), &a.end)
}

fn receive_block(header: NodeHeader, b: Option<&Block>, q: &mut ReceiveQueue<'_>) -> Result<Block> {
    let prefix = q.space(b.map(|x| &x.prefix))?;
    let markers = q.markers(b.map(|x| &x.markers))?;
    let statements = q.tree_list(b.map(|x| x.statements.as_slice()))?;
    let end = q.space(b.map(|x| &x.end))?;
    Ok(Block {
        id: header.id,
        prefix,
        markers,
        statements,
        end,
    })
}

fn send_identifier(b: Option<&Identifier>, a: &Identifier, q: &mut SendQueue<'_>) -> Result<()> {
    q.space(b.map(|x| &x.prefix), &a.prefix)?;
    q.markers(b.map(|x| &x.markers), &a.markers)?;
    q.scalar(b.map(|x| &x.name), &a.name)?;
    q.opt_reference(b.map(|x| &x.type_ref), &a.type_ref)
}

fn receive_identifier(
    header: NodeHeader,
    b: Option<&Identifier>,
    q: &mut ReceiveQueue<'_>,
) -> Result<Identifier> {
    let prefix = q.space(b.map(|x| &x.prefix))?;
    let markers = q.markers(b.map(|x| &x.markers))?;
    let name = q.scalar(b.map(|x| &x.name), "identifier.name")?;
    let type_ref = q.opt_reference(b.map(|x| &x.type_ref))?;
    Ok(Identifier {
        id: header.id,
        prefix,
        markers,
        name,
        type_ref,
    })
}

fn send_literal(b: Option<&Literal>, a: &Literal, q: &mut SendQueue<'_>) -> Result<()> {
    q.space(b.map(|x| &x.prefix), &a.prefix)?;
    q.markers(b.map(|x| &x.markers), &a.markers)?;
    q.scalar(b.map(|x| &x.value_source), &a.value_source)?;
    q.opt_reference(b.map(|x| &x.type_ref), &a.type_ref)
}

fn receive_literal(
    header: NodeHeader,
    b: Option<&Literal>,
    q: &mut ReceiveQueue<'_>,
) -> Result<Literal> {
    let prefix = q.space(b.map(|x| &x.prefix))?;
    let markers = q.markers(b.map(|x| &x.markers))?;
    let value_source = q.scalar(b.map(|x| &x.value_source), "literal.value_source")?;
    let type_ref = q.opt_reference(b.map(|x| &x.type_ref))?;
    Ok(Literal {
        id: header.id,
        prefix,
        markers,
        value_source,
        type_ref,
    })
}

fn send_call(b: Option<&Call>, a: &Call, q: &mut SendQueue<'_>) -> Result<()> {
    q.space(b.map(|x| &x.prefix), &a.prefix)?;
    q.markers(b.map(|x| &x.markers), &a.markers)?;
    q.node(b.map(|x| x.callee.as_ref()), &a.callee)?;
    q.container(b.map(|x| &x.arguments), &a.arguments)?;
    q.opt_reference(b.map(|x| &x.type_ref), &a.type_ref)
}

fn receive_call(header: NodeHeader, b: Option<&Call>, q: &mut ReceiveQueue<'_>) -> Result<Call> {
    let prefix = q.space(b.map(|x| &x.prefix))?;
    let markers = q.markers(b.map(|x| &x.markers))?;
    let callee = q.node(b.map(|x| x.callee.as_ref()))?;
    let arguments = q.container(b.map(|x| &x.arguments))?;
    let type_ref = q.opt_reference(b.map(|x| &x.type_ref))?;
    Ok(Call {
        id: header.id,
        prefix,
        markers,
        callee: Box::new(callee),
        arguments,
        type_ref,
    })
}

fn send_assignment(b: Option<&Assignment>, a: &Assignment, q: &mut SendQueue<'_>) -> Result<()> {
    q.space(b.map(|x| &x.prefix), &a.prefix)?;
    q.markers(b.map(|x| &x.markers), &a.markers)?;
    q.node(b.map(|x| x.target.as_ref()), &a.target)?;
    q.left_padded_node(b.map(|x| x.value.as_ref()), &a.value)
}

fn receive_assignment(
    header: NodeHeader,
    b: Option<&Assignment>,
    q: &mut ReceiveQueue<'_>,
) -> Result<Assignment> {
    let prefix = q.space(b.map(|x| &x.prefix))?;
    let markers = q.markers(b.map(|x| &x.markers))?;
    let target = q.node(b.map(|x| x.target.as_ref()))?;
    let value = q.left_padded_node(b.map(|x| x.value.as_ref()))?;
    Ok(Assignment {
        id: header.id,
        prefix,
        markers,
        target: Box::new(target),
        value: Box::new(value),
    })
}
