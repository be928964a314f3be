//! Binary graph codec.
//!
//! A graph stream is the [`Header`], the node section and the string-table
//! section, all little-endian:
//!
//! ```text
//! node record*      u32 id (0 ends the section), u16 kind,
//!                   attributes, edges (see below)
//! "STRTBL"          string-table marker (6 bytes)
//! string*           u32 key (0 ends the section), u32 length, UTF-8 bytes
//! ```
//!
//! Attributes follow the kind's linearised ancestor chain: for every kind in
//! the chain, its boolean attributes packed into bit fields (LSB first), then
//! its other attributes in declaration order (`i32` ints, `u8` enum variants,
//! `u32` string keys). Edges follow in layout order: a single edge is one id
//! (0 when unset), a multi edge is its ids followed by a 0 terminator.
//!
//! Loading rebuilds every edge through the arena's edge API, so a dangling
//! id, a target of the wrong kind, a node with two containers or a
//! containment cycle all fail the load with [`StorageError::CorruptGraph`].
//! Node ids and, when loading into a fresh table, string keys are preserved,
//! so save → load → save is byte-identical.
//!
//! Filter flags are a separate stream (`"ASGF"`, u32 slot count, packed
//! bits), written by [`save_filter`] and read by [`load_filter`].

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use asg_core::{
    Arena, ArenaConfig, AsgError, AttrDef, AttrId, AttrType, AttrValue, EdgeKind, Key, KeyRemap, Layout, NodeId,
    NodeKind, NodeRef, Schema, StringTable,
};

use crate::error::StorageError;
use crate::header::Header;

const STRTBL: &[u8; 6] = b"STRTBL";
const FILTER_MAGIC: &[u8; 4] = b"ASGF";

/// Highest node id the format accepts. The loader sizes the arena by the
/// largest id, so ids are bounded before anything is allocated.
pub const MAX_NODE_ID: u32 = 1 << 24;

// ---------------------------------------------------------------------------
// Layout helpers
// ---------------------------------------------------------------------------

/// Attributes declared by one kind of a layout's ancestor chain.
struct Segment<'s> {
    bools: Vec<&'s AttrDef>,
    rest: Vec<&'s AttrDef>,
}

fn segments<'s>(schema: &'s Schema, layout: &Layout) -> Vec<Segment<'s>> {
    layout
        .ancestors
        .iter()
        .map(|&owner| {
            let (bools, rest) = layout
                .attrs
                .iter()
                .filter_map(|&a| schema.attr(a))
                .filter(|def| def.owner == owner)
                .partition(|def| def.ty == AttrType::Bool);
            Segment { bools, rest }
        })
        .filter(|s| !s.bools.is_empty() || !s.rest.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Writes the whole arena, filtered nodes included.
///
/// Takes `&mut` because the string table's save marks are refreshed so that
/// exactly the strings referenced by live nodes are written.
pub fn save<W: Write>(arena: &mut Arena, w: &mut W) -> Result<(), StorageError> {
    arena.mark_referenced_strings();
    let arena = &*arena;
    let schema = arena.schema();

    Header::for_schema(schema).write(w)?;

    let mut count = 0usize;
    for node in arena.nodes() {
        if node.id().0 > MAX_NODE_ID {
            return Err(StorageError::corrupt(format!(
                "node id {} exceeds the limit of {MAX_NODE_ID}",
                node.id()
            )));
        }
        write_node(schema, node, w)?;
        count += 1;
    }
    w.write_u32::<LittleEndian>(0)?;

    w.write_all(STRTBL)?;
    let mut strings = 0usize;
    for (key, text) in arena.strings().marked() {
        w.write_u32::<LittleEndian>(key.0)?;
        w.write_u32::<LittleEndian>(text.len() as u32)?;
        w.write_all(text.as_bytes())?;
        strings += 1;
    }
    w.write_u32::<LittleEndian>(0)?;

    tracing::info!(schema = schema.name(), nodes = count, strings, "saved graph");
    Ok(())
}

fn write_node<W: Write>(schema: &Schema, node: NodeRef<'_>, w: &mut W) -> Result<(), StorageError> {
    let layout = schema
        .layout(node.kind())
        .ok_or_else(|| StorageError::corrupt(format!("node {} has no layout", node.id())))?;
    w.write_u32::<LittleEndian>(node.id().0)?;
    w.write_u16::<LittleEndian>(node.kind().0)?;

    for segment in segments(schema, layout) {
        for chunk in segment.bools.chunks(8) {
            let mut bits = 0u8;
            for (i, def) in chunk.iter().enumerate() {
                if node.bool_attr(def.id) == Some(true) {
                    bits |= 1 << i;
                }
            }
            w.write_u8(bits)?;
        }
        for def in segment.rest {
            match node.attr(def.id) {
                Some(AttrValue::Int(v)) => w.write_i32::<LittleEndian>(v)?,
                Some(AttrValue::Enum(v)) => w.write_u8(v)?,
                Some(AttrValue::Str(key)) => w.write_u32::<LittleEndian>(key.0)?,
                Some(AttrValue::Bool(_)) | None => {
                    return Err(StorageError::corrupt(format!(
                        "node {} attribute '{}' does not match its declaration",
                        node.id(),
                        def.name
                    )))
                }
            }
        }
    }

    for &edge in &layout.edges {
        let targets = node.raw_targets(edge);
        let multi = schema.edge(edge).is_some_and(|def| def.is_multi());
        if multi {
            for target in targets {
                w.write_u32::<LittleEndian>(target.0)?;
            }
            w.write_u32::<LittleEndian>(0)?;
        } else {
            w.write_u32::<LittleEndian>(targets.first().map_or(0, |t| t.0))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Node record as read from the stream, before it is rebuilt in an arena.
struct Record {
    id: NodeId,
    kind: NodeKind,
    attrs: Vec<(AttrId, AttrValue)>,
    edges: Vec<(EdgeKind, bool, Vec<NodeId>)>,
}

/// Reads only the header of a graph stream.
pub fn read_header<R: Read>(r: &mut R) -> Result<Header, StorageError> {
    Header::read(r)
}

/// Loads a graph into a fresh arena, preserving node ids and string keys.
pub fn load<R: Read>(r: &mut R, schema: Arc<Schema>) -> Result<Arena, StorageError> {
    load_with_config(r, schema, ArenaConfig::default())
}

pub fn load_with_config<R: Read>(r: &mut R, schema: Arc<Schema>, config: ArenaConfig) -> Result<Arena, StorageError> {
    let (arena, _) = load_graph(r, schema, config, None)?;
    Ok(arena)
}

/// Loads a graph whose strings go into `table`, which may already hold the
/// strings of other graphs. Returns the arena and the saved-key → table-key
/// mapping.
pub fn load_into_table<R: Read>(
    r: &mut R,
    schema: Arc<Schema>,
    table: StringTable,
) -> Result<(Arena, KeyRemap), StorageError> {
    load_graph(r, schema, ArenaConfig::default(), Some(table))
}

fn load_graph<R: Read>(
    r: &mut R,
    schema: Arc<Schema>,
    config: ArenaConfig,
    table: Option<StringTable>,
) -> Result<(Arena, KeyRemap), StorageError> {
    let header = Header::read(r)?;
    header.check(&schema)?;

    let records = read_records(r, &schema)?;
    let strings = read_strings(r)?;

    let mut arena = Arena::with_config(schema, config);
    if let Some(table) = table {
        arena.swap_string_table(table);
    }
    let mut remap = KeyRemap::new();
    for (key, text) in &strings {
        arena.restore_string(*key, text, &mut remap);
    }

    for record in &records {
        arena.create_with_id(record.id, record.kind).map_err(rebuild)?;
    }
    for record in &records {
        for &(attr, value) in &record.attrs {
            let value = match value {
                AttrValue::Str(key) => AttrValue::Str(remap.get(key).ok_or_else(|| {
                    StorageError::corrupt(format!("node {} uses unknown string key {key}", record.id))
                })?),
                other => other,
            };
            arena.set_attr(record.id, attr, value).map_err(rebuild)?;
        }
    }
    for record in &records {
        for (edge, multi, targets) in &record.edges {
            let containment = arena.schema().edge(*edge).is_some_and(|def| def.is_containment());
            for &target in targets {
                if containment && arena.parent(target).is_some() {
                    return Err(StorageError::corrupt(format!("node {target} has two containers")));
                }
                let linked = if *multi {
                    arena.add_edge(record.id, *edge, target)
                } else {
                    arena.set_edge(record.id, *edge, target)
                };
                linked.map_err(rebuild)?;
            }
        }
    }

    tracing::info!(
        schema = arena.schema().name(),
        nodes = records.len(),
        strings = strings.len(),
        remapped = !remap.is_identity(),
        "loaded graph"
    );
    Ok((arena, remap))
}

fn rebuild(err: AsgError) -> StorageError {
    StorageError::corrupt(err.to_string())
}

fn read_records<R: Read>(r: &mut R, schema: &Schema) -> Result<Vec<Record>, StorageError> {
    let mut records = Vec::new();
    let mut last = 0u32;
    loop {
        let id = r.read_u32::<LittleEndian>().map_err(StorageError::from_read)?;
        if id == 0 {
            break;
        }
        if id <= last {
            return Err(StorageError::corrupt(format!("node id {id} follows {last}")));
        }
        if id > MAX_NODE_ID {
            return Err(StorageError::corrupt(format!("node id {id} exceeds the limit of {MAX_NODE_ID}")));
        }
        last = id;
        let kind = NodeKind(r.read_u16::<LittleEndian>().map_err(StorageError::from_read)?);
        let layout = schema
            .layout(kind)
            .ok_or_else(|| StorageError::corrupt(format!("node {id} has unknown kind {kind}")))?;
        records.push(read_record(r, schema, layout, NodeId(id), kind)?);
    }
    Ok(records)
}

fn read_record<R: Read>(
    r: &mut R,
    schema: &Schema,
    layout: &Layout,
    id: NodeId,
    kind: NodeKind,
) -> Result<Record, StorageError> {
    let mut attrs = Vec::with_capacity(layout.attrs.len());
    for segment in segments(schema, layout) {
        for chunk in segment.bools.chunks(8) {
            let bits = r.read_u8().map_err(StorageError::from_read)?;
            for (i, def) in chunk.iter().enumerate() {
                attrs.push((def.id, AttrValue::Bool(bits & (1 << i) != 0)));
            }
        }
        for def in segment.rest {
            let value = match def.ty {
                AttrType::Int => AttrValue::Int(r.read_i32::<LittleEndian>().map_err(StorageError::from_read)?),
                AttrType::Enum(_) => AttrValue::Enum(r.read_u8().map_err(StorageError::from_read)?),
                AttrType::Str => AttrValue::Str(Key(r.read_u32::<LittleEndian>().map_err(StorageError::from_read)?)),
                AttrType::Bool => continue,
            };
            attrs.push((def.id, value));
        }
    }

    let mut edges = Vec::with_capacity(layout.edges.len());
    for &edge in &layout.edges {
        let multi = schema.edge(edge).is_some_and(|def| def.is_multi());
        let mut targets = Vec::new();
        if multi {
            loop {
                let target = r.read_u32::<LittleEndian>().map_err(StorageError::from_read)?;
                if target == 0 {
                    break;
                }
                targets.push(NodeId(target));
            }
        } else {
            let target = r.read_u32::<LittleEndian>().map_err(StorageError::from_read)?;
            if target != 0 {
                targets.push(NodeId(target));
            }
        }
        if !targets.is_empty() {
            edges.push((edge, multi, targets));
        }
    }

    Ok(Record { id, kind, attrs, edges })
}

fn read_strings<R: Read>(r: &mut R) -> Result<Vec<(Key, String)>, StorageError> {
    let mut marker = [0u8; 6];
    r.read_exact(&mut marker).map_err(StorageError::from_read)?;
    if &marker != STRTBL {
        return Err(StorageError::corrupt("missing string table"));
    }
    let mut strings = Vec::new();
    let mut seen = HashSet::new();
    loop {
        let key = r.read_u32::<LittleEndian>().map_err(StorageError::from_read)?;
        if key == 0 {
            break;
        }
        if key == u32::MAX {
            return Err(StorageError::corrupt(format!("string key {key} is reserved")));
        }
        if !seen.insert(key) {
            return Err(StorageError::corrupt(format!("string key {key} appears twice")));
        }
        let len = r.read_u32::<LittleEndian>().map_err(StorageError::from_read)?;
        let mut bytes = Vec::new();
        r.by_ref()
            .take(u64::from(len))
            .read_to_end(&mut bytes)
            .map_err(StorageError::from_read)?;
        if bytes.len() != len as usize {
            return Err(StorageError::corrupt("unexpected end of data"));
        }
        let text = String::from_utf8(bytes)
            .map_err(|_| StorageError::corrupt(format!("string {key} is not UTF-8")))?;
        strings.push((Key(key), text));
    }
    Ok(strings)
}

// ---------------------------------------------------------------------------
// Filter stream
// ---------------------------------------------------------------------------

/// Writes the arena's filter flags.
pub fn save_filter<W: Write>(arena: &Arena, w: &mut W) -> Result<(), StorageError> {
    let flags = arena.filter_state();
    w.write_all(FILTER_MAGIC)?;
    w.write_u32::<LittleEndian>(flags.len() as u32)?;
    for chunk in flags.chunks(8) {
        let bits = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &flag)| if flag { acc | (1 << i) } else { acc });
        w.write_u8(bits)?;
    }
    Ok(())
}

/// Restores filter flags written by [`save_filter`] for the same graph.
pub fn load_filter<R: Read>(arena: &mut Arena, r: &mut R) -> Result<(), StorageError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(StorageError::from_read)?;
    if &magic != FILTER_MAGIC {
        return Err(StorageError::corrupt("not a filter stream"));
    }
    let count = r.read_u32::<LittleEndian>().map_err(StorageError::from_read)? as usize;
    if count != arena.slot_count() {
        return Err(StorageError::corrupt(format!(
            "filter covers {count} nodes, graph has {}",
            arena.slot_count()
        )));
    }
    let mut bytes = vec![0u8; count.div_ceil(8)];
    r.read_exact(&mut bytes).map_err(StorageError::from_read)?;
    let flags: Vec<bool> = (0..count).map(|i| bytes[i / 8] & (1 << (i % 8)) != 0).collect();
    arena.load_filter_state(&flags)?;
    tracing::debug!(filtered = flags.iter().filter(|&&f| f).count(), "loaded filter");
    Ok(())
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub fn save_file(arena: &mut Arena, path: impl AsRef<Path>) -> Result<(), StorageError> {
    let mut w = BufWriter::new(File::create(path)?);
    save(arena, &mut w)?;
    w.flush()?;
    Ok(())
}

pub fn load_file(path: impl AsRef<Path>, schema: Arc<Schema>) -> Result<Arena, StorageError> {
    let mut r = BufReader::new(File::open(path)?);
    load(&mut r, schema)
}

pub fn read_file_header(path: impl AsRef<Path>) -> Result<Header, StorageError> {
    let mut r = BufReader::new(File::open(path)?);
    read_header(&mut r)
}
