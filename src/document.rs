//! JSON graph documents.
//!
//! A document lists `bounds`, `points`, `paths` and `groups`. Positive ids
//! are identities assigned upstream; negative ids are local placeholders that
//! are only unique per kind within one document. References inside paths and
//! groups use those same ids.
//!
//! ```json
//! {
//!   "points": [{ "id": 1, "version": 3, "lat": 51.5, "lon": -0.1 }],
//!   "paths": [{ "id": -1, "points": [1, -2], "tags": { "highway": "path" } }],
//!   "groups": [{ "id": 7, "version": 1, "members": [{ "kind": "path", "ref": -1, "role": "outer" }] }]
//! }
//! ```
//!
//! Decoding rejects id 0, duplicate ids, points with only one of `lat` and
//! `lon`, and references to ids the document does not define. Encoding
//! numbers unassigned primitives `-1, -2, ...` per kind in arena order.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use geomerge_core::model::{
    Body, Bounds, Graph, Identity, LatLon, Member, Primitive, PrimitiveKind, PrimitiveRef, Tags,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Attributes shared by every record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Positive: assigned upstream. Negative: local placeholder.
    pub id: i64,
    /// Upstream revision.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: u64,
    /// Upstream visibility; `true` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Local deletion intent.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    /// Local edit intent. Defaults to `true` for local placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<bool>,
    /// Only the identity is known.
    #[serde(default, skip_serializing_if = "is_false")]
    pub incomplete: bool,
    /// Semantic attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    /// Last upstream editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Last upstream edit, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// A point record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// A path record; `points` lists point ids in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub points: Vec<i64>,
}

/// One group member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub kind: PrimitiveKind,
    #[serde(rename = "ref")]
    pub id: i64,
    #[serde(default)]
    pub role: String,
}

/// A group record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
}

/// Serialized form of a [`Graph`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounds: Vec<Bounds>,
    #[serde(default)]
    pub points: Vec<PointRecord>,
    #[serde(default)]
    pub paths: Vec<PathRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(b: &bool) -> bool {
    !*b
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &u64) -> bool {
    *n == 0
}

// ---------------------------------------------------------------------------
// DocumentError
// ---------------------------------------------------------------------------

/// A document could not be read, parsed or turned into a graph.
#[derive(Debug)]
pub struct DocumentError {
    /// File being read or written, when there is one.
    pub path: Option<PathBuf>,
    /// What went wrong.
    pub message: String,
}

impl DocumentError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
        }
    }

    fn at(mut self, path: &Path) -> Self {
        self.path = Some(path.to_owned());
        self
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "document error: {}", self.message)
        }
    }
}

impl std::error::Error for DocumentError {}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

impl GraphDocument {
    /// Parse a document from JSON text.
    ///
    /// # Errors
    /// Returns `DocumentError` with line and column on malformed JSON.
    pub fn parse(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| {
            DocumentError::new(format!("line {} column {}: {e}", e.line(), e.column()))
        })
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    /// Fails only if a tag map cannot be serialized, which serde_json never
    /// does for string maps.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::new(e.to_string()))
    }

    /// Build a graph. Local placeholders become unassigned primitives.
    ///
    /// # Errors
    /// Rejects id 0, duplicate ids within a kind, points with half a
    /// coordinate and references to ids the document does not define.
    pub fn into_graph(self) -> Result<Graph, DocumentError> {
        let mut graph = Graph::new();
        let mut ids: HashMap<(PrimitiveKind, i64), PrimitiveRef> = HashMap::new();

        check_ids(PrimitiveKind::Point, self.points.iter().map(|p| p.meta.id))?;
        check_ids(PrimitiveKind::Path, self.paths.iter().map(|p| p.meta.id))?;
        check_ids(PrimitiveKind::Group, self.groups.iter().map(|p| p.meta.id))?;

        for record in self.points {
            let id = record.meta.id;
            let coord = match (record.lat, record.lon) {
                (Some(lat), Some(lon)) => Some(LatLon::new(lat, lon)),
                (None, None) => None,
                _ => {
                    return Err(DocumentError::new(format!(
                        "point {id} has only one of lat and lon"
                    )));
                }
            };
            let p = with_meta(Primitive::point(identity(id), coord), record.meta);
            ids.insert((PrimitiveKind::Point, id), add(&mut graph, p)?);
        }

        for record in self.paths {
            let id = record.meta.id;
            let points = record
                .points
                .iter()
                .map(|&r| resolve(&ids, PrimitiveKind::Path, id, PrimitiveKind::Point, r))
                .collect::<Result<Vec<_>, _>>()?;
            let p = with_meta(Primitive::path(identity(id), points), record.meta);
            ids.insert((PrimitiveKind::Path, id), add(&mut graph, p)?);
        }

        // Groups may reference groups defined later (or themselves), so they
        // are inserted empty and filled in a second pass.
        let mut pending = Vec::with_capacity(self.groups.len());
        for record in self.groups {
            let id = record.meta.id;
            let p = with_meta(Primitive::group(identity(id), Vec::new()), record.meta);
            let handle = add(&mut graph, p)?;
            ids.insert((PrimitiveKind::Group, id), handle);
            pending.push((handle, id, record.members));
        }
        for (handle, id, records) in pending {
            let members = records
                .into_iter()
                .map(|m| {
                    let target = resolve(&ids, PrimitiveKind::Group, id, m.kind, m.id)?;
                    Ok(Member::new(m.role, target))
                })
                .collect::<Result<Vec<_>, DocumentError>>()?;
            if let Some(p) = graph.get_mut(handle) {
                p.body = Body::Group { members };
            }
        }

        for bounds in self.bounds {
            graph.add_bounds(bounds);
        }

        graph
            .validate()
            .map_err(|e| DocumentError::new(e.to_string()))?;
        Ok(graph)
    }
}

fn check_ids(kind: PrimitiveKind, ids: impl Iterator<Item = i64>) -> Result<(), DocumentError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id == 0 {
            return Err(DocumentError::new(format!("{kind} id 0 is not allowed")));
        }
        if !seen.insert(id) {
            return Err(DocumentError::new(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(())
}

fn identity(id: i64) -> Identity {
    u64::try_from(id).map_or(Identity::Unassigned, Identity::Assigned)
}

fn with_meta(mut p: Primitive, meta: RecordMeta) -> Primitive {
    p.version = meta.version;
    p.visible = meta.visible.unwrap_or(true);
    p.deleted = meta.deleted;
    p.modified = meta.modified.unwrap_or(meta.id < 0);
    p.incomplete = meta.incomplete;
    p.tags = meta.tags;
    p.user = meta.user;
    p.timestamp = meta.timestamp;
    p
}

fn add(graph: &mut Graph, p: Primitive) -> Result<PrimitiveRef, DocumentError> {
    graph.add(p).map_err(|e| DocumentError::new(e.to_string()))
}

fn resolve(
    ids: &HashMap<(PrimitiveKind, i64), PrimitiveRef>,
    from_kind: PrimitiveKind,
    from_id: i64,
    kind: PrimitiveKind,
    id: i64,
) -> Result<PrimitiveRef, DocumentError> {
    ids.get(&(kind, id)).copied().ok_or_else(|| {
        DocumentError::new(format!(
            "{from_kind} {from_id} references {kind} {id}, which is not defined"
        ))
    })
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

impl GraphDocument {
    /// Describe `graph` as a document.
    ///
    /// # Errors
    /// Fails if an assigned id does not fit in a signed 64-bit integer.
    pub fn from_graph(graph: &Graph) -> Result<Self, DocumentError> {
        let mut ids: HashMap<PrimitiveRef, i64> = HashMap::with_capacity(graph.len());
        let mut next_local: HashMap<PrimitiveKind, i64> = HashMap::new();
        for (handle, p) in graph.iter() {
            let id = match p.identity() {
                Identity::Assigned(id) => i64::try_from(id).map_err(|_| {
                    DocumentError::new(format!("{} id {id} is out of range", p.kind()))
                })?,
                Identity::Unassigned => {
                    let n = next_local.entry(p.kind()).or_insert(0);
                    *n -= 1;
                    *n
                }
            };
            ids.insert(handle, id);
        }
        let id_of = |r: PrimitiveRef| ids.get(&r).copied().unwrap_or_default();

        let mut doc = Self {
            bounds: graph.bounds().to_vec(),
            ..Self::default()
        };
        for (handle, p) in graph.iter() {
            let meta = meta_of(p, id_of(handle));
            match &p.body {
                Body::Point { coord } => doc.points.push(PointRecord {
                    meta,
                    lat: coord.map(|c| c.lat),
                    lon: coord.map(|c| c.lon),
                }),
                Body::Path { points } => doc.paths.push(PathRecord {
                    meta,
                    points: points.iter().map(|&r| id_of(r)).collect(),
                }),
                Body::Group { members } => doc.groups.push(GroupRecord {
                    meta,
                    members: members
                        .iter()
                        .map(|m| MemberRecord {
                            kind: m.target.kind(),
                            id: id_of(m.target),
                            role: m.role.clone(),
                        })
                        .collect(),
                }),
            }
        }
        Ok(doc)
    }
}

fn meta_of(p: &Primitive, id: i64) -> RecordMeta {
    RecordMeta {
        id,
        version: p.version,
        visible: (!p.visible).then_some(false),
        deleted: p.deleted,
        modified: (p.modified != p.is_new()).then_some(p.modified),
        incomplete: p.incomplete,
        tags: p.tags.clone(),
        user: p.user.clone(),
        timestamp: p.timestamp,
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Read and decode a graph document.
///
/// # Errors
/// Returns `DocumentError` (with the path attached) on I/O, JSON or
/// structural problems.
pub fn load_graph(path: &Path) -> Result<Graph, DocumentError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DocumentError::new(format!("could not read file: {e}")).at(path))?;
    GraphDocument::parse(&text)
        .and_then(GraphDocument::into_graph)
        .map_err(|e| e.at(path))
}

/// Encode and write a graph document.
///
/// # Errors
/// Returns `DocumentError` (with the path attached) on I/O or encoding
/// problems.
pub fn save_graph(path: &Path, graph: &Graph) -> Result<(), DocumentError> {
    let json = GraphDocument::from_graph(graph)
        .and_then(|doc| doc.to_json())
        .map_err(|e| e.at(path))?;
    std::fs::write(path, json + "\n")
        .map_err(|e| DocumentError::new(format!("could not write file: {e}")).at(path))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "bounds": [{ "min_lat": 0.0, "min_lon": 0.0, "max_lat": 1.0, "max_lon": 1.0 }],
        "points": [
            { "id": 1, "version": 2, "lat": 0.5, "lon": 0.5 },
            { "id": -1, "lat": 0.6, "lon": 0.6, "tags": { "amenity": "bench" } }
        ],
        "paths": [{ "id": 10, "version": 1, "points": [1, -1] }],
        "groups": [
            { "id": -1, "members": [{ "kind": "group", "ref": 20, "role": "sub" }] },
            { "id": 20, "version": 4, "members": [{ "kind": "path", "ref": 10, "role": "outer" }] }
        ]
    }"#;

    #[test]
    fn decodes_identities_references_and_flags() {
        let graph = GraphDocument::parse(SAMPLE).unwrap().into_graph().unwrap();
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.bounds().len(), 1);

        let p1 = graph.find(PrimitiveKind::Point, 1).unwrap();
        assert!(!graph.get(p1).unwrap().modified);

        let path = graph.get(graph.find(PrimitiveKind::Path, 10).unwrap()).unwrap();
        assert_eq!(path.points().len(), 2);
        assert_eq!(path.points()[0], p1);
        let local = graph.get(path.points()[1]).unwrap();
        assert!(local.is_new());
        assert!(local.modified);
        assert_eq!(local.tags.get("amenity").map(String::as_str), Some("bench"));

        let g20 = graph.find(PrimitiveKind::Group, 20).unwrap();
        let (_, outer) = graph
            .iter()
            .find(|(r, p)| r.kind() == PrimitiveKind::Group && p.is_new())
            .unwrap();
        assert_eq!(outer.members(), &[Member::new("sub", g20)]);
    }

    #[test]
    fn rejects_id_zero_duplicates_and_dangling_references() {
        let zero = r#"{ "points": [{ "id": 0 }] }"#;
        let err = GraphDocument::parse(zero).unwrap().into_graph().unwrap_err();
        assert!(err.message.contains("id 0"), "{err}");

        let dup = r#"{ "paths": [{ "id": -3 }, { "id": -3 }] }"#;
        let err = GraphDocument::parse(dup).unwrap().into_graph().unwrap_err();
        assert!(err.message.contains("duplicate path id -3"), "{err}");

        let dangling = r#"{ "paths": [{ "id": 5, "points": [9] }] }"#;
        let err = GraphDocument::parse(dangling).unwrap().into_graph().unwrap_err();
        assert!(err.message.contains("point 9"), "{err}");
    }

    #[test]
    fn point_with_half_a_coordinate_is_rejected() {
        let doc = r#"{ "points": [{ "id": 4, "version": 1, "lat": 51.5 }] }"#;
        let err = GraphDocument::parse(doc).unwrap().into_graph().unwrap_err();
        assert!(err.message.contains("point 4"), "{err}");

        let doc = r#"{ "points": [{ "id": -2, "lon": 0.1 }] }"#;
        assert!(GraphDocument::parse(doc).unwrap().into_graph().is_err());

        let doc = r#"{ "points": [{ "id": 4, "version": 1 }] }"#;
        let graph = GraphDocument::parse(doc).unwrap().into_graph().unwrap();
        let point = graph.find(PrimitiveKind::Point, 4).unwrap();
        assert_eq!(graph.get(point).unwrap().coord(), None);
    }

    #[test]
    fn same_local_id_is_fine_across_kinds() {
        let doc = r#"{ "points": [{ "id": -1 }], "paths": [{ "id": -1, "points": [-1] }] }"#;
        let graph = GraphDocument::parse(doc).unwrap().into_graph().unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn parse_error_carries_line_number() {
        let err = GraphDocument::parse("{\n  \"points\": [\n    { \"id\": }\n  ]\n}").unwrap_err();
        assert!(err.message.starts_with("line 3"), "{err}");
    }

    #[test]
    fn unknown_top_level_fields_are_rejected() {
        assert!(GraphDocument::parse(r#"{ "nodes": [] }"#).is_err());
    }

    #[test]
    fn encoding_renumbers_local_primitives_per_kind() {
        let mut graph = Graph::new();
        let a = graph.add(Primitive::point(Identity::Unassigned, None)).unwrap();
        let b = graph
            .add(Primitive::point(Identity::Assigned(4), Some(LatLon::new(1.0, 2.0))).with_version(1))
            .unwrap();
        let c = graph.add(Primitive::point(Identity::Unassigned, None)).unwrap();
        graph
            .add(Primitive::path(Identity::Unassigned, vec![a, b, c]))
            .unwrap();

        let doc = GraphDocument::from_graph(&graph).unwrap();
        let ids: Vec<i64> = doc.points.iter().map(|p| p.meta.id).collect();
        assert_eq!(ids, vec![-1, 4, -2]);
        assert_eq!(doc.paths[0].meta.id, -1);
        assert_eq!(doc.paths[0].points, vec![-1, 4, -2]);
        // Default flags are left implicit.
        assert_eq!(doc.points[0].meta.modified, None);
        assert_eq!(doc.points[1].meta.modified, None);
    }

    #[test]
    fn reencoding_a_decoded_document_preserves_the_digest() {
        let graph = GraphDocument::parse(SAMPLE).unwrap().into_graph().unwrap();
        let json = GraphDocument::from_graph(&graph).unwrap().to_json().unwrap();
        let again = GraphDocument::parse(&json).unwrap().into_graph().unwrap();
        assert_eq!(graph.digest(), again.digest());
    }
}
