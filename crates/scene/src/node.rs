//! Persisted project nodes and the store that owns them.
//!
//! Scene items never own a node; they hold a [`NodeId`] and go through a
//! [`ProjectStore`] for every read and write. Node geometry is stored as
//! WGS84 `(lat°, lon°, height m)` and converted to the caller's zone on the
//! way in and out.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use foundation::math::{GeoZone, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    #[default]
    None,
    Point,
    LineString,
    Polygon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    /// Item type tag, e.g. `"folder"` or `"media"`.
    pub item_type: String,
    pub name: String,
    pub uri: Option<String>,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub geometry_kind: GeometryKind,
    /// WGS84 lat/long/height.
    pub geometry: Vec<Vec3>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Modification stamp; strictly increases on every write to this node.
    pub last_update: u64,
}

#[derive(Debug)]
pub enum ProjectError {
    UnknownNode(NodeId),
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::UnknownNode(id) => write!(f, "unknown project node {}", id.0),
            ProjectError::Io(err) => write!(f, "I/O error: {err}"),
            ProjectError::Parse(err) => write!(f, "project parse error: {err}"),
        }
    }
}

impl std::error::Error for ProjectError {}

/// Node storage consumed by the scene.
pub trait ProjectStore {
    fn node(&self, id: NodeId) -> Option<&SceneNode>;

    fn root(&self) -> NodeId;

    fn last_update(&self, id: NodeId) -> Option<u64> {
        self.node(id).map(|n| n.last_update)
    }

    fn uri(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.uri.as_deref())
    }

    fn metadata_str(&self, id: NodeId, key: &str) -> Option<&str> {
        match self.node(id)?.metadata.get(key)? {
            MetadataValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn metadata_f64(&self, id: NodeId, key: &str, default: f64) -> f64 {
        match self.node(id).and_then(|n| n.metadata.get(key)) {
            Some(MetadataValue::Number(v)) => *v,
            _ => default,
        }
    }

    fn set_metadata(
        &mut self,
        id: NodeId,
        key: &str,
        value: MetadataValue,
    ) -> Result<(), ProjectError>;

    fn set_uri(&mut self, id: NodeId, uri: Option<String>) -> Result<(), ProjectError>;

    /// Node geometry as cartesian points of `zone`.
    fn geometry(&self, id: NodeId, zone: &GeoZone) -> Result<Vec<Vec3>, ProjectError> {
        let node = self.node(id).ok_or(ProjectError::UnknownNode(id))?;
        Ok(node
            .geometry
            .iter()
            .map(|ll| zone.from_lat_long(*ll))
            .collect())
    }

    /// Replaces node geometry with cartesian `points` expressed in `zone`.
    fn set_geometry(
        &mut self,
        id: NodeId,
        zone: &GeoZone,
        kind: GeometryKind,
        points: &[Vec3],
    ) -> Result<(), ProjectError>;

    fn create_node(
        &mut self,
        parent: NodeId,
        item_type: &str,
        name: &str,
        uri: Option<&str>,
    ) -> Result<NodeId, ProjectError>;

    /// Detaches `id` from its parent and forgets it along with anything
    /// still below it.
    fn remove_node(&mut self, id: NodeId) -> Result<(), ProjectError>;

    /// Moves `id` under `parent` at `index` (clamped).
    fn move_node(&mut self, id: NodeId, parent: NodeId, index: usize) -> Result<(), ProjectError>;
}

/// In-memory project graph.
#[derive(Debug, Clone)]
pub struct MemoryProject {
    nodes: BTreeMap<NodeId, SceneNode>,
    root: NodeId,
    next_id: u32,
    stamp: u64,
}

impl Default for MemoryProject {
    fn default() -> Self {
        Self::new("Project")
    }
}

impl MemoryProject {
    pub fn new(name: &str) -> Self {
        let root = NodeId(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            SceneNode {
                id: root,
                item_type: "folder".to_string(),
                name: name.to_string(),
                uri: None,
                metadata: BTreeMap::new(),
                geometry_kind: GeometryKind::None,
                geometry: Vec::new(),
                parent: None,
                children: Vec::new(),
                last_update: 1,
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
            stamp: 1,
        }
    }

    pub fn from_json(payload: &str) -> Result<Self, ProjectError> {
        let doc: ProjectDocument = serde_json::from_str(payload).map_err(ProjectError::Parse)?;
        let mut project = Self::new(&doc.name);
        let root = project.root;
        for child in &doc.children {
            project.insert_document(root, child)?;
        }
        Ok(project)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let payload = std::fs::read_to_string(path).map_err(ProjectError::Io)?;
        Self::from_json(&payload)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert_document(&mut self, parent: NodeId, doc: &NodeDocument) -> Result<(), ProjectError> {
        let id = self.create_node(parent, &doc.item_type, &doc.name, doc.uri.as_deref())?;
        let next = self.next_stamp();
        let node = self.node_mut(id)?;
        node.metadata = doc.metadata.clone();
        if let Some(geometry) = &doc.geometry {
            node.geometry_kind = geometry.kind;
            node.geometry = geometry
                .points
                .iter()
                .map(|p| Vec3::new(p[0], p[1], p[2]))
                .collect();
        }
        node.last_update = next;
        for child in &doc.children {
            self.insert_document(id, child)?;
        }
        Ok(())
    }

    fn next_stamp(&mut self) -> u64 {
        self.stamp += 1;
        self.stamp
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, ProjectError> {
        self.nodes.get_mut(&id).ok_or(ProjectError::UnknownNode(id))
    }

    fn touch(&mut self, id: NodeId) -> Result<&mut SceneNode, ProjectError> {
        if !self.nodes.contains_key(&id) {
            return Err(ProjectError::UnknownNode(id));
        }
        let stamp = self.next_stamp();
        let node = self.node_mut(id)?;
        node.last_update = stamp;
        Ok(node)
    }
}

impl ProjectStore for MemoryProject {
    fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    fn root(&self) -> NodeId {
        self.root
    }

    fn set_metadata(
        &mut self,
        id: NodeId,
        key: &str,
        value: MetadataValue,
    ) -> Result<(), ProjectError> {
        self.touch(id)?.metadata.insert(key.to_string(), value);
        Ok(())
    }

    fn set_uri(&mut self, id: NodeId, uri: Option<String>) -> Result<(), ProjectError> {
        self.touch(id)?.uri = uri;
        Ok(())
    }

    fn set_geometry(
        &mut self,
        id: NodeId,
        zone: &GeoZone,
        kind: GeometryKind,
        points: &[Vec3],
    ) -> Result<(), ProjectError> {
        let node = self.touch(id)?;
        node.geometry_kind = kind;
        node.geometry = points.iter().map(|p| zone.to_lat_long(*p)).collect();
        Ok(())
    }

    fn create_node(
        &mut self,
        parent: NodeId,
        item_type: &str,
        name: &str,
        uri: Option<&str>,
    ) -> Result<NodeId, ProjectError> {
        let id = NodeId(self.next_id);
        self.touch(parent)?.children.push(id);
        self.next_id += 1;
        let stamp = self.next_stamp();
        self.nodes.insert(
            id,
            SceneNode {
                id,
                item_type: item_type.to_string(),
                name: name.to_string(),
                uri: uri.map(str::to_string),
                metadata: BTreeMap::new(),
                geometry_kind: GeometryKind::None,
                geometry: Vec::new(),
                parent: Some(parent),
                children: Vec::new(),
                last_update: stamp,
            },
        );
        Ok(id)
    }

    fn remove_node(&mut self, id: NodeId) -> Result<(), ProjectError> {
        let node = self.nodes.remove(&id).ok_or(ProjectError::UnknownNode(id))?;
        if let Some(parent) = node.parent.filter(|p| self.nodes.contains_key(p)) {
            self.touch(parent)?.children.retain(|c| *c != id);
        }
        let mut orphans = node.children;
        while let Some(orphan) = orphans.pop() {
            if let Some(gone) = self.nodes.remove(&orphan) {
                orphans.extend(gone.children);
            }
        }
        Ok(())
    }

    fn move_node(&mut self, id: NodeId, parent: NodeId, index: usize) -> Result<(), ProjectError> {
        if !self.nodes.contains_key(&parent) {
            return Err(ProjectError::UnknownNode(parent));
        }
        let old_parent = self.touch(id)?.parent.replace(parent);
        if let Some(old) = old_parent.filter(|p| self.nodes.contains_key(p)) {
            self.touch(old)?.children.retain(|c| *c != id);
        }
        let siblings = &mut self.touch(parent)?.children;
        let at = index.min(siblings.len());
        siblings.insert(at, id);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProjectDocument {
    #[serde(default = "default_project_name")]
    name: String,
    #[serde(default)]
    children: Vec<NodeDocument>,
}

fn default_project_name() -> String {
    "Project".to_string()
}

#[derive(Debug, Deserialize)]
struct NodeDocument {
    #[serde(rename = "type")]
    item_type: String,
    name: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, MetadataValue>,
    #[serde(default)]
    geometry: Option<GeometryDocument>,
    #[serde(default)]
    children: Vec<NodeDocument>,
}

#[derive(Debug, Deserialize)]
struct GeometryDocument {
    kind: GeometryKind,
    /// `[lat°, lon°, height m]` triples.
    points: Vec<[f64; 3]>,
}

#[cfg(test)]
mod tests {
    use super::{GeometryKind, MemoryProject, MetadataValue, NodeId, ProjectError, ProjectStore};
    use foundation::math::{GeoZone, SRID_WGS84_GEOGRAPHIC, Vec3};
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"{
        "name": "Harbour",
        "children": [
            { "type": "folder", "name": "Photos", "children": [
                { "type": "media", "name": "Pier", "uri": "http://x/a.jpg",
                  "metadata": { "reloadRate": 30, "imagetype": "Panorama" },
                  "geometry": { "kind": "point", "points": [[-27.47, 153.02, 10.0]] } }
            ] }
        ]
    }"#;

    #[test]
    fn loads_nested_document() {
        let project = MemoryProject::from_json(DOC).unwrap();
        assert_eq!(project.len(), 3);

        let root = project.node(project.root()).unwrap();
        assert_eq!(root.name, "Harbour");
        let folder = project.node(root.children[0]).unwrap();
        assert_eq!(folder.item_type, "folder");

        let media = folder.children[0];
        assert_eq!(project.uri(media), Some("http://x/a.jpg"));
        assert_eq!(project.metadata_f64(media, "reloadRate", 0.0), 30.0);
        assert_eq!(project.metadata_str(media, "imagetype"), Some("Panorama"));
        assert_eq!(project.node(media).unwrap().geometry_kind, GeometryKind::Point);
    }

    #[test]
    fn geometry_is_converted_through_the_zone() {
        let mut project = MemoryProject::new("p");
        let root = project.root();
        let id = project.create_node(root, "media", "m", None).unwrap();
        let zone = GeoZone::from_srid(SRID_WGS84_GEOGRAPHIC).unwrap();

        // Geographic cartesian is (lon, lat, h).
        project
            .set_geometry(id, &zone, GeometryKind::Point, &[Vec3::new(153.0, -27.0, 5.0)])
            .unwrap();
        assert_eq!(project.node(id).unwrap().geometry, vec![Vec3::new(-27.0, 153.0, 5.0)]);
        assert_eq!(project.geometry(id, &zone).unwrap(), vec![Vec3::new(153.0, -27.0, 5.0)]);
    }

    #[test]
    fn writes_advance_the_stamp() {
        let mut project = MemoryProject::new("p");
        let root = project.root();
        let id = project.create_node(root, "media", "m", None).unwrap();
        let before = project.last_update(id).unwrap();
        project
            .set_metadata(id, "reloadRate", MetadataValue::Number(5.0))
            .unwrap();
        assert!(project.last_update(id).unwrap() > before);
    }

    #[test]
    fn remove_detaches_from_parent() {
        let mut project = MemoryProject::new("p");
        let root = project.root();
        let a = project.create_node(root, "media", "a", None).unwrap();
        let b = project.create_node(root, "media", "b", None).unwrap();
        project.remove_node(a).unwrap();
        assert_eq!(project.node(root).unwrap().children, vec![b]);
        assert!(matches!(
            project.remove_node(a),
            Err(ProjectError::UnknownNode(NodeId(_)))
        ));
    }

    #[test]
    fn remove_takes_descendants_along() {
        let mut project = MemoryProject::new("p");
        let root = project.root();
        let folder = project.create_node(root, "folder", "f", None).unwrap();
        let inner = project.create_node(folder, "folder", "g", None).unwrap();
        project.create_node(inner, "media", "m", None).unwrap();
        project.remove_node(folder).unwrap();
        assert_eq!(project.len(), 1);
    }

    #[test]
    fn move_reorders_under_the_new_parent() {
        let mut project = MemoryProject::new("p");
        let root = project.root();
        let a = project.create_node(root, "folder", "a", None).unwrap();
        let b = project.create_node(root, "media", "b", None).unwrap();
        let c = project.create_node(a, "media", "c", None).unwrap();

        project.move_node(b, a, 0).unwrap();
        assert_eq!(project.node(a).unwrap().children, vec![b, c]);
        assert_eq!(project.node(root).unwrap().children, vec![a]);
        assert_eq!(project.node(b).unwrap().parent, Some(a));
        assert!(project.move_node(b, NodeId(77), 0).is_err());
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = MemoryProject::from_json("{\"children\": [{}]}").unwrap_err();
        assert!(matches!(err, ProjectError::Parse(_)));
    }
}
