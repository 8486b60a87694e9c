//! Runtime scene graph.
//!
//! Built once per scene from the authored [`NodeConfig`] tree. Nodes live in
//! a flat arena addressed by [`NodeId`]; index 0 is always the scene root.

use std::collections::HashMap;
use std::sync::Arc;

use image::Rgba;
use storyline_common::error::{StorylineError, StorylineResult};
use storyline_screenplay::{FilterConfig, FilterKind, NodeConfig, NodeKind};

use crate::source::RenderableSource;

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Animatable node property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeProperty {
    Alpha,
    X,
    Y,
    Scale,
    /// Fraction of a text node's characters that are shown.
    Reveal,
    /// Transient horizontal displacement (shake).
    OffsetX,
}

/// Authored placement, restored by animations that return a node home.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub alpha: f32,
    pub scale: f32,
}

/// What a node draws.
#[derive(Debug, Clone)]
pub enum NodeContent {
    Container,
    Sprite {
        color: Rgba<u8>,
        /// Asset key of the authored source, resolved at compile time.
        source_key: Option<String>,
        source: Option<Arc<dyn RenderableSource>>,
        /// Scene time at which the current source was attached.
        source_started_at: f64,
    },
    Text {
        content: String,
        color: Rgba<u8>,
        font_size: f32,
        reveal: f32,
    },
}

/// Image filter applied to a node and its subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Blur { radius: f32 },
    Grayscale,
    Sepia,
    Brightness { amount: f32 },
    Tint { color: Rgba<u8>, strength: f32 },
}

impl Filter {
    pub fn from_config(config: &FilterConfig) -> StorylineResult<Self> {
        Ok(match config {
            FilterConfig::Blur { radius } => Filter::Blur { radius: *radius },
            FilterConfig::Grayscale => Filter::Grayscale,
            FilterConfig::Sepia => Filter::Sepia,
            FilterConfig::Brightness { amount } => Filter::Brightness { amount: *amount },
            FilterConfig::Tint { color, strength } => Filter::Tint {
                color: parse_color(color)?,
                strength: *strength,
            },
        })
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::Blur { .. } => FilterKind::Blur,
            Filter::Grayscale => FilterKind::Grayscale,
            Filter::Sepia => FilterKind::Sepia,
            Filter::Brightness { .. } => FilterKind::Brightness,
            Filter::Tint { .. } => FilterKind::Tint,
        }
    }
}

/// A node of the scene graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub content: NodeContent,

    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub alpha: f32,
    pub scale: f32,
    pub offset_x: f32,
    pub visible: bool,
    pub filters: Vec<Filter>,

    pub origin: Placement,
}

impl Node {
    pub fn property(&self, property: NodeProperty) -> f32 {
        match property {
            NodeProperty::Alpha => self.alpha,
            NodeProperty::X => self.x,
            NodeProperty::Y => self.y,
            NodeProperty::Scale => self.scale,
            NodeProperty::OffsetX => self.offset_x,
            NodeProperty::Reveal => match &self.content {
                NodeContent::Text { reveal, .. } => *reveal,
                _ => 1.0,
            },
        }
    }

    pub fn set_property(&mut self, property: NodeProperty, value: f32) {
        match property {
            NodeProperty::Alpha => self.alpha = value.clamp(0.0, 1.0),
            NodeProperty::X => self.x = value,
            NodeProperty::Y => self.y = value,
            NodeProperty::Scale => self.scale = value.max(0.0),
            NodeProperty::OffsetX => self.offset_x = value,
            NodeProperty::Reveal => {
                if let NodeContent::Text { reveal, .. } = &mut self.content {
                    *reveal = value.clamp(0.0, 1.0);
                }
            }
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.content, NodeContent::Text { .. })
    }

    pub fn is_sprite(&self) -> bool {
        matches!(self.content, NodeContent::Sprite { .. })
    }

    /// Replace a text node's content. No-op for other node kinds.
    pub fn set_text(&mut self, text: &str) {
        if let NodeContent::Text { content, .. } = &mut self.content {
            content.clear();
            content.push_str(text);
        }
    }

    /// Attach a new image source to a sprite. No-op for other node kinds.
    pub fn set_source(&mut self, new_source: Arc<dyn RenderableSource>, at: f64) {
        if let NodeContent::Sprite {
            source,
            source_started_at,
            ..
        } = &mut self.content
        {
            *source = Some(new_source);
            *source_started_at = at;
        }
    }

    /// Return the node to its authored placement.
    pub fn restore_origin(&mut self) {
        self.x = self.origin.x;
        self.y = self.origin.y;
        self.alpha = self.origin.alpha;
        self.scale = self.origin.scale;
        self.offset_x = 0.0;
    }
}

/// Arena-backed node tree of one scene.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
}

impl SceneGraph {
    /// Build the runtime tree. Node names must be unique within the scene.
    pub fn build(root: &NodeConfig) -> StorylineResult<Self> {
        let mut graph = Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
        };
        graph.insert(root, None)?;
        Ok(graph)
    }

    fn insert(&mut self, config: &NodeConfig, parent: Option<NodeId>) -> StorylineResult<NodeId> {
        let id = NodeId(self.nodes.len());
        if self.by_name.insert(config.name.clone(), id).is_some() {
            return Err(StorylineError::screenplay(format!(
                "duplicate node name '{}'",
                config.name
            )));
        }

        let content = match &config.kind {
            NodeKind::Container => NodeContent::Container,
            NodeKind::Sprite { color, source } => NodeContent::Sprite {
                color: match color {
                    Some(c) => parse_color(c)?,
                    None => Rgba([255, 255, 255, 255]),
                },
                source_key: source.clone(),
                source: None,
                source_started_at: 0.0,
            },
            NodeKind::Text {
                content,
                color,
                font_size,
            } => NodeContent::Text {
                content: content.clone(),
                color: parse_color(color)?,
                font_size: *font_size,
                reveal: 1.0,
            },
        };

        self.nodes.push(Node {
            id,
            name: config.name.clone(),
            parent,
            children: vec![],
            content,
            x: config.x,
            y: config.y,
            width: config.width,
            height: config.height,
            alpha: config.alpha,
            scale: config.scale,
            offset_x: 0.0,
            visible: config.visible,
            filters: vec![],
            origin: Placement {
                x: config.x,
                y: config.y,
                alpha: config.alpha,
                scale: config.scale,
            },
        });

        for child in &config.children {
            let child_id = self.insert(child, Some(id))?;
            self.nodes[id.0].children.push(child_id);
        }
        Ok(id)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Borrow a node. Ids are only minted by this graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Hide the root's direct children; scripts reveal them explicitly.
    pub fn hide_scene_children(&mut self) {
        let children = self.nodes[0].children.clone();
        for child in children {
            self.nodes[child.0].visible = false;
        }
    }

    /// Sprites with an authored source that still needs loading.
    pub fn pending_sources(&self) -> Vec<(NodeId, String)> {
        self.nodes
            .iter()
            .filter_map(|node| match &node.content {
                NodeContent::Sprite {
                    source_key: Some(key),
                    source: None,
                    ..
                } => Some((node.id, key.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Parse `#rgb`, `#rrggbb`, or `#rrggbbaa`.
pub fn parse_color(text: &str) -> StorylineResult<Rgba<u8>> {
    let invalid = || StorylineError::screenplay(format!("invalid color '{text}'"));
    let hex = text.strip_prefix('#').ok_or_else(invalid)?;
    let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

    match hex.len() {
        3 => {
            let mut out = [0u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(invalid)? as u8;
                out[i] = v * 17;
            }
            out[3] = 255;
            Ok(Rgba(out))
        }
        6 | 8 if hex.is_ascii() => {
            let r = byte(&hex[0..2])?;
            let g = byte(&hex[2..4])?;
            let b = byte(&hex[4..6])?;
            let a = if hex.len() == 8 { byte(&hex[6..8])? } else { 255 };
            Ok(Rgba([r, g, b, a]))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> NodeConfig {
        NodeConfig::container("root")
            .child(NodeConfig::sprite("bg", "#102030").at(0.0, 0.0, 64.0, 36.0))
            .child(
                NodeConfig::container("group")
                    .child(NodeConfig::text("line").at(4.0, 30.0, 56.0, 6.0)),
            )
    }

    #[test]
    fn test_build_and_find() {
        let graph = SceneGraph::build(&tree()).unwrap();
        assert_eq!(graph.len(), 4);
        let line = graph.find("line").unwrap();
        let node = graph.node(line);
        assert!(node.is_text());
        assert_eq!(node.parent, graph.find("group"));
        assert_eq!(graph.node(graph.root()).children.len(), 2);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let config = NodeConfig::container("root")
            .child(NodeConfig::text("x"))
            .child(NodeConfig::text("x"));
        assert!(SceneGraph::build(&config).is_err());
    }

    #[test]
    fn test_hide_scene_children_only_hides_direct_children() {
        let mut graph = SceneGraph::build(&tree()).unwrap();
        graph.hide_scene_children();
        assert!(!graph.node(graph.find("bg").unwrap()).visible);
        assert!(!graph.node(graph.find("group").unwrap()).visible);
        assert!(graph.node(graph.find("line").unwrap()).visible);
        assert!(graph.node(graph.root()).visible);
    }

    #[test]
    fn test_properties_clamp() {
        let mut graph = SceneGraph::build(&tree()).unwrap();
        let line = graph.find("line").unwrap();
        let node = graph.node_mut(line);
        node.set_property(NodeProperty::Alpha, 1.5);
        node.set_property(NodeProperty::Reveal, -0.2);
        assert_eq!(node.property(NodeProperty::Alpha), 1.0);
        assert_eq!(node.property(NodeProperty::Reveal), 0.0);

        node.set_property(NodeProperty::X, 99.0);
        node.restore_origin();
        assert_eq!(node.x, 4.0);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff8000").unwrap(), Rgba([255, 128, 0, 255]));
        assert_eq!(parse_color("#ff800080").unwrap(), Rgba([255, 128, 0, 128]));
        assert_eq!(parse_color("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert!(parse_color("red").is_err());
        assert!(parse_color("#12345").is_err());
    }
}
