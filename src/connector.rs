//! Connector lines between scene elements.
//!
//! A connector joins two elements by id and owns one or two scene
//! primitives: the line itself and, for the arrow style, a triangular
//! arrowhead. Primitives are non-interactive, so the user can never select
//! them; they are rebuilt from `{from_id, to_id, style}` records on restore.
//!
//! The manager never holds element data. Geometry is re-read from the scene
//! on every [`ConnectorManager::refresh_all`].

#[cfg(test)]
#[path = "connector_test.rs"]
mod connector_test;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts;
use crate::scene::{Element, ElementId, ElementKind, Pose, Scene, Style};
use crate::viewport::Point;

/// Unique identifier for a connector.
pub type ConnectorId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    Arrow,
}

impl ConnectorStyle {
    /// Line dash pattern; empty for a continuous stroke.
    #[must_use]
    pub fn dash(self) -> Vec<f64> {
        match self {
            Self::Dashed => consts::DASHED_PATTERN.to_vec(),
            Self::Dotted => consts::DOTTED_PATTERN.to_vec(),
            Self::Solid | Self::Arrow => Vec::new(),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Dashed => "dashed",
            Self::Dotted => "dotted",
            Self::Arrow => "arrow",
        }
    }
}

impl FromStr for ConnectorStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solid" => Ok(Self::Solid),
            "dashed" => Ok(Self::Dashed),
            "dotted" => Ok(Self::Dotted),
            "arrow" => Ok(Self::Arrow),
            other => Err(format!("unknown connector style: {other}")),
        }
    }
}

/// A live connector and the primitives it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub id: ConnectorId,
    pub from: ElementId,
    pub to: ElementId,
    pub style: ConnectorStyle,
    pub line: ElementId,
    pub arrowhead: Option<ElementId>,
}

impl Connector {
    #[must_use]
    pub fn touches(&self, element: &ElementId) -> bool {
        &self.from == element || &self.to == element
    }

    /// Scene ids owned by this connector.
    pub fn primitives(&self) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::once(self.line).chain(self.arrowhead)
    }
}

/// Persisted form of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub from_id: ElementId,
    pub to_id: ElementId,
    pub style: ConnectorStyle,
}

/// Arrowhead rotation in degrees for a line running `from` to `to`.
#[must_use]
pub fn arrowhead_rotation(from: Point, to: Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees() + consts::ARROWHEAD_ANGLE_OFFSET_DEG
}

pub struct ConnectorManager {
    connectors: Vec<Connector>,
    color: String,
    width: f64,
}

impl Default for ConnectorManager {
    fn default() -> Self {
        Self::new(consts::CONNECTOR_COLOR, consts::CONNECTOR_WIDTH)
    }
}

impl ConnectorManager {
    #[must_use]
    pub fn new(color: &str, width: f64) -> Self {
        Self { connectors: Vec::new(), color: color.to_owned(), width }
    }

    /// Join `from` and `to` with a new connector.
    ///
    /// Returns `None` and leaves the scene untouched when the endpoints are
    /// the same element or either one is missing.
    pub fn create(
        &mut self,
        scene: &mut Scene,
        from: ElementId,
        to: ElementId,
        style: ConnectorStyle,
    ) -> Option<ConnectorId> {
        if from == to {
            return None;
        }
        let start = scene.center(&from)?;
        let end = scene.center(&to)?;

        let line = scene.add(Element::line(start, end, &self.color, self.width, style.dash()));
        scene.send_to_back(&line);

        let arrowhead = (style == ConnectorStyle::Arrow).then(|| {
            let size = consts::ARROWHEAD_SIZE;
            let mut pose = Pose::at(end);
            pose.rotation = arrowhead_rotation(start, end);
            let mut head =
                Element::new(ElementKind::Triangle { width: size, height: size }, pose, Style::filled(&self.color));
            head.interactive = false;
            scene.add(head)
        });

        let id = Uuid::new_v4();
        self.connectors.push(Connector { id, from, to, style, line, arrowhead });
        log::debug!("connector {id} created ({} -> {}, {})", from, to, style.as_str());
        Some(id)
    }

    /// Re-derive every connector's geometry from the current endpoint centers.
    /// Connectors with a missing endpoint are skipped.
    pub fn refresh_all(&self, scene: &mut Scene) {
        for connector in &self.connectors {
            let (Some(start), Some(end)) = (scene.center(&connector.from), scene.center(&connector.to)) else {
                continue;
            };
            if let Some(line) = scene.get_mut(&connector.line) {
                if let ElementKind::Line { x1, y1, x2, y2, .. } = &mut line.kind {
                    *x1 = start.x;
                    *y1 = start.y;
                    *x2 = end.x;
                    *y2 = end.y;
                }
            }
            if let Some(head) = connector.arrowhead.and_then(|id| scene.get_mut(&id)) {
                head.pose.x = end.x;
                head.pose.y = end.y;
                head.pose.rotation = arrowhead_rotation(start, end);
            }
        }
    }

    /// Remove every connector touching `element` along with its primitives.
    /// Returns the number removed. Call before removing the element itself.
    pub fn remove_for(&mut self, scene: &mut Scene, element: &ElementId) -> usize {
        let (gone, kept): (Vec<_>, Vec<_>) = self.connectors.drain(..).partition(|c| c.touches(element));
        self.connectors = kept;
        for connector in &gone {
            destroy_primitives(scene, connector);
        }
        gone.len()
    }

    /// Remove one connector. Its endpoints are left alone.
    pub fn remove(&mut self, scene: &mut Scene, id: &ConnectorId) -> bool {
        let Some(index) = self.connectors.iter().position(|c| &c.id == id) else {
            return false;
        };
        let connector = self.connectors.remove(index);
        destroy_primitives(scene, &connector);
        true
    }

    /// Remove all connectors and their primitives.
    pub fn clear(&mut self, scene: &mut Scene) {
        for connector in self.connectors.drain(..) {
            destroy_primitives(scene, &connector);
        }
    }

    /// Drop connector bookkeeping without touching the scene, for when the
    /// scene is being replaced wholesale.
    pub fn forget_all(&mut self) {
        self.connectors.clear();
    }

    /// Whether `element` is a line or arrowhead owned by some connector.
    #[must_use]
    pub fn is_primitive(&self, element: &ElementId) -> bool {
        self.connectors.iter().any(|c| c.primitives().any(|p| &p == element))
    }

    /// Connector owning the given primitive, if any.
    #[must_use]
    pub fn owner_of(&self, element: &ElementId) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.primitives().any(|p| &p == element))
    }

    pub fn touching<'a>(&'a self, element: &'a ElementId) -> impl Iterator<Item = &'a Connector> + 'a {
        self.connectors.iter().filter(move |c| c.touches(element))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Persistable records in creation order.
    #[must_use]
    pub fn records(&self) -> Vec<ConnectorRecord> {
        self.connectors
            .iter()
            .map(|c| ConnectorRecord { from_id: c.from, to_id: c.to, style: c.style })
            .collect()
    }

    /// Recreate connectors from records. Records naming unknown elements are
    /// dropped. Returns the number of connectors created.
    pub fn restore(&mut self, scene: &mut Scene, records: &[ConnectorRecord]) -> usize {
        let mut created = 0;
        for record in records {
            if self.create(scene, record.from_id, record.to_id, record.style).is_some() {
                created += 1;
            } else {
                log::warn!("dropping connector record {} -> {}", record.from_id, record.to_id);
            }
        }
        created
    }
}

fn destroy_primitives(scene: &mut Scene, connector: &Connector) {
    for id in connector.primitives() {
        scene.remove(&id);
    }
}
