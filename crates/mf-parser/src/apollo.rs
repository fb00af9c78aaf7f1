//! Apollo-style XML exchange file parser.
//!
//! # What is extracted
//!
//! Roads, lane sections, lanes (with their link topology), junctions,
//! signals, and objects — everything the graph builder and the layer
//! builders consume. Dense point geometry is left in the file: layer rows
//! carry identity, topology, and attributes, and the road graph only needs
//! centerline lengths.
//!
//! # Parallel parsing
//!
//! Large exchange files are CPU-bound to parse, so [`parse_apollo_parallel`]
//! splits the top-level `<road>` / `<junction>` elements into contiguous
//! chunks (one per available core, minimum chunk size 1), re-wraps each
//! chunk as a standalone document, and parses the chunks on rayon workers.
//! Workers share nothing; the per-chunk [`ApolloMap`]s are merged by map
//! union afterwards. Whole elements never straddle a chunk, so ids only
//! collide across chunks if the source file itself repeats an id — in which
//! case the last-merged chunk wins.

use rayon::prelude::*;
use roxmltree::{Document, Node};
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::{ParseError, ParseResult};

// ── Domain objects ────────────────────────────────────────────────────────────

/// Lane-to-lane link topology.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ApolloLink {
    /// Predecessor lane uids.
    pub predecessors: Vec<String>,
    /// Successor lane uids.
    pub successors: Vec<String>,
    pub neighbors: Vec<ApolloNeighbor>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloNeighbor {
    pub uid: String,
    /// `"left"` or `"right"`.
    pub side: String,
    /// `"same"` or `"opposite"`.
    pub direction: String,
}

/// One lane border (the lane's own right border, or an explicit left border).
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloBorder {
    /// Border type (`"solid"`, `"broken"`, `"virtual"`, …); `None` when the
    /// file omits the `borderType` element.
    pub border_type: Option<String>,
    pub color: Option<String>,
    /// Declared geometry length in metres.
    pub length: f64,
}

impl ApolloBorder {
    pub fn is_virtual(&self) -> bool {
        self.border_type.as_deref() == Some("virtual")
    }

    /// Border type, falling back to `"unknown"` when absent.
    pub fn type_or_unknown(&self) -> &str {
        self.border_type.as_deref().unwrap_or("unknown")
    }

    pub fn color_or_unknown(&self) -> &str {
        self.color.as_deref().unwrap_or("unknown")
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloLane {
    /// Signed lane index within the section; 0 is the reference lane.
    pub id: i32,
    /// Globally unique lane id, `"{road}_{section}_{index}"`.
    pub uid: String,
    pub road_id: String,
    /// Section-level id, the uid minus the lane index (`"R7_2_-1"` → `"R7_2"`).
    pub road_section_id: String,
    pub lane_type: String,
    pub direction: String,
    pub turn_type: String,
    /// Centerline geometry length in metres.
    pub length: f64,
    pub border: ApolloBorder,
    pub left_border: Option<ApolloBorder>,
    /// Maximum speed in km/h, when declared.
    pub speed_limit: Option<i64>,
    pub link: ApolloLink,
    pub signal_refs: Vec<String>,
    pub object_refs: Vec<String>,
    pub junction_refs: Vec<String>,
    pub lane_refs: Vec<String>,
}

impl ApolloLane {
    pub fn is_virtual(&self) -> bool {
        self.border.is_virtual()
    }
}

/// One lane section: the lanes sharing a stretch of road, grouped by side of
/// the reference line. Lanes are stored by uid; look them up in
/// [`ApolloMap::lanes`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloLaneSection {
    /// Section-level id, `"{road}_{section}"`.
    pub road_section_id: String,
    pub road_id: String,
    /// Left-side lane uids, sorted by ascending lane index.
    pub left_lanes: Vec<String>,
    /// Right-side lane uids, sorted by descending lane index.
    pub right_lanes: Vec<String>,
    /// The reference (index 0) lane's uid.
    pub ref_lane: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloRoad {
    pub id: String,
    pub road_type: String,
    /// Junction this road belongs to; `None` for ordinary roads (the file
    /// encodes "no junction" as `"-1"`).
    pub junction: Option<String>,
    /// Road-section ids of this road's lane sections, in document order.
    pub sections: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloSubSignal {
    pub id: String,
    pub sub_type: String,
    pub center: [f64; 3],
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloSignal {
    pub id: String,
    pub signal_type: String,
    pub layout_type: String,
    pub stop_line_refs: Vec<String>,
    pub sub_signals: Vec<ApolloSubSignal>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloObject {
    pub id: String,
    /// `"stopline"` or `"crosswalk"` — other types are skipped at parse time.
    pub object_type: String,
    /// Number of `cornerGlobal` points in the object's outline.
    pub outline_points: usize,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloConnection {
    pub id: i64,
    pub incoming_road: String,
    pub connecting_road: String,
    pub contact_point: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApolloJunction {
    pub id: String,
    pub connections: Vec<ApolloConnection>,
}

// ── ApolloMap ─────────────────────────────────────────────────────────────────

/// The parsed result: id-keyed maps of every extracted element.
///
/// This is also the unit of the parallel merge — chunk results are combined
/// with [`merge`](Self::merge), which is map union (last merged wins).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ApolloMap {
    pub roads: FxHashMap<String, ApolloRoad>,
    /// Lane sections keyed by road-section id.
    pub lane_sections: FxHashMap<String, ApolloLaneSection>,
    /// Lanes keyed by uid.
    pub lanes: FxHashMap<String, ApolloLane>,
    pub objects: FxHashMap<String, ApolloObject>,
    pub signals: FxHashMap<String, ApolloSignal>,
    pub junctions: FxHashMap<String, ApolloJunction>,
}

impl ApolloMap {
    /// Union `other` into `self`; colliding ids take `other`'s value.
    pub fn merge(&mut self, other: ApolloMap) {
        self.roads.extend(other.roads);
        self.lane_sections.extend(other.lane_sections);
        self.lanes.extend(other.lanes);
        self.objects.extend(other.objects);
        self.signals.extend(other.signals);
        self.junctions.extend(other.junctions);
    }

    /// Road ids referenced as `connectingRoad` by any junction connection.
    /// Lanes on these roads are junction connectors, not ordinary lanes.
    pub fn connecting_road_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .junctions
            .values()
            .flat_map(|j| j.connections.iter().map(|c| c.connecting_road.clone()))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

// ── Public entry points ───────────────────────────────────────────────────────

/// Parse an Apollo exchange document sequentially.
pub fn parse_apollo(xml: &str) -> ParseResult<ApolloMap> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();

    let mut map = ApolloMap::default();
    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "road" => parse_road(child, &mut map)?,
            "junction" => parse_junction(child, &mut map)?,
            _ => {}
        }
    }
    Ok(map)
}

/// Parse an Apollo exchange document on all available cores.
///
/// Semantically identical to [`parse_apollo`] up to the documented
/// last-merged-wins behavior for duplicated ids.
pub fn parse_apollo_parallel(xml: &str) -> ParseResult<ApolloMap> {
    let chunks = chunk_document(xml)?;
    if chunks.len() <= 1 {
        return parse_apollo(xml);
    }

    let results: Vec<ParseResult<ApolloMap>> =
        chunks.par_iter().map(|c| parse_apollo(c)).collect();

    let mut merged = ApolloMap::default();
    for result in results {
        merged.merge(result?);
    }
    Ok(merged)
}

/// Split the document into per-core chunk documents of whole top-level
/// `<road>` / `<junction>` elements.
fn chunk_document(xml: &str) -> ParseResult<Vec<String>> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();

    let mut road_spans = Vec::new();
    let mut junction_spans = Vec::new();
    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "road" => road_spans.push(child.range()),
            "junction" => junction_spans.push(child.range()),
            _ => {}
        }
    }

    let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
    let road_chunks = split_spans(&road_spans, workers);
    let junction_chunks = split_spans(&junction_spans, workers);

    let count = road_chunks.len().max(junction_chunks.len());
    let mut chunks = Vec::with_capacity(count);
    for i in 0..count {
        let mut text = String::from("<apollo>");
        for span in road_chunks.get(i).map_or(&[][..], Vec::as_slice) {
            text.push_str(&xml[span.clone()]);
        }
        for span in junction_chunks.get(i).map_or(&[][..], Vec::as_slice) {
            text.push_str(&xml[span.clone()]);
        }
        text.push_str("</apollo>");
        chunks.push(text);
    }
    Ok(chunks)
}

fn split_spans(
    spans: &[std::ops::Range<usize>],
    workers: usize,
) -> Vec<Vec<std::ops::Range<usize>>> {
    let chunk_size = (spans.len() / workers).max(1);
    spans.chunks(chunk_size).map(<[_]>::to_vec).collect()
}

// ── Attribute helpers ─────────────────────────────────────────────────────────

fn attr<'a>(node: Node<'a, '_>, name: &'static str, context: &str) -> ParseResult<&'a str> {
    node.attribute(name).ok_or_else(|| ParseError::MissingAttribute {
        context: context.to_owned(),
        attribute: name,
    })
}

fn attr_f64(node: Node<'_, '_>, name: &'static str, context: &str) -> ParseResult<f64> {
    let raw = attr(node, name, context)?;
    raw.parse().map_err(|_| ParseError::BadNumber {
        context: context.to_owned(),
        attribute: name,
        value: raw.to_owned(),
    })
}

fn attr_i64(node: Node<'_, '_>, name: &'static str, context: &str) -> ParseResult<i64> {
    let raw = attr(node, name, context)?;
    raw.parse().map_err(|_| ParseError::BadNumber {
        context: context.to_owned(),
        attribute: name,
        value: raw.to_owned(),
    })
}

fn child<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children<'a>(node: Node<'a, 'a>, name: &'a str) -> impl Iterator<Item = Node<'a, 'a>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn descendants<'a>(node: Node<'a, 'a>, name: &'a str) -> impl Iterator<Item = Node<'a, 'a>> {
    node.descendants()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// Section-level id of a lane uid: strip the trailing `_{index}` component.
fn section_id_of(uid: &str) -> &str {
    uid.rsplit_once('_').map_or(uid, |(head, _)| head)
}

// ── Road / section / lane parsing ─────────────────────────────────────────────

fn parse_road(road_ele: Node<'_, '_>, map: &mut ApolloMap) -> ParseResult<()> {
    let road_id = attr(road_ele, "id", "road")?.to_owned();
    let context = format!("road {road_id}");
    let road_type = attr(road_ele, "type", &context)?.to_owned();
    let junction_raw = attr(road_ele, "junction", &context)?;
    let junction = (junction_raw != "-1").then(|| junction_raw.to_owned());

    let lanes_ele = child(road_ele, "lanes").ok_or_else(|| ParseError::RoadWithoutLanes {
        road: road_id.clone(),
    })?;

    let mut sections = Vec::new();
    for (index, section_ele) in children(lanes_ele, "laneSection").enumerate() {
        let section = parse_lane_section(section_ele, &road_id, index, map)?;
        sections.push(section.road_section_id.clone());
        map.lane_sections
            .insert(section.road_section_id.clone(), section);
    }

    // Signals and objects live under arbitrary sub-elements of the road.
    for signal_ele in descendants(road_ele, "signal") {
        parse_signal(signal_ele, &road_id, map)?;
    }
    for object_ele in descendants(road_ele, "object") {
        parse_object(object_ele, &road_id, map)?;
    }

    map.roads.insert(
        road_id.clone(),
        ApolloRoad {
            id: road_id,
            road_type,
            junction,
            sections,
        },
    );
    Ok(())
}

fn parse_lane_section(
    section_ele: Node<'_, '_>,
    road_id: &str,
    index: usize,
    map: &mut ApolloMap,
) -> ParseResult<ApolloLaneSection> {
    let mut left: Vec<(i32, String)> = Vec::new();
    let mut right: Vec<(i32, String)> = Vec::new();
    let mut ref_lane: Option<String> = None;

    for side in ["center", "left", "right"] {
        let Some(side_ele) = child(section_ele, side) else {
            continue;
        };
        for lane_ele in children(side_ele, "lane") {
            let Some(lane) = parse_lane(lane_ele, road_id)? else {
                continue;
            };
            let entry = (lane.id, lane.uid.clone());
            match side {
                "left" => left.push(entry),
                "right" => right.push(entry),
                _ => ref_lane = Some(lane.uid.clone()),
            }
            map.lanes.insert(lane.uid.clone(), lane);
        }
    }

    let ref_lane = ref_lane.ok_or_else(|| ParseError::SectionWithoutCenterLane {
        road: road_id.to_owned(),
        section: index,
    })?;
    if left.is_empty() && right.is_empty() {
        return Err(ParseError::SectionWithoutLanes {
            road: road_id.to_owned(),
            section: index,
        });
    }

    left.sort_by_key(|(id, _)| *id);
    right.sort_by_key(|(id, _)| std::cmp::Reverse(*id));

    Ok(ApolloLaneSection {
        road_section_id: section_id_of(&ref_lane).to_owned(),
        road_id: road_id.to_owned(),
        left_lanes: left.into_iter().map(|(_, uid)| uid).collect(),
        right_lanes: right.into_iter().map(|(_, uid)| uid).collect(),
        ref_lane,
    })
}

/// Parse one `<lane>`. Returns `Ok(None)` for lanes missing their link,
/// border, or centerline — tolerated per-lane damage, skipped with a warning.
fn parse_lane(lane_ele: Node<'_, '_>, road_id: &str) -> ParseResult<Option<ApolloLane>> {
    let uid = attr(lane_ele, "uid", "lane")?.to_owned();
    let context = format!("road {road_id} lane {uid}");

    let id = attr_i64(lane_ele, "id", &context)? as i32;
    let lane_type = attr(lane_ele, "type", &context)?.to_owned();
    let direction = attr(lane_ele, "direction", &context)?.to_owned();
    let turn_type = attr(lane_ele, "turnType", &context)?.to_owned();

    let Some(link_ele) = child(lane_ele, "link") else {
        warn!(road = road_id, lane = %uid, "lane has no link, skipping");
        return Ok(None);
    };
    let link = ApolloLink {
        predecessors: children(link_ele, "predecessor")
            .map(|n| attr(n, "id", &context).map(str::to_owned))
            .collect::<ParseResult<_>>()?,
        successors: children(link_ele, "successor")
            .map(|n| attr(n, "id", &context).map(str::to_owned))
            .collect::<ParseResult<_>>()?,
        neighbors: children(link_ele, "neighbor")
            .map(|n| {
                Ok(ApolloNeighbor {
                    uid: attr(n, "id", &context)?.to_owned(),
                    side: attr(n, "side", &context)?.to_owned(),
                    direction: attr(n, "direction", &context)?.to_owned(),
                })
            })
            .collect::<ParseResult<_>>()?,
    };

    let Some(border_ele) = child(lane_ele, "border") else {
        warn!(road = road_id, lane = %uid, "lane has no border, skipping");
        return Ok(None);
    };
    let Some(border) = parse_border(border_ele, &context)? else {
        warn!(road = road_id, lane = %uid, "lane border has no geometry, skipping");
        return Ok(None);
    };
    let left_border = match child(lane_ele, "leftBorder") {
        Some(ele) => parse_border(ele, &context)?,
        None => None,
    };

    let Some(center_geo) = child(lane_ele, "centerLine").and_then(|c| child(c, "geometry"))
    else {
        warn!(road = road_id, lane = %uid, "lane has no center line, skipping");
        return Ok(None);
    };
    let length = attr_f64(center_geo, "length", &context)?;

    let speed_limit = match child(lane_ele, "speed") {
        Some(speed_ele) => Some(attr_i64(speed_ele, "max", &context)?),
        None => None,
    };

    let collect_refs = |name: &'static str| -> ParseResult<Vec<String>> {
        descendants(lane_ele, name)
            .map(|n| attr(n, "id", &context).map(str::to_owned))
            .collect()
    };

    Ok(Some(ApolloLane {
        id,
        road_id: road_id.to_owned(),
        road_section_id: section_id_of(&uid).to_owned(),
        uid,
        lane_type,
        direction,
        turn_type,
        length,
        border,
        left_border,
        speed_limit,
        link,
        signal_refs: collect_refs("signalReference")?,
        object_refs: collect_refs("objectReference")?,
        junction_refs: collect_refs("junctionReference")?,
        lane_refs: collect_refs("laneReference")?,
    }))
}

fn parse_border(border_ele: Node<'_, '_>, context: &str) -> ParseResult<Option<ApolloBorder>> {
    let Some(geo_ele) = child(border_ele, "geometry") else {
        return Ok(None);
    };
    let length = attr_f64(geo_ele, "length", context)?;

    let (border_type, color) = match child(border_ele, "borderType") {
        Some(type_ele) => (
            Some(attr(type_ele, "type", context)?.to_owned()),
            Some(attr(type_ele, "color", context)?.to_owned()),
        ),
        None => (None, None),
    };

    Ok(Some(ApolloBorder {
        border_type,
        color,
        length,
    }))
}

// ── Signals, objects, junctions ───────────────────────────────────────────────

fn parse_signal(signal_ele: Node<'_, '_>, road_id: &str, map: &mut ApolloMap) -> ParseResult<()> {
    let id = attr(signal_ele, "id", "signal")?.to_owned();
    let context = format!("road {road_id} signal {id}");
    let signal_type = attr(signal_ele, "type", &context)?.to_owned();
    let layout_type = attr(signal_ele, "layoutType", &context)?.to_owned();

    if child(signal_ele, "outline").is_none() {
        warn!(road = road_id, signal = %id, "signal has no outline, skipping");
        return Ok(());
    }

    let stop_line_refs = match child(signal_ele, "stopLine") {
        Some(stop_ele) => children(stop_ele, "objectReference")
            .map(|n| attr(n, "id", &context).map(str::to_owned))
            .collect::<ParseResult<_>>()?,
        None => Vec::new(),
    };

    let mut sub_signals = Vec::new();
    for sub_ele in children(signal_ele, "subSignal") {
        let sub_id = attr(sub_ele, "id", &context)?.to_owned();
        let sub_type = attr(sub_ele, "type", &context)?.to_owned();
        let Some(center_ele) = child(sub_ele, "centerPoint") else {
            warn!(road = road_id, signal = %id, sub_signal = %sub_id,
                  "sub-signal has no center point, skipping");
            continue;
        };
        sub_signals.push(ApolloSubSignal {
            center: [
                attr_f64(center_ele, "x", &context)?,
                attr_f64(center_ele, "y", &context)?,
                attr_f64(center_ele, "z", &context)?,
            ],
            id: sub_id,
            sub_type,
        });
    }

    map.signals.insert(
        id.clone(),
        ApolloSignal {
            id,
            signal_type,
            layout_type,
            stop_line_refs,
            sub_signals,
        },
    );
    Ok(())
}

fn parse_object(object_ele: Node<'_, '_>, road_id: &str, map: &mut ApolloMap) -> ParseResult<()> {
    let id = attr(object_ele, "id", "object")?.to_owned();
    let context = format!("road {road_id} object {id}");
    let object_type = attr(object_ele, "type", &context)?.to_owned();

    // Only stop lines and crosswalks feed layers; everything else is noise.
    if object_type != "stopline" && object_type != "crosswalk" {
        return Ok(());
    }

    let outline_points = match child(object_ele, "outline") {
        Some(outline_ele) => children(outline_ele, "cornerGlobal").count(),
        None => 0,
    };

    map.objects.insert(
        id.clone(),
        ApolloObject {
            id,
            object_type,
            outline_points,
        },
    );
    Ok(())
}

fn parse_junction(junction_ele: Node<'_, '_>, map: &mut ApolloMap) -> ParseResult<()> {
    let id = attr(junction_ele, "id", "junction")?.to_owned();
    let context = format!("junction {id}");

    let connections = children(junction_ele, "connection")
        .map(|conn_ele| {
            Ok(ApolloConnection {
                id: attr_i64(conn_ele, "id", &context)?,
                incoming_road: attr(conn_ele, "incomingRoad", &context)?.to_owned(),
                connecting_road: attr(conn_ele, "connectingRoad", &context)?.to_owned(),
                contact_point: attr(conn_ele, "contactPoint", &context)?.to_owned(),
            })
        })
        .collect::<ParseResult<_>>()?;

    map.junctions.insert(id.clone(), ApolloJunction { id, connections });
    Ok(())
}
