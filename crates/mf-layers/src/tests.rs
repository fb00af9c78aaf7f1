//! Unit tests for mf-layers.

#[cfg(test)]
mod helpers {
    use mf_parser::{parse_apollo, parse_memo};

    use crate::context::MapSource;

    fn lane_xml(id: i32, uid: &str, length: f64, link: &str) -> String {
        format!(
            r#"<lane id="{id}" uid="{uid}" type="driving" direction="forward" turnType="noTurn">
                 <link>{link}</link>
                 <border>
                   <borderType sOffset="0" type="solid" color="white"/>
                   <geometry sOffset="0" length="{length}"/>
                 </border>
                 <centerLine><geometry sOffset="0" length="{length}"/></centerLine>
               </lane>"#
        )
    }

    /// Two ordinary roads (R1 → R2), one junction connecting road R5, a
    /// traffic light, a stop line, and a crosswalk.
    pub fn apollo_source() -> MapSource {
        let xml = format!(
            r#"<apollo>
                 <road id="R1" type="town" junction="-1"><lanes><laneSection>
                   <center>{r1c}</center>
                   <right>{r1r1}{r1r2}</right>
                 </laneSection></lanes></road>
                 <road id="R2" type="town" junction="-1"><lanes><laneSection>
                   <center>{r2c}</center>
                   <right>{r2r}</right>
                 </laneSection></lanes></road>
                 <road id="R5" type="town" junction="J1">
                   <lanes><laneSection>
                     <center>{r5c}</center>
                     <right>{r5r}</right>
                   </laneSection></lanes>
                   <signals>
                     <signal id="S1" type="trafficLight" layoutType="vertical">
                       <outline><cornerGlobal x="0" y="0" z="0"/></outline>
                       <stopLine><objectReference id="O1"/></stopLine>
                       <subSignal id="1" type="circle"><centerPoint x="1" y="2" z="3"/></subSignal>
                     </signal>
                   </signals>
                   <objects>
                     <object id="O1" type="stopline">
                       <outline>
                         <cornerGlobal x="0" y="0" z="0"/>
                         <cornerGlobal x="3.5" y="0" z="0"/>
                       </outline>
                     </object>
                     <object id="O2" type="crosswalk">
                       <outline>
                         <cornerGlobal x="0" y="0" z="0"/>
                         <cornerGlobal x="4" y="0" z="0"/>
                         <cornerGlobal x="4" y="2" z="0"/>
                         <cornerGlobal x="0" y="2" z="0"/>
                       </outline>
                     </object>
                   </objects>
                 </road>
                 <junction id="J1">
                   <connection id="1" incomingRoad="R1" connectingRoad="R5" contactPoint="start"/>
                 </junction>
               </apollo>"#,
            r1c = lane_xml(0, "R1_0_0", 10.0, ""),
            r1r1 = lane_xml(-1, "R1_0_-1", 10.0, r#"<successor id="R2_0_-1"/>"#),
            r1r2 = lane_xml(-2, "R1_0_-2", 10.0, ""),
            r2c = lane_xml(0, "R2_0_0", 20.0, ""),
            r2r = lane_xml(-1, "R2_0_-1", 20.0, r#"<predecessor id="R1_0_-1"/>"#),
            r5c = lane_xml(0, "R5_0_0", 4.0, ""),
            r5r = lane_xml(-1, "R5_0_-1", 4.0, ""),
        );
        MapSource::Apollo(parse_apollo(&xml).unwrap())
    }

    pub fn memo_source() -> MapSource {
        let json = serde_json::json!({
            "lines": {
                "L1": {"border_type": "solid", "border_color": "white",
                       "length": 10.0, "nodes": []},
                "L2": {"border_type": "ins", "length": 10.5, "nodes": []},
                "L3": {"border_type": "broken", "length": 9.0, "nodes": []},
            },
            "lanes": {
                "lane_a": {"road_id": "road_1", "centerline": "L2",
                           "left_border": "L1", "right_border": "L3",
                           "pres": [], "sucs": []},
                "lane_broken": {"road_id": "road_9", "centerline": "GONE",
                                "left_border": "L1", "right_border": "L3"},
            },
            "roads": {
                "road_1": {"lane_ids": ["lane_a"], "pres": [], "ins_status": "ok"},
            },
            "objects": {
                "obj_stop": {"type": "stopline", "outline": ["n1", "n2"]},
            },
        })
        .to_string();
        MapSource::Memo(parse_memo(&json).unwrap())
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod pipeline {
    use std::sync::atomic::{AtomicU32, Ordering};

    use mf_core::{BuildLog, Severity};

    use super::helpers::{apollo_source, memo_source};
    use crate::builders::LayerBuilder;
    use crate::context::{BuildContext, LayerKind, LayerRow, MapSource};
    use crate::error::{BuildError, BuildResult};
    use crate::pipeline::{build_all_layers, Pipeline};
    use mf_parser::apollo::ApolloMap;

    #[test]
    fn apollo_build_produces_every_expected_layer() {
        let source = apollo_source();
        let set = build_all_layers(&source).unwrap();

        for kind in [
            LayerKind::Lane,
            LayerKind::LaneConnector,
            LayerKind::LaneBoundary,
            LayerKind::TrafficLight,
            LayerKind::StopLine,
            LayerKind::Crosswalk,
            LayerKind::Intersection,
            LayerKind::BaselinePath,
            LayerKind::LaneGroup,
            LayerKind::ReferenceLine,
        ] {
            assert!(set.layers.contains_key(&kind), "missing layer {kind}");
        }

        // R1 has two right lanes, R2 one; R5's lane is a connector.
        assert_eq!(set.layers[&LayerKind::Lane].len(), 3);
        assert_eq!(set.layers[&LayerKind::LaneConnector].len(), 1);
        // All 7 lanes (reference lanes included) have a baseline path.
        assert_eq!(set.layers[&LayerKind::BaselinePath].len(), 7);
        assert_eq!(set.layers[&LayerKind::Intersection].len(), 1);

        // The lane builders were requeued once each behind the boundary
        // builder. That is ordinary operation, logged as warnings.
        let requeues = set
            .logs
            .iter()
            .filter(|l| l.severity == Severity::Warning)
            .count();
        assert_eq!(requeues, 2);
    }

    #[test]
    fn gids_are_unique_across_all_layers() {
        let source = apollo_source();
        let set = build_all_layers(&source).unwrap();

        let mut gids: Vec<u64> = set
            .layers
            .values()
            .flatten()
            .map(|row| row.gid)
            .collect();
        let before = gids.len();
        gids.sort_unstable();
        gids.dedup();
        assert_eq!(gids.len(), before);
    }

    #[test]
    fn lane_rows_join_boundary_gids() {
        let source = apollo_source();
        let set = build_all_layers(&source).unwrap();

        let boundary_gids: Vec<u64> = set.layers[&LayerKind::LaneBoundary]
            .iter()
            .map(|row| row.gid)
            .collect();
        for lane in &set.layers[&LayerKind::Lane] {
            let left = lane.properties["left_boundary_gid"].as_u64().unwrap();
            let right = lane.properties["right_boundary_gid"].as_u64().unwrap();
            assert!(boundary_gids.contains(&left));
            assert!(boundary_gids.contains(&right));
            assert_ne!(left, right);
        }
    }

    #[test]
    fn memo_build_skips_apollo_only_layers_and_merges_parse_warnings() {
        let source = memo_source();
        let set = build_all_layers(&source).unwrap();

        assert!(set.layers.contains_key(&LayerKind::Lane));
        assert!(set.layers.contains_key(&LayerKind::LaneBoundary));
        assert!(set.layers.contains_key(&LayerKind::StopLine));
        assert!(set.layers.contains_key(&LayerKind::ReferenceLine));
        assert!(set.layers.contains_key(&LayerKind::LaneGroup));
        assert!(set.layers.contains_key(&LayerKind::BaselinePath));
        // No memo data exists for these.
        assert!(!set.layers.contains_key(&LayerKind::LaneConnector));
        assert!(!set.layers.contains_key(&LayerKind::TrafficLight));
        assert!(!set.layers.contains_key(&LayerKind::Crosswalk));
        assert!(!set.layers.contains_key(&LayerKind::Intersection));

        // lane_broken's parse warning must surface in the job log, with its
        // parse-time timestamp intact.
        let MapSource::Memo(map) = &source else {
            unreachable!()
        };
        let parsed = map
            .logs
            .iter()
            .find(|l| l.message.contains("lane_broken"))
            .unwrap();
        assert!(set.logs.contains(parsed));
    }

    #[test]
    fn object_rows_carry_their_outline_point_counts() {
        let source = apollo_source();
        let set = build_all_layers(&source).unwrap();

        let stop_lines = &set.layers[&LayerKind::StopLine];
        assert_eq!(stop_lines.len(), 1);
        assert_eq!(stop_lines[0].properties["self_id"], "O1");
        assert_eq!(stop_lines[0].properties["outline_points"], 2);

        let crosswalks = &set.layers[&LayerKind::Crosswalk];
        assert_eq!(crosswalks.len(), 1);
        assert_eq!(crosswalks[0].properties["self_id"], "O2");
        assert_eq!(crosswalks[0].properties["outline_points"], 4);
    }

    #[test]
    fn reference_line_memo_rows_are_ins_lines_only() {
        let source = memo_source();
        let set = build_all_layers(&source).unwrap();

        let rows = &set.layers[&LayerKind::ReferenceLine];
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].properties["line_id"], "L2");
    }

    /// Fails transiently until the configured attempt succeeds.
    struct FlakyBuilder {
        succeed_on: u32,
        calls: AtomicU32,
    }

    impl LayerBuilder for FlakyBuilder {
        fn kind(&self) -> LayerKind {
            LayerKind::StopLine
        }

        fn build_from_apollo(
            &self,
            _map: &ApolloMap,
            ctx: &mut BuildContext,
        ) -> BuildResult<Vec<LayerRow>> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            if call < self.succeed_on {
                return Err(BuildError::MissingContext {
                    key: "not_yet".to_owned(),
                });
            }
            Ok(vec![LayerRow {
                gid: ctx.next_gid(),
                properties: serde_json::Map::new(),
            }])
        }
    }

    #[test]
    fn transient_failures_retry_then_succeed() {
        let source = apollo_source();
        let pipeline = Pipeline::with_builders(vec![
            Box::new(FlakyBuilder {
                succeed_on: 3,
                calls: AtomicU32::new(0),
            }),
            Box::new(crate::builders::IntersectionBuilder),
        ]);
        let set = pipeline.run(&source, BuildLog::new()).unwrap();

        // The flaky layer built on its third attempt, and its failures did
        // not stop the sibling builder.
        assert!(set.layers.contains_key(&LayerKind::StopLine));
        assert!(set.layers.contains_key(&LayerKind::Intersection));
    }

    #[test]
    fn third_transient_failure_is_fatal() {
        let source = apollo_source();
        let pipeline = Pipeline::with_builders(vec![Box::new(FlakyBuilder {
            succeed_on: 4,
            calls: AtomicU32::new(0),
        })]);
        let err = pipeline.run(&source, BuildLog::new()).unwrap_err();
        assert!(matches!(
            err,
            BuildError::RetriesExhausted {
                layer: LayerKind::StopLine,
                attempts: 3,
                ..
            }
        ));
    }

    #[test]
    fn empty_layers_are_omitted_not_errors() {
        // A memo source with no objects produces no stop-line layer.
        let json = serde_json::json!({
            "lines": {"L1": {"border_type": "ins", "length": 1.0, "nodes": []}},
        })
        .to_string();
        let source = MapSource::Memo(mf_parser::parse_memo(&json).unwrap());
        let set = build_all_layers(&source).unwrap();
        assert!(!set.layers.contains_key(&LayerKind::StopLine));
        assert!(set.layers.contains_key(&LayerKind::ReferenceLine));
    }
}

// ── Boundary bookkeeping ──────────────────────────────────────────────────────

#[cfg(test)]
mod boundaries {
    use mf_core::BuildLog;

    use super::helpers::apollo_source;
    use crate::builders::{LaneBoundaryBuilder, LayerBuilder};
    use crate::context::{BuildContext, MapSource};

    #[test]
    fn boundary_builder_records_info_for_every_side_lane() {
        let source = apollo_source();
        let mut ctx = BuildContext::new(&source, BuildLog::new());

        let rows = LaneBoundaryBuilder.build(&source, &mut ctx).unwrap();
        assert!(!rows.is_empty());

        let MapSource::Apollo(map) = &source else {
            unreachable!()
        };
        for lane in map.lanes.values() {
            if lane.id == 0 {
                continue; // reference lanes own no boundary pair
            }
            let info = ctx.boundary_info(&lane.uid).unwrap();
            assert_ne!(info.left_line_gid, info.right_line_gid, "{}", lane.uid);
        }
    }

    #[test]
    fn adjacent_lanes_share_a_boundary() {
        let source = apollo_source();
        let mut ctx = BuildContext::new(&source, BuildLog::new());
        LaneBoundaryBuilder.build(&source, &mut ctx).unwrap();

        // R1's right side has two lanes: -1 (inner) and -2 (outer). The
        // inner lane's right boundary is the outer lane's left boundary...
        let inner = ctx.boundary_info("R1_0_-1").unwrap();
        let outer = ctx.boundary_info("R1_0_-2").unwrap();
        assert_eq!(inner.right_line_gid, outer.left_line_gid);
    }
}
